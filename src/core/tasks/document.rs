// src/core/tasks/document.rs

//! Document CRUD task payloads.
//!
//! Insert and delete are idempotent by construction, which is what makes the
//! core's at-least-once redelivery (queue catch-up, crash recovery) safe.

use super::{ReplicationTask, ResultStrategy};
use crate::core::CitrineDBError;
use crate::core::storage::ExecutionContext;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

/// Stores a document under a key on every replica.
#[derive(Debug)]
pub struct InsertDocumentTask {
    pub key: String,
    pub document: Bytes,
    timeout: Duration,
    node_source: Mutex<Option<String>>,
    undo_calls: AtomicUsize,
}

impl InsertDocumentTask {
    pub fn new(key: impl Into<String>, document: Bytes) -> Self {
        Self {
            key: key.into(),
            document,
            timeout: super::DEFAULT_REQUEST_TIMEOUT,
            node_source: Mutex::new(None),
            undo_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many times the sender invoked the compensating action.
    pub fn undo_calls(&self) -> usize {
        self.undo_calls.load(Ordering::Relaxed)
    }

    pub fn node_source(&self) -> Option<String> {
        self.node_source.lock().clone()
    }
}

#[async_trait]
impl ReplicationTask for InsertDocumentTask {
    fn is_write_operation(&self) -> bool {
        true
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Majority
    }

    fn set_node_source(&self, node: &str) {
        *self.node_source.lock() = Some(node.to_string());
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Bytes, CitrineDBError> {
        ctx.database.insert(&self.key, self.document.clone())?;
        Ok(Bytes::from_static(b"OK"))
    }

    async fn undo(&self) {
        self.undo_calls.fetch_add(1, Ordering::Relaxed);
        debug!("Compensating interrupted insert of key '{}'", self.key);
    }
}

/// Removes a document by key on every replica. The result blob tells
/// whether the key existed locally.
#[derive(Debug)]
pub struct DeleteDocumentTask {
    pub key: String,
    timeout: Duration,
    node_source: Mutex<Option<String>>,
    undo_calls: AtomicUsize,
}

impl DeleteDocumentTask {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: super::DEFAULT_REQUEST_TIMEOUT,
            node_source: Mutex::new(None),
            undo_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn undo_calls(&self) -> usize {
        self.undo_calls.load(Ordering::Relaxed)
    }

    pub fn node_source(&self) -> Option<String> {
        self.node_source.lock().clone()
    }
}

#[async_trait]
impl ReplicationTask for DeleteDocumentTask {
    fn is_write_operation(&self) -> bool {
        true
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::Majority
    }

    fn set_node_source(&self, node: &str) {
        *self.node_source.lock() = Some(node.to_string());
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Bytes, CitrineDBError> {
        let removed = ctx.database.remove(&self.key)?;
        Ok(if removed.is_some() {
            Bytes::from_static(b"1")
        } else {
            Bytes::from_static(b"0")
        })
    }

    async fn undo(&self) {
        self.undo_calls.fetch_add(1, Ordering::Relaxed);
        debug!("Compensating interrupted delete of key '{}'", self.key);
    }
}

/// Reads a document by key. Not a write: the quorum is the full node set,
/// and there is nothing to compensate.
#[derive(Debug)]
pub struct ReadDocumentTask {
    pub key: String,
    timeout: Duration,
    node_source: Mutex<Option<String>>,
}

impl ReadDocumentTask {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            timeout: super::DEFAULT_REQUEST_TIMEOUT,
            node_source: Mutex::new(None),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn node_source(&self) -> Option<String> {
        self.node_source.lock().clone()
    }
}

#[async_trait]
impl ReplicationTask for ReadDocumentTask {
    fn is_write_operation(&self) -> bool {
        false
    }

    fn request_timeout(&self) -> Duration {
        self.timeout
    }

    fn set_node_source(&self, node: &str) {
        *self.node_source.lock() = Some(node.to_string());
    }

    async fn execute(&self, ctx: &ExecutionContext) -> Result<Bytes, CitrineDBError> {
        Ok(ctx.database.get(&self.key).unwrap_or_default())
    }

    async fn undo(&self) {}
}
