// src/core/cluster/substrate.rs

//! Contracts for the cluster-visible coordination substrate.
//!
//! The replication core never talks to a concrete cluster fabric directly.
//! It consumes three narrow capabilities: named FIFO queues with
//! bounded-time `offer` and blocking `take`, a keyed map used for the
//! per-database undo slot and the published partition layouts, and a
//! cluster-wide named lock that linearizes request fan-out. Queues and maps
//! outlive any single node process; a restarted node finds its pending
//! requests and undo slot exactly where the previous incarnation left them.

use crate::core::CitrineDBError;
use crate::core::replication::messages::{ReplicationRequest, ReplicationResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// A message travelling through a cluster-visible queue.
#[derive(Debug, Clone)]
pub enum QueueMessage {
    Request(ReplicationRequest),
    Response(ReplicationResponse),
}

/// A value stored in a cluster-visible keyed map.
#[derive(Debug, Clone)]
pub enum SharedValue {
    /// An in-flight inbound request, persisted in a node's undo slot.
    Request(ReplicationRequest),
    /// A serialized distributed configuration document.
    Document(serde_json::Value),
}

impl SharedValue {
    pub fn into_request(self) -> Option<ReplicationRequest> {
        match self {
            SharedValue::Request(request) => Some(request),
            SharedValue::Document(_) => None,
        }
    }

    pub fn as_document(&self) -> Option<&serde_json::Value> {
        match self {
            SharedValue::Document(document) => Some(document),
            SharedValue::Request(_) => None,
        }
    }
}

/// A named, cluster-visible FIFO queue.
#[async_trait]
pub trait SharedQueue: Send + Sync {
    /// Appends `msg` to the tail, waiting at most `timeout` for capacity.
    /// Returns `false` if the message could not be enqueued in time.
    async fn offer(&self, msg: QueueMessage, timeout: Duration) -> bool;

    /// Removes and returns the head, waiting until a message is available.
    async fn take(&self) -> QueueMessage;

    /// Removes and returns the head, waiting at most `timeout`.
    /// A zero timeout degrades to a non-blocking pop.
    async fn poll(&self, timeout: Duration) -> Option<QueueMessage>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named, cluster-visible keyed map with atomic removal.
#[async_trait]
pub trait SharedMap: Send + Sync {
    async fn put(&self, key: &str, value: SharedValue);

    async fn get(&self, key: &str) -> Option<SharedValue>;

    /// Atomically removes and returns the value under `key`.
    async fn remove(&self, key: &str) -> Option<SharedValue>;
}

/// A token released when dropped. Holding one means holding the lock.
pub trait LockGuard: Send {}

/// A named, cluster-wide mutual-exclusion lock.
#[async_trait]
pub trait SharedLock: Send + Sync {
    async fn acquire(&self) -> Result<Box<dyn LockGuard>, CitrineDBError>;
}

/// Resolves queues, maps, and locks by their cluster-visible names.
pub trait QueueSubstrate: Send + Sync {
    fn queue(&self, name: &str) -> Arc<dyn SharedQueue>;
    fn map(&self, name: &str) -> Arc<dyn SharedMap>;
    fn lock(&self, name: &str) -> Arc<dyn SharedLock>;
}
