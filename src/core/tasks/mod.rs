// src/core/tasks/mod.rs

//! Task payloads: the opaque unit of work a request carries to every
//! replica. The replication core treats payloads as self-describing blobs
//! with a declared is-write bit, timeout hints, and a result strategy; the
//! concrete document operations live in [`document`].

pub mod document;

pub use document::{DeleteDocumentTask, InsertDocumentTask, ReadDocumentTask};

use crate::core::CitrineDBError;
use crate::core::storage::ExecutionContext;
use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::time::Duration;

/// Base per-node latency hint when a task supplies none of its own.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// How collected responses are reduced to the value `send` returns.
/// Provided by the payload; the response manager only selects and invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultStrategy {
    /// The first response to arrive wins.
    First,
    /// The most frequent payload wins; ties break toward the earliest.
    Majority,
    /// All payloads, concatenated in responder-name order.
    Merge,
}

/// The contract every replicated operation implements.
///
/// A task is shipped by reference through the queue substrate, so its
/// identity is preserved across enqueue and dequeue; a clone of a task is
/// always the same concrete type.
#[async_trait]
pub trait ReplicationTask: Send + Sync + fmt::Debug {
    /// Whether this operation mutates the database. Writes are subject to
    /// the configured write quorum; reads wait for every targeted node.
    fn is_write_operation(&self) -> bool;

    /// Base per-node latency hint the two-tier deadlines are derived from.
    fn request_timeout(&self) -> Duration {
        DEFAULT_REQUEST_TIMEOUT
    }

    /// Bounds asynchronous response accounting for a fan-out of `nodes`.
    fn total_timeout(&self, nodes: usize) -> Duration {
        self.request_timeout() * nodes.max(1) as u32
    }

    /// Bounds the caller-visible quorum wait for `expected` synchronous
    /// responders.
    fn synchronous_timeout(&self, expected: usize) -> Duration {
        self.request_timeout() * expected.max(1) as u32
    }

    fn result_strategy(&self) -> ResultStrategy {
        ResultStrategy::First
    }

    /// Records the node this task was received from. Called by the inbound
    /// worker before execution.
    fn set_node_source(&self, node: &str);

    /// Runs the operation against the local database and returns the opaque
    /// result blob shipped back to the sender.
    async fn execute(&self, ctx: &ExecutionContext) -> Result<Bytes, CitrineDBError>;

    /// Compensating action, invoked by the sender exactly once when the
    /// collected responses fell short of quorum. Best-effort.
    async fn undo(&self);
}
