// src/core/storage/mod.rs

//! The document-store contract the replication core executes against, and
//! the execution context threaded through every inbound execute.

pub mod memory;

pub use memory::MemoryDocumentStore;

use bytes::Bytes;
use std::sync::Arc;
use strum_macros::Display;

use crate::core::CitrineDBError;

/// Tags an execution as a user operation or a replicated one, so storage
/// hooks and triggers can tell the replication path from a user transaction.
/// Carried on the execution context, never in process-global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecutionScenario {
    Default,
    Distributed,
}

/// The narrow surface of the document engine the replication core needs.
/// Engine internals (on-disk formats, indexing, query planning) live behind
/// this trait.
pub trait DocumentStore: Send + Sync {
    fn name(&self) -> &str;

    fn insert(&self, key: &str, document: Bytes) -> Result<(), CitrineDBError>;

    fn get(&self, key: &str) -> Option<Bytes>;

    fn remove(&self, key: &str) -> Result<Option<Bytes>, CitrineDBError>;

    /// Drops the request-scoped read-through cache. The inbound worker calls
    /// this at every execute boundary so each replicated request starts from
    /// a clean cache.
    fn clear_request_cache(&self);

    /// Releases the store handle. Further operations fail.
    fn close(&self);
}

/// Everything a task execution needs: the store handle and the scenario tag.
pub struct ExecutionContext {
    pub scenario: ExecutionScenario,
    pub database: Arc<dyn DocumentStore>,
}

impl ExecutionContext {
    pub fn new(scenario: ExecutionScenario, database: Arc<dyn DocumentStore>) -> Self {
        Self { scenario, database }
    }

    /// A context for the replication path.
    pub fn distributed(database: Arc<dyn DocumentStore>) -> Self {
        Self::new(ExecutionScenario::Distributed, database)
    }
}
