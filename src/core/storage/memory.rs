// src/core/storage/memory.rs

//! A minimal in-memory document store with a request-scoped read-through
//! cache. It is the engine binding used by the test harness and by embedded
//! deployments; the production engine implements the same trait.

use super::DocumentStore;
use crate::core::CitrineDBError;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tracing::debug;

pub struct MemoryDocumentStore {
    name: String,
    documents: DashMap<String, Bytes>,
    /// First-level cache, populated on read and dropped wholesale between
    /// replicated executions.
    cache: DashMap<String, Bytes>,
    cache_hits: AtomicU64,
    closed: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: DashMap::new(),
            cache: DashMap::new(),
            cache_hits: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Relaxed)
    }

    fn ensure_open(&self) -> Result<(), CitrineDBError> {
        if self.is_closed() {
            return Err(CitrineDBError::Storage(format!(
                "database '{}' is closed",
                self.name
            )));
        }
        Ok(())
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn insert(&self, key: &str, document: Bytes) -> Result<(), CitrineDBError> {
        self.ensure_open()?;
        self.documents.insert(key.to_string(), document);
        // The cache may hold a stale copy of this key.
        self.cache.remove(key);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<Bytes> {
        if self.is_closed() {
            return None;
        }
        if let Some(cached) = self.cache.get(key) {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Some(cached.value().clone());
        }
        let document = self.documents.get(key).map(|entry| entry.value().clone())?;
        self.cache.insert(key.to_string(), document.clone());
        Some(document)
    }

    fn remove(&self, key: &str) -> Result<Option<Bytes>, CitrineDBError> {
        self.ensure_open()?;
        self.cache.remove(key);
        Ok(self.documents.remove(key).map(|(_, document)| document))
    }

    fn clear_request_cache(&self) {
        self.cache.clear();
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::Relaxed) {
            debug!("Closing document store '{}'", self.name);
            self.cache.clear();
        }
    }
}
