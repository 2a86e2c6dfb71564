// src/core/cluster/memory.rs

//! An in-process implementation of the coordination substrate.
//!
//! `MemorySubstrate` backs every named queue, map, and lock with process-local
//! state shared through `Arc`s. All replicators wired to the same instance see
//! the same queues, which makes it the binding used by the test harness and by
//! embedded single-process deployments. Queues live as long as the substrate,
//! not as long as any replicator, so a "restarted" node finds the messages its
//! previous incarnation left behind.

use super::substrate::{
    LockGuard, QueueMessage, QueueSubstrate, SharedLock, SharedMap, SharedQueue, SharedValue,
};
use crate::core::CitrineDBError;
use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, OwnedMutexGuard};
use tokio::time::{Instant, timeout, timeout_at};

/// Default per-queue capacity. Large enough that only a stalled receiver can
/// make `offer` block.
const QUEUE_CAPACITY: usize = 8192;

/// A FIFO queue with `Notify`-based wakeups for both producers and consumers.
pub struct MemoryQueue {
    inner: Mutex<VecDeque<QueueMessage>>,
    capacity: usize,
    /// Signalled whenever a message is pushed.
    items: Notify,
    /// Signalled whenever a message is popped.
    space: Notify,
}

impl MemoryQueue {
    fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity,
            items: Notify::new(),
            space: Notify::new(),
        }
    }

    fn try_push(&self, msg: &QueueMessage) -> bool {
        let mut inner = self.inner.lock();
        if inner.len() >= self.capacity {
            return false;
        }
        inner.push_back(msg.clone());
        true
    }

    fn try_pop(&self) -> Option<QueueMessage> {
        self.inner.lock().pop_front()
    }
}

#[async_trait]
impl SharedQueue for MemoryQueue {
    async fn offer(&self, msg: QueueMessage, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            // The `notified` future must exist before the capacity check, or a
            // pop between the check and the await could be missed.
            let space = self.space.notified();
            if self.try_push(&msg) {
                self.items.notify_one();
                return true;
            }
            if timeout_at(deadline, space).await.is_err() {
                return false;
            }
        }
    }

    async fn take(&self) -> QueueMessage {
        loop {
            let items = self.items.notified();
            if let Some(msg) = self.try_pop() {
                self.space.notify_one();
                return msg;
            }
            items.await;
        }
    }

    async fn poll(&self, wait: Duration) -> Option<QueueMessage> {
        timeout(wait, self.take()).await.ok()
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

/// A keyed cell store. `DashMap::remove` gives the atomic take-and-clear the
/// undo-slot protocol requires.
pub struct MemoryMap {
    entries: DashMap<String, SharedValue>,
}

impl MemoryMap {
    fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

#[async_trait]
impl SharedMap for MemoryMap {
    async fn put(&self, key: &str, value: SharedValue) {
        self.entries.insert(key.to_string(), value);
    }

    async fn get(&self, key: &str) -> Option<SharedValue> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    async fn remove(&self, key: &str) -> Option<SharedValue> {
        self.entries.remove(key).map(|(_, value)| value)
    }
}

/// A named lock backed by a tokio mutex. The guard releases on drop.
pub struct MemoryLock {
    inner: Arc<tokio::sync::Mutex<()>>,
}

impl MemoryLock {
    fn new() -> Self {
        Self {
            inner: Arc::new(tokio::sync::Mutex::new(())),
        }
    }
}

struct MemoryLockGuard {
    _guard: OwnedMutexGuard<()>,
}

impl LockGuard for MemoryLockGuard {}

#[async_trait]
impl SharedLock for MemoryLock {
    async fn acquire(&self) -> Result<Box<dyn LockGuard>, CitrineDBError> {
        let guard = self.inner.clone().lock_owned().await;
        Ok(Box::new(MemoryLockGuard { _guard: guard }))
    }
}

/// The substrate itself: lazily materializes queues, maps, and locks by name.
pub struct MemorySubstrate {
    queues: DashMap<String, Arc<MemoryQueue>>,
    maps: DashMap<String, Arc<MemoryMap>>,
    locks: DashMap<String, Arc<MemoryLock>>,
    queue_capacity: usize,
}

impl MemorySubstrate {
    pub fn new() -> Self {
        Self::with_queue_capacity(QUEUE_CAPACITY)
    }

    pub fn with_queue_capacity(queue_capacity: usize) -> Self {
        Self {
            queues: DashMap::new(),
            maps: DashMap::new(),
            locks: DashMap::new(),
            queue_capacity,
        }
    }
}

impl Default for MemorySubstrate {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueSubstrate for MemorySubstrate {
    fn queue(&self, name: &str) -> Arc<dyn SharedQueue> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryQueue::new(self.queue_capacity)))
            .value()
            .clone()
    }

    fn map(&self, name: &str) -> Arc<dyn SharedMap> {
        self.maps
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryMap::new()))
            .value()
            .clone()
    }

    fn lock(&self, name: &str) -> Arc<dyn SharedLock> {
        self.locks
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryLock::new()))
            .value()
            .clone()
    }
}
