// src/core/replication/responses.rs

//! Per-request response accounting: which nodes were targeted, which have
//! answered, whether the synchronous phase is satisfied, and how the
//! collected answers reduce to the value handed back to the caller.

use super::messages::{ReplicationResponse, RequestId};
use crate::core::tasks::ResultStrategy;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

struct ManagerInner {
    /// Responses in arrival order, at most one per responder.
    responses: Vec<ReplicationResponse>,
    received_current_node: bool,
}

/// Tracks the state of one outstanding request from registration at `send`
/// entry until the caller returns.
pub struct ResponseManager {
    request_id: RequestId,
    expected_nodes: Vec<String>,
    expected_synchronous: usize,
    quorum: usize,
    execute_on_local: bool,
    local_node: String,
    begin: Instant,
    total_timeout: Duration,
    inner: Mutex<ManagerInner>,
}

impl ResponseManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        request_id: RequestId,
        expected_nodes: Vec<String>,
        quorum: usize,
        available_nodes: usize,
        execute_on_local: bool,
        local_node: impl Into<String>,
        total_timeout: Duration,
    ) -> Self {
        Self {
            request_id,
            expected_nodes,
            expected_synchronous: available_nodes.min(quorum),
            quorum,
            execute_on_local,
            local_node: local_node.into(),
            begin: Instant::now(),
            total_timeout,
            inner: Mutex::new(ManagerInner {
                responses: Vec::new(),
                received_current_node: false,
            }),
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    /// `min(available_nodes_at_send_time, quorum)`: how many responses the
    /// synchronous phase waits for.
    pub fn expected_synchronous(&self) -> usize {
        self.expected_synchronous
    }

    pub fn executes_on_local(&self) -> bool {
        self.execute_on_local
    }

    /// Records a response. Returns `false` when the response is dropped:
    /// unexpected responder, duplicate, or past the total deadline.
    pub fn record(&self, response: ReplicationResponse) -> bool {
        if response.request_id != self.request_id {
            warn!(
                "Response manager for {} handed a response for {}; dropping",
                self.request_id, response.request_id
            );
            return false;
        }
        if !self
            .expected_nodes
            .iter()
            .any(|node| *node == response.sender_node)
        {
            warn!(
                "Request {}: response from node {} which was never targeted; dropping",
                self.request_id, response.sender_node
            );
            return false;
        }
        if self.begin.elapsed() > self.total_timeout {
            debug!(
                "Request {}: response from node {} arrived after the total deadline; dropping",
                self.request_id, response.sender_node
            );
            return false;
        }

        let mut inner = self.inner.lock();
        if inner
            .responses
            .iter()
            .any(|existing| existing.sender_node == response.sender_node)
        {
            debug!(
                "Request {}: duplicate response from node {}; dropping",
                self.request_id, response.sender_node
            );
            return false;
        }
        if response.sender_node == self.local_node {
            inner.received_current_node = true;
        }
        inner.responses.push(response);
        true
    }

    pub fn received_count(&self) -> usize {
        self.inner.lock().responses.len()
    }

    pub fn received_from_local(&self) -> bool {
        self.inner.lock().received_current_node
    }

    pub fn quorum_reached(&self) -> bool {
        self.received_count() >= self.quorum
    }

    /// Whether the synchronous collection loop should keep polling: true
    /// until the expected synchronous count is met, every targeted node has
    /// answered, or nothing was ever expected.
    pub fn should_wait_for_sync(&self) -> bool {
        if self.expected_synchronous == 0 {
            return false;
        }
        let received = self.received_count();
        received < self.expected_synchronous && received < self.expected_nodes.len()
    }

    /// Reduces the recorded responses per `strategy`. `None` when nothing
    /// was received.
    pub fn result(&self, strategy: ResultStrategy) -> Option<ReplicationResponse> {
        let inner = self.inner.lock();
        if inner.responses.is_empty() {
            return None;
        }
        match strategy {
            ResultStrategy::First => inner.responses.first().cloned(),
            ResultStrategy::Majority => {
                let mut tally: HashMap<&Bytes, usize> = HashMap::new();
                for response in &inner.responses {
                    *tally.entry(&response.payload).or_insert(0) += 1;
                }
                // Arrival order breaks ties toward the earliest payload.
                let mut best: Option<&ReplicationResponse> = None;
                let mut best_count = 0;
                for response in &inner.responses {
                    let count = tally[&response.payload];
                    if count > best_count {
                        best = Some(response);
                        best_count = count;
                    }
                }
                best.cloned()
            }
            ResultStrategy::Merge => {
                let ordered: BTreeMap<&str, &Bytes> = inner
                    .responses
                    .iter()
                    .map(|response| (response.sender_node.as_str(), &response.payload))
                    .collect();
                let mut merged = Vec::new();
                for payload in ordered.values() {
                    merged.extend_from_slice(payload);
                }
                let mut response = inner.responses.first().cloned()?;
                response.payload = Bytes::from(merged);
                Some(response)
            }
        }
    }
}
