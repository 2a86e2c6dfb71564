// src/core/replication/messenger.rs

//! The per-node message service: assigns request and sender identities,
//! owns the per-send response inboxes, registers outstanding requests, and
//! runs the router that drains the node's shared response queue into the
//! right inbox.

use super::messages::{ReplicationResponse, RequestId, SenderId, response_queue_name};
use super::responses::ResponseManager;
use crate::config::ReplicationSettings;
use crate::core::cluster::substrate::{QueueMessage, QueueSubstrate, SharedQueue};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Dead inbox registrations are swept once the registry grows past this.
const INBOX_SWEEP_THRESHOLD: usize = 1024;

/// A bounded response inbox owned by exactly one outbound send. The
/// receiver half sits behind an async mutex so the inbox can be shared as
/// an `Arc` with the router, which only ever touches the sender half.
pub struct ResponseInbox {
    tx: mpsc::Sender<ReplicationResponse>,
    rx: tokio::sync::Mutex<mpsc::Receiver<ReplicationResponse>>,
}

impl ResponseInbox {
    fn new(capacity: usize) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(capacity);
        Arc::new(Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
        })
    }

    /// Waits at most `timeout` for the next routed response.
    pub async fn poll(&self, timeout: Duration) -> Option<ReplicationResponse> {
        let mut rx = self.rx.lock().await;
        tokio::time::timeout(timeout, rx.recv()).await.ok().flatten()
    }

    async fn push(&self, response: ReplicationResponse, timeout: Duration) -> bool {
        self.tx.send_timeout(response, timeout).await.is_ok()
    }
}

/// Node-wide messaging state shared by every database replicator on this
/// node.
pub struct MessageService {
    local_node: String,
    substrate: Arc<dyn QueueSubstrate>,
    /// Weak registration: an inbox lives exactly as long as the send that
    /// owns it, so a completed send tears its inbox down by dropping it.
    inboxes: DashMap<SenderId, Weak<ResponseInbox>>,
    managers: DashMap<RequestId, Arc<ResponseManager>>,
    next_request_seq: AtomicU64,
    next_sender_seq: AtomicU64,
    settings: ReplicationSettings,
    shutdown_tx: broadcast::Sender<()>,
    router: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl MessageService {
    pub fn new(
        local_node: impl Into<String>,
        substrate: Arc<dyn QueueSubstrate>,
        settings: ReplicationSettings,
    ) -> Arc<Self> {
        let (shutdown_tx, _) = broadcast::channel(1);
        Arc::new(Self {
            local_node: local_node.into(),
            substrate,
            inboxes: DashMap::new(),
            managers: DashMap::new(),
            next_request_seq: AtomicU64::new(0),
            next_sender_seq: AtomicU64::new(0),
            settings,
            shutdown_tx,
            router: parking_lot::Mutex::new(None),
        })
    }

    pub fn local_node(&self) -> &str {
        &self.local_node
    }

    /// Assigns the next cluster-unique request identity originated by this
    /// node.
    pub fn next_request_id(&self) -> RequestId {
        RequestId::new(
            self.local_node.clone(),
            self.next_request_seq.fetch_add(1, Ordering::Relaxed) + 1,
        )
    }

    /// Allocates a fresh sender identity and the inbox its responses will
    /// be routed to. Each outbound send owns exactly one; worker threads
    /// are pooled, so identities are never derived from OS threads.
    pub fn new_sender(&self) -> (SenderId, Arc<ResponseInbox>) {
        if self.inboxes.len() > INBOX_SWEEP_THRESHOLD {
            self.inboxes.retain(|_, weak| weak.strong_count() > 0);
        }
        let id = SenderId(self.next_sender_seq.fetch_add(1, Ordering::Relaxed) + 1);
        let inbox = ResponseInbox::new(self.settings.inbox_capacity);
        self.inboxes.insert(id, Arc::downgrade(&inbox));
        (id, inbox)
    }

    fn live_inbox(&self, sender: SenderId) -> Option<Arc<ResponseInbox>> {
        let entry = self.inboxes.get(&sender)?;
        match entry.value().upgrade() {
            Some(inbox) => Some(inbox),
            None => {
                drop(entry);
                self.inboxes.remove(&sender);
                None
            }
        }
    }

    /// Registers the response manager of an outstanding request.
    pub fn register_request(&self, id: RequestId, manager: Arc<ResponseManager>) {
        self.managers.insert(id, manager);
    }

    /// Deregisters an outstanding request once its `send` has returned.
    pub fn deregister_request(&self, id: &RequestId) {
        self.managers.remove(id);
    }

    pub fn outstanding_requests(&self) -> usize {
        self.managers.len()
    }

    /// Drains lingering responses from a previous incarnation of this node,
    /// then starts the response router.
    pub async fn start(self: &Arc<Self>) {
        let response_queue = self
            .substrate
            .queue(&response_queue_name(&self.local_node));

        let mut stale = 0usize;
        while response_queue.poll(Duration::ZERO).await.is_some() {
            stale += 1;
        }
        if stale > 0 {
            warn!(
                "Dropped {} stale responses addressed to a previous incarnation of node {}",
                stale, self.local_node
            );
        }

        let service = self.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(async move {
            service.route_responses(response_queue, shutdown_rx).await;
        });
        *self.router.lock() = Some(handle);
        info!("Message service started on node {}", self.local_node);
    }

    async fn route_responses(
        &self,
        response_queue: Arc<dyn SharedQueue>,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                msg = response_queue.take() => {
                    match msg {
                        QueueMessage::Response(response) => self.dispatch(response).await,
                        QueueMessage::Request(request) => {
                            warn!(
                                "Request {} found on the response queue of node {}; dropping",
                                request.id, self.local_node
                            );
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Response router on node {} shutting down", self.local_node);
                    return;
                }
            }
        }
    }

    /// Routes one response to the inbox of its destination send. When that
    /// send no longer holds its inbox, the response is reconciled against
    /// the outstanding-request registry for asynchronous accounting.
    async fn dispatch(&self, response: ReplicationResponse) {
        if response.destination_node != self.local_node {
            warn!(
                "Response for request {} addressed to node {} arrived on node {}; dropping",
                response.request_id, response.destination_node, self.local_node
            );
            return;
        }

        if let Some(inbox) = self.live_inbox(response.destination_thread) {
            if inbox
                .push(response.clone(), self.settings.queue_timeout)
                .await
            {
                return;
            }
            warn!(
                "Inbox of sender {} on node {} is full; falling back to asynchronous accounting",
                response.destination_thread, self.local_node
            );
        }

        if let Some(manager) = self.managers.get(&response.request_id) {
            let recorded = manager.record(response.clone());
            debug!(
                "Asynchronous response from node {} for request {} {}",
                response.sender_node,
                response.request_id,
                if recorded { "reconciled" } else { "dropped" }
            );
        } else {
            debug!(
                "Dropping response from node {} for unknown request {}",
                response.sender_node, response.request_id
            );
        }
    }

    /// Stops the response router. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let handle = self.router.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }
}
