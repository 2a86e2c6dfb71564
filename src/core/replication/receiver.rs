// src/core/replication/receiver.rs

//! The per-database inbound worker: drains this node's request queue,
//! persists each in-flight request to the crash-durable undo slot, executes
//! it against the local database, and ships the response back toward the
//! originating thread.

use super::messages::{
    ExecutionMode, ReplicationRequest, ReplicationResponse, request_queue_name,
    response_queue_name, undo_map_name,
};
use crate::core::CitrineDBError;
use crate::core::cluster::substrate::{QueueMessage, QueueSubstrate, SharedMap, SharedQueue, SharedValue};
use crate::core::storage::{DocumentStore, ExecutionContext};
use bytes::Bytes;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use strum_macros::Display;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Where the worker currently is in its take/execute/acknowledge cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ReceiverState {
    Idle,
    Taking,
    Executing,
    Acknowledging,
    Interrupted,
}

/// Exactly one of these runs per database per node.
pub struct RequestReceiver {
    local_node: String,
    database: Arc<dyn DocumentStore>,
    substrate: Arc<dyn QueueSubstrate>,
    request_queue: Arc<dyn SharedQueue>,
    undo_map: Arc<dyn SharedMap>,
    queue_timeout: Duration,
    state: Arc<RwLock<ReceiverState>>,
}

impl RequestReceiver {
    pub fn new(
        local_node: impl Into<String>,
        database: Arc<dyn DocumentStore>,
        substrate: Arc<dyn QueueSubstrate>,
        queue_timeout: Duration,
        state: Arc<RwLock<ReceiverState>>,
    ) -> Self {
        let local_node = local_node.into();
        let request_queue = substrate.queue(&request_queue_name(&local_node, database.name()));
        let undo_map = substrate.map(&undo_map_name(&local_node, database.name()));
        Self {
            local_node,
            database,
            substrate,
            request_queue,
            undo_map,
            queue_timeout,
            state,
        }
    }

    pub fn request_queue(&self) -> Arc<dyn SharedQueue> {
        self.request_queue.clone()
    }

    pub fn undo_map(&self) -> Arc<dyn SharedMap> {
        self.undo_map.clone()
    }

    fn set_state(&self, state: ReceiverState) {
        debug!(
            "Receiver for database '{}' entering state {}",
            self.database.name(),
            state
        );
        *self.state.write() = state;
    }

    /// The main worker loop. Exits only through the shutdown signal, leaving
    /// any in-flight undo slot populated for the next incarnation to
    /// recover.
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) {
        info!(
            "Request receiver for database '{}' started on node {}",
            self.database.name(),
            self.local_node
        );
        loop {
            self.set_state(ReceiverState::Taking);
            tokio::select! {
                msg = self.request_queue.take() => {
                    match msg {
                        QueueMessage::Request(request) => {
                            let id = request.id.clone();
                            if let Err(e) = self.process(request).await {
                                warn!(
                                    "Processing request {} on node {} failed: {e}",
                                    id, self.local_node
                                );
                            }
                            self.set_state(ReceiverState::Idle);
                        }
                        QueueMessage::Response(response) => {
                            warn!(
                                "Response for request {} found on the request queue of node {}; dropping",
                                response.request_id, self.local_node
                            );
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    self.set_state(ReceiverState::Interrupted);
                    info!(
                        "Request receiver for database '{}' on node {} shutting down",
                        self.database.name(),
                        self.local_node
                    );
                    return;
                }
            }
        }
    }

    /// The normal inbound path, also re-driven verbatim by crash recovery:
    /// persist to the undo slot, execute, ship the response, clear the slot.
    pub(crate) async fn process(&self, request: ReplicationRequest) -> Result<(), CitrineDBError> {
        // Persisted before execution so that a crash mid-execute leaves the
        // slot populated.
        self.undo_map
            .put(
                self.database.name(),
                SharedValue::Request(request.clone()),
            )
            .await;

        self.set_state(ReceiverState::Executing);
        let result = self.execute(&request).await?;

        self.set_state(ReceiverState::Acknowledging);
        if request.mode == ExecutionMode::Response {
            self.dispatch_response(&request, result).await?;
        }

        self.undo_map.remove(self.database.name()).await;
        Ok(())
    }

    async fn execute(&self, request: &ReplicationRequest) -> Result<Bytes, CitrineDBError> {
        request.payload.set_node_source(&request.sender_node);
        let ctx = ExecutionContext::distributed(self.database.clone());
        let result = request.payload.execute(&ctx).await;
        // Every request starts from a clean read-through cache, even after a
        // failed execution.
        self.database.clear_request_cache();
        debug!(
            "Executed request {} from node {} on database '{}'",
            request.id,
            request.sender_node,
            self.database.name()
        );
        result
    }

    async fn dispatch_response(
        &self,
        request: &ReplicationRequest,
        payload: Bytes,
    ) -> Result<(), CitrineDBError> {
        let response = ReplicationResponse {
            request_id: request.id.clone(),
            sender_node: self.local_node.clone(),
            destination_node: request.sender_node.clone(),
            destination_thread: request.sender_thread,
            payload,
        };
        let queue = self
            .substrate
            .queue(&response_queue_name(&request.sender_node));
        if !queue
            .offer(QueueMessage::Response(response), self.queue_timeout)
            .await
        {
            return Err(CitrineDBError::Dispatch(format!(
                "timed out offering the response for request {} to node {}",
                request.id, request.sender_node
            )));
        }
        Ok(())
    }
}
