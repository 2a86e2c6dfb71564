// src/core/replication/sender.rs

//! The outbound path: resolve the target partition, fan the request out to
//! every owning node under the cluster-wide request lock, and collect
//! responses until the synchronous phase is satisfied or times out.

use super::DatabaseReplicator;
use super::messages::{
    ExecutionMode, ReplicationRequest, ReplicationResponse, request_lock_name, request_queue_name,
};
use super::messenger::ResponseInbox;
use super::responses::ResponseManager;
use crate::core::CitrineDBError;
use crate::core::cluster::substrate::QueueMessage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

impl DatabaseReplicator {
    /// Broadcasts `request` to every node owning its target partition and
    /// blocks until the write quorum is satisfied or the synchronous
    /// deadline passes. Returns the strategy-reduced response, or `None`
    /// for [`ExecutionMode::NoResponse`] requests.
    pub async fn send(
        &self,
        mut request: ReplicationRequest,
    ) -> Result<Option<ReplicationResponse>, CitrineDBError> {
        request.database = self.database_name().to_string();
        let database = request.database.clone();

        // Resolve the partition owning the addressed cluster.
        let config = self.admin.database_configuration(&database).ok_or_else(|| {
            CitrineDBError::Config(format!(
                "no distributed configuration for database '{database}'"
            ))
        })?;
        let cluster = request.cluster.as_deref();
        let strategy = self
            .partitioners
            .resolve(&config.partition_strategy(cluster))?;
        let partition = strategy.partition(&config, &database, cluster)?;
        let nodes = partition.nodes;

        // Writes answer to the configured quorum; reads wait for everyone.
        let quorum = if request.payload.is_write_operation() {
            config.write_quorum(cluster)
        } else {
            nodes.len()
        };

        // The inbox must exist before the first replica can answer. The
        // sender identity is per call; responses find their way back to
        // this send and no other.
        let (sender_id, inbox) = self.messenger.new_sender();

        let local = self.admin.local_node_name().to_string();
        request.id = self.messenger.next_request_id();
        request.sender_node = local.clone();
        request.sender_thread = sender_id;

        // Unavailable nodes still get the request (their queues persist);
        // they are only left out of the synchronous wait.
        let available = nodes
            .iter()
            .filter(|node| self.admin.is_node_available(node))
            .count();
        let execute_on_local = nodes.iter().any(|node| *node == local);

        let manager = Arc::new(ResponseManager::new(
            request.id.clone(),
            nodes.clone(),
            quorum,
            available,
            execute_on_local,
            local,
            request.payload.total_timeout(nodes.len()),
        ));

        self.messenger
            .register_request(request.id.clone(), manager.clone());

        let outcome = self
            .broadcast_and_collect(&request, &nodes, &manager, &inbox)
            .await;
        self.messenger.deregister_request(&request.id);
        outcome
    }

    async fn broadcast_and_collect(
        &self,
        request: &ReplicationRequest,
        nodes: &[String],
        manager: &ResponseManager,
        inbox: &ResponseInbox,
    ) -> Result<Option<ReplicationResponse>, CitrineDBError> {
        self.fan_out(request, nodes).await?;
        if request.mode == ExecutionMode::NoResponse {
            debug!(
                "Request {} sent in fire-and-forget mode to {} nodes",
                request.id,
                nodes.len()
            );
            return Ok(None);
        }
        self.collect_responses(request, manager, inbox)
            .await
            .map(Some)
    }

    /// Offers the request to every target queue while holding the
    /// database-scoped cluster lock. The lock is the only thing keeping two
    /// concurrent senders from interleaving their requests differently
    /// across the per-node queues; every receiver must observe the same
    /// global order.
    async fn fan_out(
        &self,
        request: &ReplicationRequest,
        nodes: &[String],
    ) -> Result<(), CitrineDBError> {
        let lock = self
            .substrate
            .lock(&request_lock_name(&request.database));
        let guard = lock.acquire().await?;

        for node in nodes {
            let queue = self
                .substrate
                .queue(&request_queue_name(node, &request.database));
            if !queue
                .offer(
                    QueueMessage::Request(request.clone()),
                    self.settings.queue_timeout,
                )
                .await
            {
                // The guard drops on this exit path, releasing the lock.
                return Err(CitrineDBError::SendFailed(format!(
                    "timed out offering request {} to the queue of node {node}",
                    request.id
                )));
            }
            debug!("Request {} offered to node {}", request.id, node);
        }

        drop(guard);
        Ok(())
    }

    /// Drains the sender-thread inbox until the synchronous phase completes
    /// or its deadline passes, then reduces whatever arrived.
    async fn collect_responses(
        &self,
        request: &ReplicationRequest,
        manager: &ResponseManager,
        inbox: &ResponseInbox,
    ) -> Result<ReplicationResponse, CitrineDBError> {
        let begin = Instant::now();
        let sync_timeout = request
            .payload
            .synchronous_timeout(manager.expected_synchronous());

        while manager.should_wait_for_sync() {
            let remaining = sync_timeout.saturating_sub(begin.elapsed());
            if remaining.is_zero() {
                warn!(
                    "Request {}: synchronous phase timed out after {:?} with {}/{} responses",
                    request.id,
                    sync_timeout,
                    manager.received_count(),
                    manager.expected_synchronous()
                );
                break;
            }
            match inbox.poll(remaining).await {
                None => {
                    warn!(
                        "Request {}: no response within {:?} ({}/{} received)",
                        request.id,
                        sync_timeout,
                        manager.received_count(),
                        manager.expected_synchronous()
                    );
                    break;
                }
                Some(response) if response.request_id != request.id => {
                    // Cross-talk: this thread's inbox can carry responses for
                    // another outstanding request.
                    debug!(
                        "Discarding response for request {} while collecting request {}",
                        response.request_id, request.id
                    );
                    continue;
                }
                Some(response) => {
                    manager.record(response);
                }
            }
        }

        if manager.executes_on_local() && !manager.received_from_local() {
            warn!(
                "Request {}: the local node was targeted but never answered",
                request.id
            );
        }

        if !manager.quorum_reached() {
            warn!(
                "Request {}: quorum shortfall ({}/{}); invoking the compensating action",
                request.id,
                manager.received_count(),
                manager.quorum()
            );
            request.payload.undo().await;
        }

        manager
            .result(request.payload.result_strategy())
            .ok_or_else(|| CitrineDBError::NoResponse(request.id.to_string()))
    }
}
