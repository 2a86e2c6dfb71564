// src/core/replication/mod.rs

//! The per-database replication coordinator.
//!
//! One `DatabaseReplicator` runs per hosted database per node and owns both
//! flows: outbound fan-out with quorum collection (`send`), and the inbound
//! worker draining this node's request queue. Startup replays the
//! crash-durable undo slot and any queued work-in-progress before normal
//! draining begins, then reconciles this node into the partition layout.

pub mod messages;
pub mod messenger;
pub mod receiver;
pub mod responses;
pub mod sender;

pub use messages::{ExecutionMode, ReplicationRequest, ReplicationResponse, RequestId, SenderId};
pub use messenger::MessageService;
pub use receiver::{ReceiverState, RequestReceiver};
pub use responses::ResponseManager;

use crate::config::ReplicationSettings;
use crate::core::CitrineDBError;
use crate::core::cluster::admin::ClusterAdmin;
use crate::core::cluster::partitioner::PartitionerRegistry;
use crate::core::cluster::reconciler::MembershipReconciler;
use crate::core::cluster::substrate::{QueueMessage, QueueSubstrate};
use crate::core::storage::DocumentStore;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

pub struct DatabaseReplicator {
    database_name: String,
    database: Arc<dyn DocumentStore>,
    admin: Arc<dyn ClusterAdmin>,
    substrate: Arc<dyn QueueSubstrate>,
    messenger: Arc<MessageService>,
    partitioners: Arc<PartitionerRegistry>,
    settings: ReplicationSettings,
    shutdown_tx: broadcast::Sender<()>,
    worker: Mutex<Option<JoinHandle<()>>>,
    receiver_state: Arc<RwLock<ReceiverState>>,
    started: AtomicBool,
}

impl DatabaseReplicator {
    pub fn new(
        database: Arc<dyn DocumentStore>,
        admin: Arc<dyn ClusterAdmin>,
        substrate: Arc<dyn QueueSubstrate>,
        messenger: Arc<MessageService>,
        partitioners: Arc<PartitionerRegistry>,
        settings: ReplicationSettings,
    ) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            database_name: database.name().to_string(),
            database,
            admin,
            substrate,
            messenger,
            partitioners,
            settings,
            shutdown_tx,
            worker: Mutex::new(None),
            receiver_state: Arc::new(RwLock::new(ReceiverState::Idle)),
            started: AtomicBool::new(false),
        }
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }

    pub fn database(&self) -> Arc<dyn DocumentStore> {
        self.database.clone()
    }

    /// Current phase of the inbound worker.
    pub fn receiver_state(&self) -> ReceiverState {
        *self.receiver_state.read()
    }

    /// Brings the inbound side of this database up: crash recovery first,
    /// then the drain of queued work-in-progress, then the long-lived
    /// receiver worker, and finally the membership reconciler.
    pub async fn configure_database(&self) -> Result<(), CitrineDBError> {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!(
                "Database '{}' is already configured for replication",
                self.database_name
            );
            return Ok(());
        }

        let local = self.admin.local_node_name().to_string();
        info!(
            "Configuring database '{}' for replication on node {}",
            self.database_name, local
        );

        let receiver = RequestReceiver::new(
            local,
            self.database.clone(),
            self.substrate.clone(),
            self.settings.queue_timeout,
            self.receiver_state.clone(),
        );

        // Crash recovery: a populated undo slot is the request the previous
        // incarnation took but never acknowledged. Re-execute it through the
        // normal inbound path; failures must not keep the receiver down.
        if let Some(value) = receiver.undo_map().remove(&self.database_name).await {
            match value.into_request() {
                Some(pending) => {
                    warn!(
                        "Found interrupted request {} in the undo slot of database '{}'; re-executing",
                        pending.id, self.database_name
                    );
                    if let Err(e) = receiver.process(pending).await {
                        error!(
                            "Crash recovery for database '{}' failed: {e}",
                            self.database_name
                        );
                    }
                }
                None => warn!(
                    "Undo slot of database '{}' held an unexpected value; discarding",
                    self.database_name
                ),
            }
        }

        // Messages already queued are valid work-in-progress from before the
        // restart; hand them to the normal flow ahead of the worker.
        let mut drained = 0usize;
        while let Some(msg) = receiver.request_queue().poll(Duration::ZERO).await {
            match msg {
                QueueMessage::Request(request) => {
                    let id = request.id.clone();
                    if let Err(e) = receiver.process(request).await {
                        warn!("Processing pending request {id} failed: {e}");
                    }
                    drained += 1;
                }
                QueueMessage::Response(response) => warn!(
                    "Response for request {} found on the request queue of database '{}'; dropping",
                    response.request_id, self.database_name
                ),
            }
        }
        if drained > 0 {
            info!(
                "Processed {drained} pending requests for database '{}' found at startup",
                self.database_name
            );
        }

        let handle = tokio::spawn(receiver.run(self.shutdown_tx.subscribe()));
        *self.worker.lock() = Some(handle);

        MembershipReconciler::new(self.admin.clone(), self.substrate.clone())
            .reconcile(&self.database_name)
            .await?;

        Ok(())
    }

    /// Stops the inbound worker and closes the database handle, in that
    /// order: signal, join, close. Safe to call more than once.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        self.database.close();
        info!(
            "Replication for database '{}' shut down",
            self.database_name
        );
    }
}
