// src/core/cluster/admin.rs

//! The narrow cluster-administration capability the replication core
//! depends on: node identity, availability, and access to per-database
//! distributed configurations. The concrete membership protocol
//! (heartbeats, split-brain detection) lives behind this trait.

use super::config::DistributedDatabaseConfig;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::info;

/// Capability surface over the cluster-membership substrate.
pub trait ClusterAdmin: Send + Sync {
    /// The cluster-visible name of this node.
    fn local_node_name(&self) -> &str;

    /// Whether `node` is currently reachable. Unavailable nodes are still
    /// broadcast to (their queues persist); they are only excluded from the
    /// synchronous-wait count.
    fn is_node_available(&self, node: &str) -> bool;

    /// The distributed configuration of `database`, if one exists.
    fn database_configuration(&self, database: &str) -> Option<Arc<DistributedDatabaseConfig>>;

    /// Applies a reconciled configuration. Called by the membership
    /// reconciler after it has published the updated document.
    fn apply_configuration(&self, database: &str, config: DistributedDatabaseConfig);
}

/// A fixed-membership `ClusterAdmin` for in-process clusters and tests.
/// Availability is togglable per node.
pub struct StaticClusterAdmin {
    local_node: String,
    /// The unique run id of this node incarnation, used for log correlation.
    run_id: String,
    nodes: DashMap<String, bool>,
    configs: DashMap<String, Arc<DistributedDatabaseConfig>>,
}

impl StaticClusterAdmin {
    pub fn new(local_node: impl Into<String>, peers: &[&str]) -> Self {
        let local_node = local_node.into();
        let run_id = hex::encode(rand::random::<[u8; 8]>());
        let nodes = DashMap::new();
        nodes.insert(local_node.clone(), true);
        for peer in peers {
            nodes.insert(peer.to_string(), true);
        }
        info!("Node {} starting with run id {}", local_node, run_id);
        Self {
            local_node,
            run_id,
            nodes,
            configs: DashMap::new(),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Marks a node reachable or unreachable.
    pub fn set_available(&self, node: &str, available: bool) {
        self.nodes.insert(node.to_string(), available);
    }

    /// Installs the distributed configuration for `database`.
    pub fn register_database(&self, database: &str, config: DistributedDatabaseConfig) {
        self.configs.insert(database.to_string(), Arc::new(config));
    }
}

impl ClusterAdmin for StaticClusterAdmin {
    fn local_node_name(&self) -> &str {
        &self.local_node
    }

    fn is_node_available(&self, node: &str) -> bool {
        self.nodes.get(node).map(|entry| *entry).unwrap_or(false)
    }

    fn database_configuration(&self, database: &str) -> Option<Arc<DistributedDatabaseConfig>> {
        self.configs.get(database).map(|entry| entry.value().clone())
    }

    fn apply_configuration(&self, database: &str, config: DistributedDatabaseConfig) {
        info!(
            "Applying updated distributed configuration for database '{}'",
            database
        );
        self.configs.insert(database.to_string(), Arc::new(config));
    }
}
