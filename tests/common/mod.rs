#![allow(dead_code)]

use citrinedb::config::ReplicationSettings;
use citrinedb::core::cluster::config::{ClusterLayout, DistributedDatabaseConfig};
use citrinedb::core::cluster::partitioner::PartitionerRegistry;
use citrinedb::core::cluster::substrate::QueueSubstrate;
use citrinedb::core::cluster::{MemorySubstrate, StaticClusterAdmin};
use citrinedb::core::replication::{DatabaseReplicator, MessageService};
use citrinedb::core::storage::MemoryDocumentStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Honors `RUST_LOG` so a failing scenario can be rerun with full logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Settings tightened for tests: a stuck offer should fail the test in
/// about a second, not five.
pub fn test_settings() -> ReplicationSettings {
    ReplicationSettings {
        queue_timeout: Duration::from_secs(1),
        inbox_capacity: 64,
    }
}

/// A database-wide layout: one cluster ("*") with a single partition
/// holding every node.
pub fn layout_all(nodes: &[&str], write_quorum: usize) -> DistributedDatabaseConfig {
    let mut clusters = BTreeMap::new();
    clusters.insert(
        "*".to_string(),
        ClusterLayout {
            strategy: "all".to_string(),
            write_quorum: None,
            partitions: vec![nodes.iter().map(|node| node.to_string()).collect()],
        },
    );
    DistributedDatabaseConfig {
        write_quorum,
        clusters,
    }
}

pub struct TestNode {
    pub name: String,
    pub admin: Arc<StaticClusterAdmin>,
    pub store: Arc<MemoryDocumentStore>,
    pub messenger: Arc<MessageService>,
    pub replicator: Arc<DatabaseReplicator>,
}

/// An in-process cluster: every node shares one substrate, each node has
/// its own admin, store, message service, and replicator.
pub struct TestCluster {
    pub database: String,
    pub substrate: Arc<MemorySubstrate>,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// Builds and configures every node of a database-wide cluster.
    pub async fn start(database: &str, node_names: &[&str], write_quorum: usize) -> Self {
        let cluster = Self::build(database, node_names, layout_all(node_names, write_quorum)).await;
        for node in &cluster.nodes {
            node.replicator.configure_database().await.unwrap();
        }
        cluster
    }

    /// Builds every node without configuring any replicator, so tests can
    /// control startup order.
    pub async fn build(
        database: &str,
        node_names: &[&str],
        config: DistributedDatabaseConfig,
    ) -> Self {
        init_tracing();
        let substrate = Arc::new(MemorySubstrate::new());
        let mut nodes = Vec::new();
        for name in node_names {
            nodes.push(build_node(database, name, node_names, substrate.clone(), config.clone()).await);
        }
        Self {
            database: database.to_string(),
            substrate,
            nodes,
        }
    }

    pub fn node(&self, name: &str) -> &TestNode {
        self.nodes
            .iter()
            .find(|node| node.name == name)
            .unwrap_or_else(|| panic!("no test node named '{name}'"))
    }

    pub async fn shutdown(&self) {
        for node in &self.nodes {
            node.replicator.shutdown().await;
            node.messenger.shutdown().await;
        }
    }
}

pub async fn build_node(
    database: &str,
    name: &str,
    peers: &[&str],
    substrate: Arc<MemorySubstrate>,
    config: DistributedDatabaseConfig,
) -> TestNode {
    let admin = Arc::new(StaticClusterAdmin::new(name, peers));
    admin.register_database(database, config);
    let store = Arc::new(MemoryDocumentStore::new(database));
    let messenger = MessageService::new(
        name,
        substrate.clone() as Arc<dyn QueueSubstrate>,
        test_settings(),
    );
    messenger.start().await;
    let replicator = Arc::new(DatabaseReplicator::new(
        store.clone(),
        admin.clone(),
        substrate.clone(),
        messenger.clone(),
        Arc::new(PartitionerRegistry::with_builtins()),
        test_settings(),
    ));
    TestNode {
        name: name.to_string(),
        admin,
        store,
        messenger,
        replicator,
    }
}

/// Polls `predicate` for up to two seconds.
pub async fn wait_until(mut predicate: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if predicate() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    predicate()
}
