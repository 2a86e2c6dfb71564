// src/core/cluster/partitioner.rs

//! Partitioning strategies: given a database and an optional intra-database
//! cluster, resolve the ordered set of nodes that own the target data.
//! Strategies are looked up by name so deployments can plug their own.

use super::config::{DistributedDatabaseConfig, NEW_NODE_TAG};
use crate::core::CitrineDBError;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An ordered, de-duplicated set of node names owning a partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub nodes: Vec<String>,
}

impl Partition {
    fn from_slots<'a>(slots: impl IntoIterator<Item = &'a String>) -> Self {
        let mut nodes: Vec<String> = Vec::new();
        for slot in slots {
            // Sentinel slots are placeholders, never broadcast targets.
            if slot.eq_ignore_ascii_case(NEW_NODE_TAG) {
                continue;
            }
            if !nodes.iter().any(|existing| existing == slot) {
                nodes.push(slot.clone());
            }
        }
        Self { nodes }
    }
}

/// Resolves the node set owning `(database, cluster)`. Availability is not
/// a strategy concern; the sender checks it separately.
pub trait PartitioningStrategy: Send + Sync + std::fmt::Debug {
    fn partition(
        &self,
        config: &DistributedDatabaseConfig,
        database: &str,
        cluster: Option<&str>,
    ) -> Result<Partition, CitrineDBError>;
}

/// Targets every member of every partition of the addressed cluster, or of
/// all clusters for a database-wide request. Layout order is preserved.
#[derive(Debug)]
pub struct AllNodesStrategy;

impl PartitioningStrategy for AllNodesStrategy {
    fn partition(
        &self,
        config: &DistributedDatabaseConfig,
        database: &str,
        cluster: Option<&str>,
    ) -> Result<Partition, CitrineDBError> {
        let partitions = match cluster {
            Some(_) => config.partitions(cluster),
            None => config.all_partitions(),
        };
        let partition = Partition::from_slots(partitions.iter().flatten());
        if partition.nodes.is_empty() {
            return Err(CitrineDBError::Config(format!(
                "no nodes own cluster '{}' of database '{}'",
                cluster.unwrap_or("*"),
                database
            )));
        }
        Ok(partition)
    }
}

/// Rotates through the addressed cluster's partitions, targeting one
/// partition per request.
#[derive(Debug)]
pub struct RoundRobinStrategy {
    next: AtomicUsize,
}

impl RoundRobinStrategy {
    pub fn new() -> Self {
        Self {
            next: AtomicUsize::new(0),
        }
    }
}

impl Default for RoundRobinStrategy {
    fn default() -> Self {
        Self::new()
    }
}

impl PartitioningStrategy for RoundRobinStrategy {
    fn partition(
        &self,
        config: &DistributedDatabaseConfig,
        database: &str,
        cluster: Option<&str>,
    ) -> Result<Partition, CitrineDBError> {
        let partitions = match cluster {
            Some(_) => config.partitions(cluster),
            None => config.all_partitions(),
        };
        let non_empty: Vec<&Vec<String>> = partitions
            .iter()
            .filter(|partition| !partition.is_empty())
            .collect();
        if non_empty.is_empty() {
            return Err(CitrineDBError::Config(format!(
                "no partitions configured for cluster '{}' of database '{}'",
                cluster.unwrap_or("*"),
                database
            )));
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % non_empty.len();
        let partition = Partition::from_slots(non_empty[index].iter());
        if partition.nodes.is_empty() {
            return Err(CitrineDBError::Config(format!(
                "partition #{index} of cluster '{}' of database '{}' holds only placeholder slots",
                cluster.unwrap_or("*"),
                database
            )));
        }
        Ok(partition)
    }
}

/// Registry of partitioning strategies, keyed by the name the distributed
/// configuration refers to them by.
pub struct PartitionerRegistry {
    strategies: DashMap<String, Arc<dyn PartitioningStrategy>>,
}

impl PartitionerRegistry {
    /// Creates a registry preloaded with the builtin strategies.
    pub fn with_builtins() -> Self {
        let registry = Self {
            strategies: DashMap::new(),
        };
        registry.register("all", Arc::new(AllNodesStrategy));
        registry.register("round-robin", Arc::new(RoundRobinStrategy::new()));
        registry
    }

    pub fn register(&self, name: &str, strategy: Arc<dyn PartitioningStrategy>) {
        self.strategies.insert(name.to_string(), strategy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PartitioningStrategy>> {
        self.strategies.get(name).map(|entry| entry.value().clone())
    }

    /// Like [`get`](Self::get), but missing strategies surface as a
    /// configuration error.
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn PartitioningStrategy>, CitrineDBError> {
        self.get(name).ok_or_else(|| {
            CitrineDBError::Config(format!("unknown partitioning strategy '{name}'"))
        })
    }
}

impl Default for PartitionerRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
