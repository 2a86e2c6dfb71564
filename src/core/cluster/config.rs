// src/core/cluster/config.rs

//! The per-database distributed configuration: which nodes own which
//! intra-database cluster, the write quorum, and the partitioning strategy
//! used to resolve a request's target node set.

use crate::core::CitrineDBError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder slot in a partition list, filled in by the membership
/// reconciler when a new node joins. Matched case-insensitively.
pub const NEW_NODE_TAG: &str = "$newNode";

/// The layout entry used when a request names no cluster, or names one with
/// no dedicated entry.
pub const DEFAULT_CLUSTER: &str = "*";

fn default_strategy() -> String {
    "all".to_string()
}

fn default_write_quorum() -> usize {
    2
}

/// Layout of a single intra-database cluster: its partitions, and optional
/// overrides for quorum and strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterLayout {
    /// Name of the partitioning strategy resolving this cluster's node set.
    #[serde(default = "default_strategy")]
    pub strategy: String,
    /// Per-cluster write quorum override.
    #[serde(default)]
    pub write_quorum: Option<usize>,
    /// Ordered partitions, each an ordered list of node names. A slot may
    /// hold the [`NEW_NODE_TAG`] sentinel.
    #[serde(default)]
    pub partitions: Vec<Vec<String>>,
}

/// The distributed configuration of one database, as published in the
/// cluster-visible configuration map.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributedDatabaseConfig {
    /// Write quorum applied to clusters without their own override.
    #[serde(default = "default_write_quorum")]
    pub write_quorum: usize,
    /// Cluster layouts keyed by intra-database cluster name. The
    /// [`DEFAULT_CLUSTER`] entry covers database-wide requests.
    #[serde(default)]
    pub clusters: BTreeMap<String, ClusterLayout>,
}

impl DistributedDatabaseConfig {
    /// Names of all configured intra-database clusters, in stable order.
    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.keys().cloned().collect()
    }

    fn layout(&self, cluster: Option<&str>) -> Option<&ClusterLayout> {
        match cluster {
            Some(name) => self
                .clusters
                .get(name)
                .or_else(|| self.clusters.get(DEFAULT_CLUSTER)),
            None => self.clusters.get(DEFAULT_CLUSTER),
        }
    }

    /// The write quorum governing `cluster` (falls back to the database-wide
    /// value).
    pub fn write_quorum(&self, cluster: Option<&str>) -> usize {
        self.layout(cluster)
            .and_then(|layout| layout.write_quorum)
            .unwrap_or(self.write_quorum)
    }

    /// Name of the partitioning strategy governing `cluster`.
    pub fn partition_strategy(&self, cluster: Option<&str>) -> String {
        self.layout(cluster)
            .map(|layout| layout.strategy.clone())
            .unwrap_or_else(default_strategy)
    }

    /// Ordered partitions of `cluster`, falling back to the default layout.
    pub fn partitions(&self, cluster: Option<&str>) -> Vec<Vec<String>> {
        self.layout(cluster)
            .map(|layout| layout.partitions.clone())
            .unwrap_or_default()
    }

    /// Ordered partitions of every cluster, for database-wide requests.
    pub fn all_partitions(&self) -> Vec<Vec<String>> {
        self.clusters
            .values()
            .flat_map(|layout| layout.partitions.iter().cloned())
            .collect()
    }

    /// Whether `node` already occupies a slot in any partition of any cluster.
    pub fn contains_node(&self, node: &str) -> bool {
        self.clusters.values().any(|layout| {
            layout
                .partitions
                .iter()
                .any(|partition| partition.iter().any(|slot| slot == node))
        })
    }

    /// Replaces the first [`NEW_NODE_TAG`] slot of every partition with
    /// `node`. Returns whether any slot changed.
    pub fn splice_new_node(&mut self, node: &str) -> bool {
        let mut changed = false;
        for layout in self.clusters.values_mut() {
            for partition in &mut layout.partitions {
                if let Some(slot) = partition
                    .iter_mut()
                    .find(|slot| slot.eq_ignore_ascii_case(NEW_NODE_TAG))
                {
                    *slot = node.to_string();
                    changed = true;
                }
            }
        }
        changed
    }

    /// Serializes the configuration to the document form stored in the
    /// cluster-visible configuration map.
    pub fn serialize(&self) -> Result<serde_json::Value, CitrineDBError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Rebuilds a configuration from its published document form.
    pub fn from_document(document: &serde_json::Value) -> Result<Self, CitrineDBError> {
        Ok(serde_json::from_value(document.clone())?)
    }
}
