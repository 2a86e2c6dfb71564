// src/core/cluster/mod.rs

//! This module contains all logic related to cluster coordination: the
//! queue/map/lock substrate contracts and their in-process implementation,
//! the cluster-admin capability surface, per-database partition layouts,
//! partitioning strategies, and the membership reconciler.

pub mod admin;
pub mod config;
pub mod memory;
pub mod partitioner;
pub mod reconciler;
pub mod substrate;

// Re-export key types for easier access from other modules.
pub use admin::{ClusterAdmin, StaticClusterAdmin};
pub use config::{DistributedDatabaseConfig, NEW_NODE_TAG};
pub use memory::MemorySubstrate;
pub use partitioner::{Partition, PartitionerRegistry, PartitioningStrategy};
pub use substrate::{QueueMessage, QueueSubstrate, SharedLock, SharedMap, SharedQueue, SharedValue};
