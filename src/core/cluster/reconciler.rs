// src/core/cluster/reconciler.rs

//! The membership reconciler splices the local node into partition layouts
//! on first join: any `$newNode` placeholder slot becomes this node, and the
//! updated configuration is republished cluster-wide.

use super::admin::ClusterAdmin;
use super::substrate::{QueueSubstrate, SharedValue};
use crate::core::CitrineDBError;
use crate::core::replication::messages::{CONFIG_MAP, config_map_key};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct MembershipReconciler {
    admin: Arc<dyn ClusterAdmin>,
    substrate: Arc<dyn QueueSubstrate>,
}

impl MembershipReconciler {
    pub fn new(admin: Arc<dyn ClusterAdmin>, substrate: Arc<dyn QueueSubstrate>) -> Self {
        Self { admin, substrate }
    }

    /// Ensures the local node appears in the partition layout of `database`.
    /// Returns whether the configuration was changed and republished.
    pub async fn reconcile(&self, database: &str) -> Result<bool, CitrineDBError> {
        let Some(config) = self.admin.database_configuration(database) else {
            debug!(
                "No distributed configuration present for database '{}', nothing to reconcile",
                database
            );
            return Ok(false);
        };

        let local = self.admin.local_node_name();
        if config.contains_node(local) {
            debug!(
                "Node {} already present in the partition layout of database '{}'",
                local, database
            );
            return Ok(false);
        }

        let mut updated = (*config).clone();
        if !updated.splice_new_node(local) {
            warn!(
                "Node {} is not in the partition layout of database '{}' and no '{}' placeholder is available",
                local,
                database,
                super::config::NEW_NODE_TAG
            );
            return Ok(false);
        }

        let document = updated.serialize()?;
        self.substrate
            .map(CONFIG_MAP)
            .put(&config_map_key(database), SharedValue::Document(document))
            .await;
        self.admin.apply_configuration(database, updated);
        info!(
            "Node {} joined the partition layout of database '{}'; configuration republished",
            local, database
        );
        Ok(true)
    }
}
