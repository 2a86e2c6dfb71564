// src/config.rs

//! Manages node configuration for the replication layer: loading,
//! defaulting, and validation.

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use std::time::Duration;

/// Settings governing the distributed request/response machinery.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ReplicationSettings {
    /// Upper bound for every queue `offer` and for the response-queue
    /// dispatch performed by the inbound worker.
    #[serde(with = "humantime_serde", default = "default_queue_timeout")]
    pub queue_timeout: Duration,
    /// Capacity of each per-sender-thread response inbox.
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
}

impl Default for ReplicationSettings {
    fn default() -> Self {
        Self {
            queue_timeout: default_queue_timeout(),
            inbox_capacity: default_inbox_capacity(),
        }
    }
}

fn default_queue_timeout() -> Duration {
    Duration::from_secs(5)
}
fn default_inbox_capacity() -> usize {
    256
}
fn default_log_level() -> String {
    "info".to_string()
}

/// The top-level node configuration, loaded from a TOML file.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Config {
    /// The cluster-visible name of this node. Request ids and queue names
    /// are derived from it, so it must be unique across the cluster.
    pub node_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub replication: ReplicationSettings,
}

impl Config {
    /// Creates a new `Config` instance by reading and parsing a TOML file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse TOML from '{path}'"))?;

        config.validate()?;
        Ok(config)
    }

    /// Validates the resolved configuration to ensure logical consistency.
    fn validate(&self) -> Result<()> {
        if self.node_name.trim().is_empty() {
            return Err(anyhow!("node_name cannot be empty"));
        }
        if self.node_name.contains('.') {
            // Queue names use '.' as a separator.
            return Err(anyhow!("node_name cannot contain '.'"));
        }
        if self.replication.queue_timeout.is_zero() {
            return Err(anyhow!("replication.queue_timeout cannot be 0"));
        }
        if self.replication.inbox_capacity == 0 {
            return Err(anyhow!("replication.inbox_capacity cannot be 0"));
        }
        Ok(())
    }
}
