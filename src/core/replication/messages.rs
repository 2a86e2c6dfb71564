// src/core/replication/messages.rs

//! Request and response envelopes, request identity, and the wire-visible
//! naming scheme for queues, maps, and locks.

use crate::core::tasks::ReplicationTask;
use bytes::Bytes;
use std::fmt;
use std::sync::Arc;
use strum_macros::Display;

/// Name of the request queue the receiver on `node` drains for `database`.
pub fn request_queue_name(node: &str, database: &str) -> String {
    format!("citrinedb.node.{node}.{database}.request")
}

/// Name of the shared response queue feeding `node`'s response router.
pub fn response_queue_name(node: &str) -> String {
    format!("citrinedb.node.{node}.response")
}

/// Name of the map holding `node`'s undo slot for `database`.
pub fn undo_map_name(node: &str, database: &str) -> String {
    format!("citrinedb.node.{node}.{database}.undo")
}

/// Name of the cluster-wide lock linearizing request fan-out for `database`.
pub fn request_lock_name(database: &str) -> String {
    format!("citrinedb.reqlock.{database}")
}

/// Name of the cluster-visible map holding published distributed
/// configurations.
pub const CONFIG_MAP: &str = "citrinedb.config";

/// Key of `database`'s entry in [`CONFIG_MAP`].
pub fn config_map_key(database: &str) -> String {
    format!("database.{database}")
}

/// Cluster-unique request identity: originating node name plus a counter
/// local to that node.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestId {
    pub node: String,
    pub seq: u64,
}

impl RequestId {
    pub fn new(node: impl Into<String>, seq: u64) -> Self {
        Self {
            node: node.into(),
            seq,
        }
    }

    /// Placeholder identity carried by a request until `send` stamps it.
    pub fn unassigned() -> Self {
        Self {
            node: String::new(),
            seq: 0,
        }
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.seq)
    }
}

/// Identity of one outbound `send` call on its originating node, allocated
/// by the message service. The responder copies it into the response, and
/// the router uses it to find the inbox that send is collecting on. Worker
/// threads are pooled and recycled, so this is a per-call identity, never
/// an OS thread id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(pub u64);

impl SenderId {
    /// Placeholder identity carried by a request until `send` stamps it.
    pub fn unassigned() -> Self {
        Self(0)
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether the sender waits for responses at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ExecutionMode {
    Response,
    NoResponse,
}

/// The envelope broadcast to every replica owning the target partition.
#[derive(Debug, Clone)]
pub struct ReplicationRequest {
    pub id: RequestId,
    pub sender_node: String,
    /// Identifies the response inbox the originating send collects on.
    pub sender_thread: SenderId,
    pub database: String,
    /// Target intra-database cluster; `None` addresses the whole database.
    pub cluster: Option<String>,
    pub mode: ExecutionMode,
    pub payload: Arc<dyn ReplicationTask>,
}

impl ReplicationRequest {
    /// Builds a request ready to hand to `send`, which assigns its identity
    /// and sender stamps.
    pub fn new(
        database: impl Into<String>,
        cluster: Option<String>,
        mode: ExecutionMode,
        payload: Arc<dyn ReplicationTask>,
    ) -> Self {
        Self {
            id: RequestId::unassigned(),
            sender_node: String::new(),
            sender_thread: SenderId::unassigned(),
            database: database.into(),
            cluster,
            mode,
            payload,
        }
    }
}

/// A replica's answer to one request, routed back to the originating node
/// and demultiplexed to the originating send's inbox.
#[derive(Debug, Clone)]
pub struct ReplicationResponse {
    pub request_id: RequestId,
    /// The responding node.
    pub sender_node: String,
    pub destination_node: String,
    pub destination_thread: SenderId,
    pub payload: Bytes,
}
