//! Discovery and peer-transport boundaries.
//!
//! The gossip driver consumes these traits and nothing else about the
//! outside world: a [`Directory`] lists the replica records registered
//! under a service path, a [`PeerConnector`] turns one record into a
//! [`PeerClient`], and a client answers pulls. In production these wrap
//! the naming registry and the RPC transport; the in-process
//! implementations here back the test harness.

use crate::error::SyncError;
use crate::exchange::handle_pull;
use crate::protocol::{PullRequest, PullReply};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use vigil_store::ReplicaStore;

/// One replica's entry in the discovery registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    /// Registry node id (the replica number, as registered).
    pub id: String,
    /// Dialable address of the replica's pull endpoint.
    pub uri: String,
}

impl PeerRecord {
    /// Create a record.
    pub fn new(id: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            uri: uri.into(),
        }
    }
}

/// The naming/discovery registry, as the gossip scheduler sees it.
#[async_trait]
pub trait Directory: Send + Sync {
    /// List every record registered under `path`.
    async fn list(&self, path: &str) -> Result<Vec<PeerRecord>, SyncError>;

    /// Resolve one record by id under `path`.
    async fn resolve(&self, path: &str, id: &str) -> Result<PeerRecord, SyncError>;
}

/// A connected pull endpoint on one peer replica.
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Issue one pull with the requester's clock.
    async fn pull(&self, request: PullRequest) -> Result<PullReply, SyncError>;
}

/// Dials peer records into clients.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    /// Connect to the replica behind `record`.
    async fn connect(&self, record: &PeerRecord) -> Result<Box<dyn PeerClient>, SyncError>;
}

/// A fixed in-memory registry for tests and single-host setups.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    path: String,
    records: Vec<PeerRecord>,
}

impl StaticDirectory {
    /// Create a registry serving `records` under `path`.
    pub fn new(path: impl Into<String>, records: Vec<PeerRecord>) -> Self {
        Self {
            path: path.into(),
            records,
        }
    }
}

#[async_trait]
impl Directory for StaticDirectory {
    async fn list(&self, path: &str) -> Result<Vec<PeerRecord>, SyncError> {
        if path != self.path {
            return Err(SyncError::Directory {
                msg: format!("no records under {path}"),
            });
        }
        Ok(self.records.clone())
    }

    async fn resolve(&self, path: &str, id: &str) -> Result<PeerRecord, SyncError> {
        self.list(path)
            .await?
            .into_iter()
            .find(|record| record.id == id)
            .ok_or_else(|| SyncError::UnknownPeer { id: id.to_string() })
    }
}

/// In-process transport: connects URIs straight to store handles.
///
/// In production the connector dials the RPC transport; here a "connection"
/// is an `Arc` onto the peer's store and a pull is a direct call into the
/// responder logic.
#[derive(Clone, Default)]
pub struct InProcessConnector {
    stores: HashMap<String, Arc<ReplicaStore>>,
}

impl InProcessConnector {
    /// An empty connector; register endpoints with
    /// [`InProcessConnector::register`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `store` at `uri`.
    pub fn register(&mut self, uri: impl Into<String>, store: Arc<ReplicaStore>) {
        self.stores.insert(uri.into(), store);
    }
}

#[async_trait]
impl PeerConnector for InProcessConnector {
    async fn connect(&self, record: &PeerRecord) -> Result<Box<dyn PeerClient>, SyncError> {
        let store = self
            .stores
            .get(&record.uri)
            .cloned()
            .ok_or_else(|| SyncError::PeerUnreachable {
                uri: record.uri.clone(),
                msg: "no endpoint registered".to_string(),
            })?;
        Ok(Box::new(InProcessClient { store }))
    }
}

struct InProcessClient {
    store: Arc<ReplicaStore>,
}

#[async_trait]
impl PeerClient for InProcessClient {
    async fn pull(&self, request: PullRequest) -> Result<PullReply, SyncError> {
        Ok(handle_pull(&self.store, &request))
    }
}
