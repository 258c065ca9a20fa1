//! Replica configuration.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Configuration for one replica's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaConfig {
    /// This replica's 1-based identifier within the cluster.
    pub replica_id: usize,
    /// Fixed cluster size; every vector clock carries this many slots.
    pub cluster_size: usize,
}

impl Default for ReplicaConfig {
    fn default() -> Self {
        Self {
            replica_id: 1,
            cluster_size: 10,
        }
    }
}

impl ReplicaConfig {
    /// Create a config with the given replica id and the default cluster
    /// size of 10.
    pub fn new(replica_id: usize) -> Self {
        Self {
            replica_id,
            ..Default::default()
        }
    }

    /// Validate that the replica id fits the cluster. A failure here is the
    /// only startup-fatal condition the store knows about.
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.cluster_size == 0 || self.replica_id == 0 || self.replica_id > self.cluster_size {
            return Err(StoreError::InvalidReplicaId {
                replica_id: self.replica_id,
                cluster_size: self.cluster_size,
            });
        }
        Ok(())
    }
}
