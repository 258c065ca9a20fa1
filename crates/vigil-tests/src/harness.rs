//! Multi-replica test harness.

use std::sync::Arc;
use vigil_store::{ReplicaConfig, ReplicaStore};
use vigil_sync::{
    AntiEntropy, GossipConfig, InProcessConnector, PeerRecord, StaticDirectory,
};

/// A cluster of replica stores joined by the in-process transport.
///
/// Gossip is driven explicitly through [`ReplicaCluster::round`], so
/// scenarios control exactly how far knowledge has spread at every
/// assertion point.
pub struct ReplicaCluster {
    stores: Vec<Arc<ReplicaStore>>,
    drivers: Vec<AntiEntropy>,
    cluster_size: usize,
}

impl ReplicaCluster {
    /// Build a cluster of `n` replicas with ids `1..=n` and clock width
    /// `n` (every replica lists every other in the registry).
    pub fn new(n: usize) -> Self {
        let stores: Vec<Arc<ReplicaStore>> = (1..=n)
            .map(|id| {
                let config = ReplicaConfig {
                    replica_id: id,
                    cluster_size: n,
                };
                Arc::new(ReplicaStore::new(config).expect("valid test config"))
            })
            .collect();

        let records: Vec<PeerRecord> = (1..=n)
            .map(|id| PeerRecord::new(id.to_string(), format!("mem://{id}")))
            .collect();
        let directory = Arc::new(StaticDirectory::new("/vigil/replicas", records));

        let mut connector = InProcessConnector::new();
        for store in &stores {
            connector.register(format!("mem://{}", store.replica_id()), Arc::clone(store));
        }
        let connector = Arc::new(connector);

        let drivers = stores
            .iter()
            .map(|store| {
                AntiEntropy::new(
                    Arc::clone(store),
                    directory.clone(),
                    connector.clone(),
                    GossipConfig::default(),
                )
            })
            .collect();

        Self {
            stores,
            drivers,
            cluster_size: n,
        }
    }

    /// The store of 1-based `replica`.
    pub fn store(&self, replica: usize) -> &Arc<ReplicaStore> {
        &self.stores[replica - 1]
    }

    /// All stores, in replica order.
    pub fn stores(&self) -> &[Arc<ReplicaStore>] {
        &self.stores
    }

    /// An all-zero caller clock of the cluster's width.
    pub fn zero_clock(&self) -> Vec<u64> {
        vec![0; self.cluster_size]
    }

    /// Run one gossip round on every replica, in replica order.
    pub async fn round(&self) {
        for driver in &self.drivers {
            driver.run_round().await;
        }
    }

    /// Run `k` full rounds.
    pub async fn rounds(&self, k: usize) {
        for _ in 0..k {
            self.round().await;
        }
    }

    /// Register `sentry` on every replica (collectors may report anywhere).
    pub fn register_everywhere(&self, sentry: &str, lat: f32, lon: f32) {
        for store in &self.stores {
            store
                .register_sentry(sentry, lat, lon)
                .expect("registration is idempotent");
        }
    }

    /// Sorted canonical renderings of a replica's visible list, for
    /// set-equality comparisons between replicas.
    pub fn visible_renderings(&self, replica: usize) -> Vec<String> {
        let mut rendered: Vec<String> = self
            .store(replica)
            .visible_snapshot()
            .iter()
            .map(|obs| obs.to_string())
            .collect();
        rendered.sort();
        rendered
    }
}
