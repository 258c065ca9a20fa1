//! The periodic anti-entropy driver.
//!
//! One [`AntiEntropy`] task runs per replica. Every round it lists the
//! registry, skips its own record, and pulls from every peer; a failed
//! exchange is logged and skipped for the round, never fatal. No store
//! lock is held across any await point — the store is only touched to
//! snapshot the clock before a pull and to merge after one.

use crate::error::SyncError;
use crate::exchange::apply_pull;
use crate::peer::{Directory, PeerConnector, PeerRecord};
use crate::protocol::PullRequest;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use vigil_store::ReplicaStore;

/// Configuration for the gossip driver.
#[derive(Debug, Clone)]
pub struct GossipConfig {
    /// Delay between rounds (the first round fires immediately).
    pub interval: Duration,
    /// Registry path the cluster's replicas are registered under.
    pub service_path: String,
}

impl Default for GossipConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            service_path: "/vigil/replicas".to_string(),
        }
    }
}

/// Outcome counters for one gossip round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    /// Peers successfully pulled from.
    pub contacted: usize,
    /// Peers skipped after a transport or merge failure.
    pub failed: usize,
    /// Observations merged into the local store this round.
    pub merged: usize,
}

/// The per-replica anti-entropy scheduler.
pub struct AntiEntropy {
    store: Arc<ReplicaStore>,
    directory: Arc<dyn Directory>,
    connector: Arc<dyn PeerConnector>,
    config: GossipConfig,
}

impl AntiEntropy {
    /// Create a driver for `store`, discovering peers through `directory`
    /// and dialing them through `connector`.
    pub fn new(
        store: Arc<ReplicaStore>,
        directory: Arc<dyn Directory>,
        connector: Arc<dyn PeerConnector>,
        config: GossipConfig,
    ) -> Self {
        Self {
            store,
            directory,
            connector,
            config,
        }
    }

    /// Run one full round: pull from every listed peer except ourselves.
    pub async fn run_round(&self) -> RoundStats {
        let mut stats = RoundStats::default();
        let records = match self.directory.list(&self.config.service_path).await {
            Ok(records) => records,
            Err(err) => {
                warn!(%err, "discovery unavailable, skipping gossip round");
                return stats;
            }
        };

        let self_id = self.store.replica_id().to_string();
        for record in records.iter().filter(|record| record.id != self_id) {
            match self.pull_from(record).await {
                Ok(merged) => {
                    stats.contacted += 1;
                    stats.merged += merged;
                }
                Err(err) => {
                    stats.failed += 1;
                    warn!(peer = %record.uri, %err, "exchange failed, skipping peer this round");
                }
            }
        }
        debug!(
            contacted = stats.contacted,
            failed = stats.failed,
            merged = stats.merged,
            "gossip round complete"
        );
        stats
    }

    async fn pull_from(&self, record: &PeerRecord) -> Result<usize, SyncError> {
        let client = self.connector.connect(record).await?;
        let request = PullRequest::new(self.store.global_clock().as_slice().to_vec());
        let reply = client.pull(request).await?;
        apply_pull(&self.store, reply).map_err(|err| SyncError::BadReply {
            msg: err.to_string(),
        })
    }

    /// Start the periodic task. The first round runs immediately, then one
    /// per configured interval until [`GossipHandle::stop`].
    pub fn spawn(self) -> GossipHandle {
        let (shutdown, mut observer) = watch::channel(false);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_round().await;
                    }
                    changed = observer.changed() => {
                        if changed.is_err() || *observer.borrow() {
                            break;
                        }
                    }
                }
            }
        });
        GossipHandle { shutdown, task }
    }
}

/// Handle for stopping a spawned gossip task.
pub struct GossipHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl GossipHandle {
    /// Signal the task to stop and wait for it to finish.
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{InProcessConnector, StaticDirectory};
    use vigil_store::ReplicaConfig;

    fn cluster(ids: &[usize]) -> (Vec<Arc<ReplicaStore>>, StaticDirectory, InProcessConnector) {
        let stores: Vec<Arc<ReplicaStore>> = ids
            .iter()
            .map(|&id| Arc::new(ReplicaStore::new(ReplicaConfig::new(id)).unwrap()))
            .collect();
        let records = ids
            .iter()
            .map(|id| PeerRecord::new(id.to_string(), format!("mem://{id}")))
            .collect();
        let mut connector = InProcessConnector::new();
        for store in &stores {
            connector.register(format!("mem://{}", store.replica_id()), Arc::clone(store));
        }
        let directory = StaticDirectory::new("/vigil/replicas", records);
        (stores, directory, connector)
    }

    fn driver(
        store: Arc<ReplicaStore>,
        directory: &StaticDirectory,
        connector: &InProcessConnector,
    ) -> AntiEntropy {
        AntiEntropy::new(
            store,
            Arc::new(directory.clone()),
            Arc::new(connector.clone()),
            GossipConfig::default(),
        )
    }

    fn admit(store: &ReplicaStore, mac: &str) {
        store.register_sentry("gate", 0.0, 0.0).unwrap();
        store
            .admit_write("gate", &[mac.to_string()], &vec![0; 10])
            .unwrap();
    }

    #[tokio::test]
    async fn test_round_pulls_missing_batches() {
        let (stores, directory, connector) = cluster(&[1, 2]);
        admit(&stores[0], "AA:AA:AA:AA:AA:AA");

        let stats = driver(Arc::clone(&stores[1]), &directory, &connector)
            .run_round()
            .await;
        assert_eq!(stats.contacted, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.merged, 1);
        assert_eq!(stores[1].visible_len(), 1);
        assert_eq!(stores[1].global_clock().get(1), 2);
    }

    #[tokio::test]
    async fn test_round_skips_own_record() {
        let (stores, directory, connector) = cluster(&[1]);
        let stats = driver(Arc::clone(&stores[0]), &directory, &connector)
            .run_round()
            .await;
        assert_eq!(stats, RoundStats::default());
    }

    #[tokio::test]
    async fn test_unreachable_peer_skipped_not_fatal() {
        let (stores, _directory, connector) = cluster(&[1, 2]);
        admit(&stores[0], "AA:AA:AA:AA:AA:AA");
        // Registry also lists a replica nobody serves.
        let directory = StaticDirectory::new(
            "/vigil/replicas",
            vec![
                PeerRecord::new("1", "mem://1"),
                PeerRecord::new("2", "mem://2"),
                PeerRecord::new("3", "mem://3"),
            ],
        );

        let stats = driver(Arc::clone(&stores[1]), &directory, &connector)
            .run_round()
            .await;
        assert_eq!(stats.contacted, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stores[1].visible_len(), 1, "healthy peer still merged");
    }

    #[tokio::test]
    async fn test_misconfigured_directory_skips_round() {
        let (stores, _directory, connector) = cluster(&[1, 2]);
        let directory = StaticDirectory::new("/elsewhere", Vec::new());
        let stats = driver(Arc::clone(&stores[1]), &directory, &connector)
            .run_round()
            .await;
        assert_eq!(stats, RoundStats::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_task_converges_and_stops() {
        let (stores, directory, connector) = cluster(&[1, 2]);
        admit(&stores[0], "AA:AA:AA:AA:AA:AA");

        let handle = driver(Arc::clone(&stores[1]), &directory, &connector).spawn();
        // First tick fires immediately; paused time advances while idle.
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(stores[1].visible_len(), 1);

        admit(&stores[0], "BB:BB:BB:BB:BB:BB");
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(stores[1].visible_len(), 2);

        handle.stop().await;
    }
}
