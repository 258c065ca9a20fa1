//! The replicated log store owned by one replica process.
//!
//! A [`ReplicaStore`] holds five structures: the sentry registry, the
//! per-version local log, the pending-dependency table, the globally
//! visible observation list, and the two vector clocks (local version
//! vector and global visibility timestamp). Write admission, dependency
//! resolution and the gossip merge path all live here; the anti-entropy
//! driver in `vigil-sync` only moves batches between stores.
//!
//! Locking: the ledger (log, pending table, clocks, version counters) sits
//! behind one `RwLock` because every writer of any of those must atomically
//! read the others — this is the admission critical section. The sentry
//! registry and the visible list carry their own locks so unrelated
//! readers and writers never contend. Wherever the ledger and the visible
//! list are both held the order is ledger first, and no lock is ever held
//! across I/O.

use crate::clock::VectorClock;
use crate::config::ReplicaConfig;
use crate::error::StoreError;
use crate::mac;
use crate::observation::{Observation, Sentry};
use crate::query::{self, MacFilter, QueryReply, ResultShape};
use chrono::Utc;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use tracing::{debug, info};

/// Receipt returned for every admitted write batch.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteReceipt {
    /// Log version allocated to the batch.
    pub log_version: u64,
    /// Whether the batch was parked pending causal dependencies instead of
    /// becoming visible immediately.
    pub deferred: bool,
    /// The replica's global timestamp after admission; callers refresh
    /// their own clock view from it.
    pub clock: VectorClock,
}

/// One unmet causal dependency of a pending batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Dependency {
    /// 1-based replica the dependency points at.
    peer: usize,
    /// Version of that replica the writer claimed to have seen.
    required: u64,
}

/// Log, pending table, clocks and version counters; always mutated as one
/// unit under the ledger lock.
#[derive(Debug)]
struct Ledger {
    local_log: BTreeMap<u64, Vec<Observation>>,
    pending: BTreeMap<u64, Vec<Dependency>>,
    local_clock: VectorClock,
    global_clock: VectorClock,
    log_version: u64,
    global_version: u64,
}

impl Ledger {
    /// Fresh ledger: both counters at 1, own slot of both clocks seeded to
    /// 1, peers at 0. Real batches occupy versions >= 2; a slot value of 1
    /// therefore means "bootstrap only, nothing visible yet", which the
    /// gossip responder relies on.
    fn bootstrap(config: &ReplicaConfig) -> Self {
        let mut local_clock = VectorClock::zero(config.cluster_size);
        let mut global_clock = VectorClock::zero(config.cluster_size);
        local_clock.set(config.replica_id, 1);
        global_clock.set(config.replica_id, 1);
        Self {
            local_log: BTreeMap::new(),
            pending: BTreeMap::new(),
            local_clock,
            global_clock,
            log_version: 1,
            global_version: 1,
        }
    }

    /// Release every pending batch whose dependency set is satisfied by the
    /// current global clock, appending released batches to `visible` and
    /// advancing the own slot per released batch. Runs to fixpoint so that
    /// a release which advances the own slot can in turn satisfy a
    /// self-dependency of another pending batch. Returns the released log
    /// versions.
    fn release_ready(&mut self, visible: &mut Vec<Observation>, replica: usize) -> Vec<u64> {
        let mut released = Vec::new();
        loop {
            let mut ready = None;
            {
                let clock = &self.global_clock;
                for (&version, deps) in self.pending.iter_mut() {
                    deps.retain(|dep| clock.get(dep.peer) < dep.required);
                    if deps.is_empty() {
                        ready = Some(version);
                        break;
                    }
                }
            }
            let Some(version) = ready else { break };
            self.pending.remove(&version);
            if let Some(batch) = self.local_log.get(&version) {
                visible.extend(batch.iter().cloned());
            }
            self.global_version += 1;
            self.global_clock.set(replica, self.global_version);
            released.push(version);
        }
        released
    }
}

/// Point-in-time snapshot of a replica's state, for operators and tests.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    /// This replica's id.
    pub replica_id: usize,
    /// Every registered sentry.
    pub sentries: Vec<Sentry>,
    /// Canonical renderings of the visible observations, in list order.
    pub observations: Vec<String>,
    /// The global visibility timestamp.
    pub global_clock: VectorClock,
    /// The local version vector.
    pub local_clock: VectorClock,
    /// Batches still parked on unmet dependencies.
    pub pending_batches: usize,
    /// Batches in the local log.
    pub logged_batches: usize,
}

/// The replicated observation store for one replica.
///
/// Constructed once per process with a fixed replica id; all request
/// handlers and the gossip task share one instance behind an `Arc`.
#[derive(Debug)]
pub struct ReplicaStore {
    config: ReplicaConfig,
    sentries: RwLock<HashMap<String, Sentry>>,
    ledger: RwLock<Ledger>,
    visible: RwLock<Vec<Observation>>,
}

impl ReplicaStore {
    /// Create a store for the configured replica.
    pub fn new(config: ReplicaConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let ledger = Ledger::bootstrap(&config);
        Ok(Self {
            config,
            sentries: RwLock::new(HashMap::new()),
            ledger: RwLock::new(ledger),
            visible: RwLock::new(Vec::new()),
        })
    }

    /// This replica's 1-based id.
    pub fn replica_id(&self) -> usize {
        self.config.replica_id
    }

    /// The fixed cluster size (vector clock width).
    pub fn cluster_size(&self) -> usize {
        self.config.cluster_size
    }

    /// Register a sentry. Re-registering the same name with identical
    /// coordinates is an idempotent no-op; different coordinates conflict.
    pub fn register_sentry(&self, name: &str, lat: f32, lon: f32) -> Result<(), StoreError> {
        let mut sentries = self.sentries.write().unwrap();
        if let Some(existing) = sentries.get(name) {
            if existing.lat == lat && existing.lon == lon {
                return Ok(());
            }
            return Err(StoreError::SentryNameConflict {
                name: name.to_string(),
            });
        }
        sentries.insert(name.to_string(), Sentry::new(name, lat, lon));
        debug!(sentry = name, "sentry registered");
        Ok(())
    }

    /// Admit one write batch from a collector.
    ///
    /// Validates the sentry and every MAC (whole-batch rejection, no
    /// partial admission), stamps the observations with the current wall
    /// clock and the sentry's coordinates, appends the batch to the local
    /// log, and either publishes it immediately or parks it on the unmet
    /// dependencies implied by `caller_clock`. Never blocks on a peer;
    /// causal gaps resolve asynchronously through gossip.
    pub fn admit_write(
        &self,
        sentry_name: &str,
        macs: &[String],
        caller_clock: &[u64],
    ) -> Result<WriteReceipt, StoreError> {
        let sentry = self
            .sentries
            .read()
            .unwrap()
            .get(sentry_name)
            .cloned()
            .ok_or_else(|| StoreError::SentryNotFound {
                name: sentry_name.to_string(),
            })?;
        if let Some(bad) = macs.iter().find(|m| !mac::is_valid_mac(m)) {
            return Err(StoreError::InvalidMac { mac: bad.clone() });
        }
        if macs.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        self.check_clock_width(caller_clock)?;

        let now = Utc::now();
        let batch: Vec<Observation> = macs
            .iter()
            .map(|m| Observation::new(m.clone(), now, sentry.name.clone(), sentry.lat, sentry.lon))
            .collect();

        let replica = self.config.replica_id;
        let mut ledger = self.ledger.write().unwrap();
        ledger.log_version += 1;
        let version = ledger.log_version;
        ledger.local_clock.set(replica, version);
        ledger.local_log.insert(version, batch.clone());

        let deps: Vec<Dependency> = caller_clock
            .iter()
            .enumerate()
            .filter(|&(i, &claimed)| claimed > ledger.global_clock.get(i + 1))
            .map(|(i, &claimed)| Dependency {
                peer: i + 1,
                required: claimed,
            })
            .collect();

        let deferred = !deps.is_empty();
        if deferred {
            debug!(version, ?deps, "write parked on causal dependencies");
            ledger.pending.insert(version, deps);
        } else {
            let mut visible = self.visible.write().unwrap();
            visible.extend(batch);
            ledger.global_version += 1;
            let global_version = ledger.global_version;
            ledger.global_clock.set(replica, global_version);
            debug!(version, "write visible immediately");
            // The own slot moved; a parked batch waiting on local progress
            // may be releasable right away.
            let released = ledger.release_ready(&mut visible, replica);
            if !released.is_empty() {
                info!(?released, "pending batches became visible");
            }
        }

        Ok(WriteReceipt {
            log_version: version,
            deferred,
            clock: ledger.global_clock.clone(),
        })
    }

    /// Merge a gossip payload received from `sender`.
    ///
    /// Gossip-received observations are causally stable already and join
    /// the visible list without a dependency re-check; an empty payload is
    /// a pure clock catch-up. Either way the sender's slot is raised (never
    /// lowered) to `sender_version` and dependency resolution runs so that
    /// local batches waiting on that peer can surface.
    pub fn apply_gossip(
        &self,
        observations: Vec<Observation>,
        sender: usize,
        sender_version: u64,
    ) -> Result<(), StoreError> {
        if sender == 0 || sender > self.config.cluster_size {
            return Err(StoreError::InvalidReplicaId {
                replica_id: sender,
                cluster_size: self.config.cluster_size,
            });
        }
        let merged = observations.len();
        let replica = self.config.replica_id;
        let mut ledger = self.ledger.write().unwrap();
        let mut visible = self.visible.write().unwrap();
        visible.extend(observations);
        ledger.global_clock.advance_to(sender, sender_version);
        let released = ledger.release_ready(&mut visible, replica);
        debug!(sender, sender_version, merged, "gossip payload merged");
        if !released.is_empty() {
            info!(?released, "pending batches became visible");
        }
        Ok(())
    }

    /// Exact-MAC search ("trace"/"track" depending on `max_results`).
    pub fn query_exact(
        &self,
        mac: &str,
        max_results: i32,
        caller_clock: &[u64],
    ) -> Result<QueryReply, StoreError> {
        self.run_query(MacFilter::Exact(mac), max_results, caller_clock)
    }

    /// Fragment search reading the MAC from the start or, with `from_end`,
    /// from the end.
    pub fn query_fragment(
        &self,
        fragment: &str,
        from_end: bool,
        max_results: i32,
        caller_clock: &[u64],
    ) -> Result<QueryReply, StoreError> {
        self.run_query(
            MacFilter::Fragment { fragment, from_end },
            max_results,
            caller_clock,
        )
    }

    /// Shared read path: causal gate, filter, sort, shape.
    fn run_query(
        &self,
        filter: MacFilter<'_>,
        max_results: i32,
        caller_clock: &[u64],
    ) -> Result<QueryReply, StoreError> {
        self.check_clock_width(caller_clock)?;
        let ledger = self.ledger.read().unwrap();
        let clock = ledger.global_clock.clone();
        if !clock.dominates(caller_clock) {
            return Ok(QueryReply::NotCaughtUp { clock });
        }
        // Snapshot under the ledger guard so the gate and the list agree.
        let matches: Vec<Observation> = {
            let visible = self.visible.read().unwrap();
            visible
                .iter()
                .filter(|obs| filter.matches(&obs.mac))
                .cloned()
                .collect()
        };
        drop(ledger);

        let sorted = query::sort_for_report(matches);
        let shaped = query::shape_results(sorted, ResultShape::from_max_results(max_results));
        Ok(QueryReply::Matches {
            observations: shaped,
            clock,
        })
    }

    /// Clear everything and re-seed the own clock slots, as at startup.
    pub fn reset(&self) {
        let mut ledger = self.ledger.write().unwrap();
        let mut visible = self.visible.write().unwrap();
        self.sentries.write().unwrap().clear();
        *ledger = Ledger::bootstrap(&self.config);
        visible.clear();
        info!(replica = self.config.replica_id, "store reset");
    }

    /// Replace the whole state with a fixture: clears the store, registers
    /// `sentries`, then appends `observations` directly to the visible list
    /// without touching the log or the clocks.
    pub fn bulk_seed(
        &self,
        sentries: Vec<Sentry>,
        observations: Vec<Observation>,
    ) -> Result<(), StoreError> {
        self.reset();
        for sentry in sentries {
            self.register_sentry(&sentry.name, sentry.lat, sentry.lon)?;
        }
        let mut visible = self.visible.write().unwrap();
        visible.extend(observations);
        Ok(())
    }

    /// Snapshot the replica's state for operators and tests.
    pub fn status(&self) -> StoreStatus {
        let sentries = self.sentries.read().unwrap().values().cloned().collect();
        let ledger = self.ledger.read().unwrap();
        let observations = self
            .visible
            .read()
            .unwrap()
            .iter()
            .map(Observation::to_string)
            .collect();
        StoreStatus {
            replica_id: self.config.replica_id,
            sentries,
            observations,
            global_clock: ledger.global_clock.clone(),
            local_clock: ledger.local_clock.clone(),
            pending_batches: ledger.pending.len(),
            logged_batches: ledger.local_log.len(),
        }
    }

    /// The global visibility timestamp.
    pub fn global_clock(&self) -> VectorClock {
        self.ledger.read().unwrap().global_clock.clone()
    }

    /// The local version vector.
    pub fn local_clock(&self) -> VectorClock {
        self.ledger.read().unwrap().local_clock.clone()
    }

    /// Atomic snapshot of the global clock together with the global
    /// version counter, for the gossip responder.
    pub fn clock_snapshot(&self) -> (VectorClock, u64) {
        let ledger = self.ledger.read().unwrap();
        (ledger.global_clock.clone(), ledger.global_version)
    }

    /// Concatenate logged batches from version `from` down to (exclusive)
    /// `down_to`, newest version first. Versions with no log entry are
    /// skipped.
    pub fn collect_log_descending(&self, from: u64, down_to: u64) -> Vec<Observation> {
        let ledger = self.ledger.read().unwrap();
        let mut out = Vec::new();
        let mut version = from;
        while version > down_to {
            if let Some(batch) = ledger.local_log.get(&version) {
                out.extend(batch.iter().cloned());
            }
            version -= 1;
        }
        out
    }

    /// Number of currently visible observations.
    pub fn visible_len(&self) -> usize {
        self.visible.read().unwrap().len()
    }

    /// Clone of the visible observation list, in visibility order.
    pub fn visible_snapshot(&self) -> Vec<Observation> {
        self.visible.read().unwrap().clone()
    }

    /// Number of batches still parked on unmet dependencies.
    pub fn pending_len(&self) -> usize {
        self.ledger.read().unwrap().pending.len()
    }

    fn check_clock_width(&self, caller_clock: &[u64]) -> Result<(), StoreError> {
        if caller_clock.len() != self.config.cluster_size {
            return Err(StoreError::ClockDimension {
                expected: self.config.cluster_size,
                got: caller_clock.len(),
            });
        }
        Ok(())
    }
}
