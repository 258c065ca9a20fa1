//! Transport-free pull-exchange logic.
//!
//! [`handle_pull`] is the responder half: given a requester's clock it
//! decides between "no data", a bare clock seed, and a backward walk over
//! the local log. [`apply_pull`] is the requester half: it feeds a reply
//! into the store's merge path. The gossip driver wires these to real
//! peers; tests call them directly.

use crate::protocol::{PullRequest, PullReply};
use tracing::warn;
use vigil_store::{ReplicaStore, StoreError};

/// Answer a peer's pull request from the local store.
///
/// Decision ladder, driven by this replica's own slot value `self_slot`
/// and the requester's knowledge `known` of it:
/// - `known >= self_slot`: the requester is not behind us — no data.
/// - `self_slot == 1`: nothing is locally visible beyond bootstrap; reply
///   with an empty payload that still carries our version, purely to seed
///   the requester's clock.
/// - otherwise walk the local log backward from `self_slot` down to the
///   requester's known version — exclusive of version 1 on the requester's
///   very first contact (`known == 0`), since version 1 is the bootstrap
///   value with no log entry.
pub fn handle_pull(store: &ReplicaStore, request: &PullRequest) -> PullReply {
    if request.clock.len() != store.cluster_size() {
        warn!(
            got = request.clock.len(),
            expected = store.cluster_size(),
            "pull request clock has wrong width, answering no-data"
        );
        return PullReply::NoData;
    }

    let self_id = store.replica_id();
    let (clock, version) = store.clock_snapshot();
    let self_slot = clock.get(self_id);
    let known = request.clock[self_id - 1];

    if known >= self_slot {
        return PullReply::NoData;
    }
    if self_slot == 1 {
        return PullReply::Data {
            observations: Vec::new(),
            replica_id: self_id,
            version,
        };
    }

    let initial_sync = known == 0;
    let boundary = if initial_sync { known + 1 } else { known };
    let observations = store.collect_log_descending(self_slot, boundary);
    PullReply::Data {
        observations,
        replica_id: self_id,
        version,
    }
}

/// Merge a pull reply into the local store.
///
/// Returns the number of merged observations. An empty `Data` payload is a
/// pure clock catch-up; `NoData` is a no-op.
pub fn apply_pull(store: &ReplicaStore, reply: PullReply) -> Result<usize, StoreError> {
    match reply {
        PullReply::NoData => Ok(0),
        PullReply::Data {
            observations,
            replica_id,
            version,
        } => {
            let merged = observations.len();
            store.apply_gossip(observations, replica_id, version)?;
            Ok(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_store::{ReplicaConfig, ReplicaStore};

    fn store(replica: usize) -> ReplicaStore {
        ReplicaStore::new(ReplicaConfig::new(replica)).unwrap()
    }

    fn zero_clock() -> Vec<u64> {
        vec![0; 10]
    }

    fn admit(store: &ReplicaStore, mac: &str) {
        store.register_sentry("gate", 0.0, 0.0).unwrap();
        store
            .admit_write("gate", &[mac.to_string()], &zero_clock())
            .unwrap();
    }

    #[test]
    fn test_requester_not_behind_gets_no_data() {
        let responder = store(1);
        admit(&responder, "AA:AA:AA:AA:AA:AA");
        let mut caught_up = zero_clock();
        caught_up[0] = 2;
        let reply = handle_pull(&responder, &PullRequest::new(caught_up));
        assert_eq!(reply, PullReply::NoData);
    }

    #[test]
    fn test_bootstrap_responder_seeds_clock_only() {
        let responder = store(1);
        let reply = handle_pull(&responder, &PullRequest::new(zero_clock()));
        match reply {
            PullReply::Data {
                observations,
                replica_id,
                version,
            } => {
                assert!(observations.is_empty());
                assert_eq!(replica_id, 1);
                assert_eq!(version, 1);
            }
            PullReply::NoData => panic!("expected a clock seed"),
        }
    }

    #[test]
    fn test_initial_sync_walks_whole_log() {
        let responder = store(1);
        responder.register_sentry("gate", 0.0, 0.0).unwrap();
        responder
            .admit_write("gate", &["AA:AA:AA:AA:AA:AA".to_string()], &zero_clock())
            .unwrap();
        responder
            .admit_write("gate", &["BB:BB:BB:BB:BB:BB".to_string()], &zero_clock())
            .unwrap();

        let reply = handle_pull(&responder, &PullRequest::new(zero_clock()));
        match reply {
            PullReply::Data {
                observations,
                version,
                ..
            } => {
                let observed: Vec<&str> = observations.iter().map(|o| o.mac.as_str()).collect();
                assert_eq!(observed, vec!["BB:BB:BB:BB:BB:BB", "AA:AA:AA:AA:AA:AA"]);
                assert_eq!(version, 3);
            }
            PullReply::NoData => panic!("expected data"),
        }
    }

    #[test]
    fn test_incremental_sync_sends_only_missing_tail() {
        let responder = store(1);
        responder.register_sentry("gate", 0.0, 0.0).unwrap();
        responder
            .admit_write("gate", &["AA:AA:AA:AA:AA:AA".to_string()], &zero_clock())
            .unwrap();
        responder
            .admit_write("gate", &["BB:BB:BB:BB:BB:BB".to_string()], &zero_clock())
            .unwrap();

        let mut partial = zero_clock();
        partial[0] = 2; // already has the first batch
        let reply = handle_pull(&responder, &PullRequest::new(partial));
        match reply {
            PullReply::Data { observations, .. } => {
                let observed: Vec<&str> = observations.iter().map(|o| o.mac.as_str()).collect();
                assert_eq!(observed, vec!["BB:BB:BB:BB:BB:BB"]);
            }
            PullReply::NoData => panic!("expected data"),
        }
    }

    #[test]
    fn test_malformed_request_clock_answers_no_data() {
        let responder = store(1);
        admit(&responder, "AA:AA:AA:AA:AA:AA");
        let reply = handle_pull(&responder, &PullRequest::new(vec![0, 0]));
        assert_eq!(reply, PullReply::NoData);
    }

    #[test]
    fn test_apply_data_merges_and_advances() {
        let responder = store(1);
        admit(&responder, "AA:AA:AA:AA:AA:AA");
        let requester = store(2);

        let reply = handle_pull(&responder, &PullRequest::new(zero_clock()));
        let merged = apply_pull(&requester, reply).unwrap();
        assert_eq!(merged, 1);
        assert_eq!(requester.visible_len(), 1);
        assert_eq!(requester.global_clock().get(1), 2);
    }

    #[test]
    fn test_apply_empty_seed_advances_clock_only() {
        let responder = store(1);
        let requester = store(2);
        let reply = handle_pull(&responder, &PullRequest::new(zero_clock()));
        let merged = apply_pull(&requester, reply).unwrap();
        assert_eq!(merged, 0);
        assert_eq!(requester.visible_len(), 0);
        assert_eq!(requester.global_clock().get(1), 1);
    }

    #[test]
    fn test_apply_no_data_is_noop() {
        let requester = store(2);
        assert_eq!(apply_pull(&requester, PullReply::NoData).unwrap(), 0);
        assert_eq!(requester.global_clock().as_slice().iter().sum::<u64>(), 1);
    }
}
