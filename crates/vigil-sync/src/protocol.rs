//! Pull-protocol types.
//!
//! These are plain serde values; the external RPC transport owns the wire
//! encoding. A requester sends its full global timestamp, the responder
//! answers with either "no data" or the batches the requester is missing
//! plus the responder's identity and version.

use serde::{Deserialize, Serialize};
use vigil_store::Observation;

/// A pull request: the requester's global timestamp, one slot per replica.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// The requester's global timestamp slots.
    pub clock: Vec<u64>,
}

impl PullRequest {
    /// Build a request from raw clock slots.
    pub fn new(clock: Vec<u64>) -> Self {
        Self { clock }
    }
}

/// A pull reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PullReply {
    /// The responder holds nothing the requester is missing.
    NoData,
    /// Catch-up payload. An empty observation list still carries the
    /// responder's version so a freshly started requester can seed its
    /// clock slot for this peer.
    Data {
        /// Missing observations, newest batch first.
        observations: Vec<Observation>,
        /// The responder's 1-based replica id.
        replica_id: usize,
        /// The responder's global version counter.
        version: u64,
    },
}

impl PullReply {
    /// Whether the reply carries a payload section at all.
    pub fn has_data(&self) -> bool {
        matches!(self, PullReply::Data { .. })
    }
}
