#![warn(missing_docs)]

//! Vigil anti-entropy: the pull-based gossip exchange between replicas.
//!
//! Each replica runs one periodic [`engine::AntiEntropy`] task. Every round
//! it asks the discovery registry for its peers, pulls from each of them
//! with its current global timestamp, and feeds whatever comes back into
//! the store's merge path. The exchange logic itself
//! ([`exchange::handle_pull`] / [`exchange::apply_pull`]) is transport-free;
//! the wire lives behind the [`peer`] boundary traits.

pub mod engine;
pub mod error;
pub mod exchange;
pub mod peer;
pub mod protocol;

pub use engine::{AntiEntropy, GossipConfig, GossipHandle, RoundStats};
pub use error::SyncError;
pub use peer::{Directory, InProcessConnector, PeerClient, PeerConnector, PeerRecord, StaticDirectory};
pub use protocol::{PullReply, PullRequest};
