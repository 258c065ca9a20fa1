//! Error types for the anti-entropy layer.

use thiserror::Error;

/// Errors raised by gossip transport and discovery collaborators.
///
/// All of these are transient from the replica's point of view: a failed
/// exchange is logged and skipped for the round, never fatal.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A peer could not be reached or the pull against it failed.
    #[error("peer unreachable at {uri}: {msg}")]
    PeerUnreachable {
        /// Address of the unreachable peer.
        uri: String,
        /// Transport failure detail.
        msg: String,
    },

    /// The discovery registry failed to list or resolve records.
    #[error("discovery error: {msg}")]
    Directory {
        /// Registry failure detail.
        msg: String,
    },

    /// A record id was requested that the registry does not know.
    #[error("unknown peer: {id}")]
    UnknownPeer {
        /// The unknown record id.
        id: String,
    },

    /// A peer answered with a reply the store refused to merge (for
    /// example an out-of-range sender id).
    #[error("malformed gossip reply: {msg}")]
    BadReply {
        /// Merge failure detail.
        msg: String,
    },
}
