//! Error types for the replicated observation store.

use thiserror::Error;

/// Errors surfaced by store operations.
///
/// Validation failures are resolved entirely inside the store and returned
/// as values; none of them is fatal to the replica process. The single
/// startup-fatal case is [`StoreError::InvalidReplicaId`], raised at
/// construction time.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write referenced a sentry name that was never registered; the
    /// whole batch is rejected with no log entry.
    #[error("sentry not found: {name}")]
    SentryNotFound {
        /// The unknown sentry name.
        name: String,
    },

    /// At least one MAC in a write batch failed the grammar; the whole
    /// batch is rejected (no partial admission).
    #[error("invalid MAC address: {mac}")]
    InvalidMac {
        /// The first offending MAC string.
        mac: String,
    },

    /// A write carried no observations at all; no log version is allocated
    /// for it.
    #[error("write batch is empty")]
    EmptyBatch,

    /// Registration of a name that already exists with different
    /// coordinates.
    #[error("sentry already registered with different coordinates: {name}")]
    SentryNameConflict {
        /// The conflicting sentry name.
        name: String,
    },

    /// A caller-supplied vector clock does not have one slot per replica.
    #[error("vector clock has {got} slots, cluster has {expected}")]
    ClockDimension {
        /// Slots required by the configured cluster size.
        expected: usize,
        /// Slots actually supplied.
        got: usize,
    },

    /// Replica id outside `[1, cluster_size]`; the store cannot start.
    #[error("replica id {replica_id} invalid for cluster of {cluster_size}")]
    InvalidReplicaId {
        /// The offending replica id.
        replica_id: usize,
        /// The configured cluster size.
        cluster_size: usize,
    },

    /// A seed fixture carried a timestamp outside the canonical form.
    #[error("bad timestamp {raw:?}")]
    BadTimestamp {
        /// The raw timestamp string.
        raw: String,
        /// Parser failure detail.
        #[source]
        source: chrono::ParseError,
    },
}
