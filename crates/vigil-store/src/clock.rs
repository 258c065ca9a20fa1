//! Fixed-width vector clocks.
//!
//! Every clock in a cluster has one slot per replica, indexed by the
//! replica's 1-based identifier. Slot `r` counts how many write batches
//! originating at replica `r` the clock's owner has merged (or, for the
//! local version vector, logged). The 1-based to 0-based conversion lives
//! here and nowhere else.

use serde::{Deserialize, Serialize};

/// A fixed-width vector of per-replica version counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorClock {
    slots: Vec<u64>,
}

impl VectorClock {
    /// An all-zero clock for a cluster of `cluster_size` replicas.
    pub fn zero(cluster_size: usize) -> Self {
        Self {
            slots: vec![0; cluster_size],
        }
    }

    /// Build a clock from raw slot values.
    pub fn from_slots(slots: Vec<u64>) -> Self {
        Self { slots }
    }

    /// Number of slots (the cluster size).
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the clock has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Value of the slot for 1-based `replica`.
    ///
    /// # Panics
    /// Panics if `replica` is 0 or beyond the cluster size; replica ids are
    /// validated at configuration time.
    pub fn get(&self, replica: usize) -> u64 {
        self.slots[replica - 1]
    }

    /// Set the slot for 1-based `replica`.
    pub fn set(&mut self, replica: usize, value: u64) {
        self.slots[replica - 1] = value;
    }

    /// Raise the slot for `replica` to `value`; never lowers it.
    pub fn advance_to(&mut self, replica: usize, value: u64) {
        let slot = &mut self.slots[replica - 1];
        if value > *slot {
            *slot = value;
        }
    }

    /// Whether every slot of `self` is at or beyond the matching slot of
    /// `other`. A reply gated on this never exposes state the caller has
    /// not causally seen.
    pub fn dominates(&self, other: &[u64]) -> bool {
        self.slots.len() == other.len()
            && self.slots.iter().zip(other).all(|(mine, theirs)| mine >= theirs)
    }

    /// The raw slot values.
    pub fn as_slice(&self) -> &[u64] {
        &self.slots
    }
}
