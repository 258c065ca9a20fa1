//! Read-side filtering, ordering and result shaping.
//!
//! Exact and fragment search share one pipeline: filter the visible list,
//! sort it into MAC-grouped most-recent-first order, then shape the result
//! according to the caller's `max_results`. The store's boundary adapters
//! ([`crate::store::ReplicaStore::query_exact`] and
//! [`crate::store::ReplicaStore::query_fragment`]) differ only in the
//! filter they build.

use crate::clock::VectorClock;
use crate::observation::Observation;
use std::collections::HashSet;

/// Which observations a query selects.
#[derive(Debug, Clone, Copy)]
pub enum MacFilter<'a> {
    /// Observations whose MAC equals the query string exactly.
    Exact(&'a str),
    /// Observations whose MAC starts (or, with `from_end`, ends) with the
    /// fragment.
    Fragment {
        /// The fragment to match.
        fragment: &'a str,
        /// Match against the end of the MAC instead of the start.
        from_end: bool,
    },
}

impl MacFilter<'_> {
    /// Whether `mac` passes this filter.
    pub fn matches(&self, mac: &str) -> bool {
        match *self {
            MacFilter::Exact(query) => mac == query,
            MacFilter::Fragment { fragment, from_end } => {
                if from_end {
                    mac.ends_with(fragment)
                } else {
                    mac.starts_with(fragment)
                }
            }
        }
    }
}

/// How many matches a query returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultShape {
    /// Every match, in sorted order ("trace").
    All,
    /// The most recent observation per distinct MAC ("track").
    LatestPerMac,
    /// The first `n` observations of the sorted sequence.
    Capped(usize),
}

impl ResultShape {
    /// Map a wire-level `max_results` to a shape: any negative value means
    /// all matches, `1` means one record per MAC, any other non-negative
    /// `n` caps the result at `n` records total (so `0` is empty).
    pub fn from_max_results(max_results: i32) -> Self {
        match max_results {
            n if n < 0 => ResultShape::All,
            1 => ResultShape::LatestPerMac,
            n => ResultShape::Capped(n as usize),
        }
    }
}

/// Sort observations into report order: grouped by MAC ascending, most
/// recent first within each group.
///
/// The recipe is a stable sort by admission time ascending, a reversal,
/// then a stable sort by MAC ascending; timestamps compare at second
/// resolution so records rendered with the same timestamp keep the reverse
/// ordering.
pub fn sort_for_report(mut observations: Vec<Observation>) -> Vec<Observation> {
    observations.sort_by_key(Observation::observed_secs);
    observations.reverse();
    observations.sort_by(|a, b| a.mac.cmp(&b.mac));
    observations
}

/// Apply a [`ResultShape`] to an already-sorted observation list.
pub fn shape_results(sorted: Vec<Observation>, shape: ResultShape) -> Vec<Observation> {
    match shape {
        ResultShape::All => sorted,
        ResultShape::Capped(n) => sorted.into_iter().take(n).collect(),
        ResultShape::LatestPerMac => {
            let mut seen: HashSet<String> = HashSet::new();
            sorted
                .into_iter()
                .filter(|obs| seen.insert(obs.mac.clone()))
                .collect()
        }
    }
}

/// Outcome of a causally-gated read.
///
/// Both variants carry the replica's current global timestamp so the caller
/// can refresh its own clock view; an empty `observations` list in
/// [`QueryReply::Matches`] means "no matching sightings", which is distinct
/// from [`QueryReply::NotCaughtUp`] ("this replica cannot answer honestly
/// yet").
#[derive(Debug, Clone, PartialEq)]
pub enum QueryReply {
    /// The replica's view dominates the caller's clock; here is the result.
    Matches {
        /// Matching observations in report order, shaped by `max_results`.
        observations: Vec<Observation>,
        /// The replica's global timestamp at answer time.
        clock: VectorClock,
    },
    /// The caller has seen state this replica has not merged yet.
    NotCaughtUp {
        /// The replica's global timestamp, for caller-side retry logic.
        clock: VectorClock,
    },
}

impl QueryReply {
    /// The clock attached to either variant.
    pub fn clock(&self) -> &VectorClock {
        match self {
            QueryReply::Matches { clock, .. } | QueryReply::NotCaughtUp { clock } => clock,
        }
    }

    /// The observations, if the gate passed.
    pub fn observations(&self) -> Option<&[Observation]> {
        match self {
            QueryReply::Matches { observations, .. } => Some(observations),
            QueryReply::NotCaughtUp { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Observation;

    fn obs(mac: &str, when: &str) -> Observation {
        Observation::new(
            mac,
            Observation::parse_timestamp(when).unwrap(),
            "sentry",
            0.0,
            0.0,
        )
    }

    mod filter {
        use super::*;

        #[test]
        fn test_exact_match() {
            let filter = MacFilter::Exact("AA:BB:CC:DD:EE:FF");
            assert!(filter.matches("AA:BB:CC:DD:EE:FF"));
            assert!(!filter.matches("AA:BB:CC:DD:EE:F0"));
            assert!(!filter.matches("AA:BB:CC"));
        }

        #[test]
        fn test_fragment_from_start() {
            let filter = MacFilter::Fragment {
                fragment: "EE:EE:",
                from_end: false,
            };
            assert!(filter.matches("EE:EE:EE:EE:EE:EE"));
            assert!(filter.matches("EE:EE:AA:AA:AA:AA"));
            assert!(!filter.matches("FF:FF:FE:EE:EE:EE"));
        }

        #[test]
        fn test_fragment_from_end() {
            let filter = MacFilter::Fragment {
                fragment: ":EE",
                from_end: true,
            };
            assert!(filter.matches("FF:FF:FE:EE:EE:EE"));
            assert!(!filter.matches("EE:EE:AA:AA:AA:AA"));
        }
    }

    mod ordering {
        use super::*;

        #[test]
        fn test_groups_by_mac_then_most_recent_first() {
            let sorted = sort_for_report(vec![
                obs("BB:BB:BB:BB:BB:BB", "2024-01-01T10:00:00"),
                obs("AA:AA:AA:AA:AA:AA", "2024-01-01T11:00:00"),
                obs("AA:AA:AA:AA:AA:AA", "2024-01-01T09:00:00"),
                obs("BB:BB:BB:BB:BB:BB", "2024-01-01T12:00:00"),
            ]);
            let keys: Vec<(&str, String)> = sorted
                .iter()
                .map(|o| (o.mac.as_str(), o.render_timestamp()))
                .collect();
            assert_eq!(
                keys,
                vec![
                    ("AA:AA:AA:AA:AA:AA", "2024-01-01T11:00:00".to_string()),
                    ("AA:AA:AA:AA:AA:AA", "2024-01-01T09:00:00".to_string()),
                    ("BB:BB:BB:BB:BB:BB", "2024-01-01T12:00:00".to_string()),
                    ("BB:BB:BB:BB:BB:BB", "2024-01-01T10:00:00".to_string()),
                ]
            );
        }

        #[test]
        fn test_same_second_keeps_reversed_arrival_order() {
            let mut first = obs("AA:AA:AA:AA:AA:AA", "2024-01-01T10:00:00");
            first.sentry = "first".into();
            let mut second = obs("AA:AA:AA:AA:AA:AA", "2024-01-01T10:00:00");
            second.sentry = "second".into();
            let sorted = sort_for_report(vec![first, second]);
            assert_eq!(sorted[0].sentry, "second");
            assert_eq!(sorted[1].sentry, "first");
        }
    }

    mod shaping {
        use super::*;

        fn sorted_fixture() -> Vec<Observation> {
            sort_for_report(vec![
                obs("AA:AA:AA:AA:AA:AA", "2024-01-01T09:00:00"),
                obs("AA:AA:AA:AA:AA:AA", "2024-01-01T11:00:00"),
                obs("BB:BB:BB:BB:BB:BB", "2024-01-01T10:00:00"),
            ])
        }

        #[test]
        fn test_from_max_results_mapping() {
            assert_eq!(ResultShape::from_max_results(-1), ResultShape::All);
            assert_eq!(ResultShape::from_max_results(-7), ResultShape::All);
            assert_eq!(ResultShape::from_max_results(1), ResultShape::LatestPerMac);
            assert_eq!(ResultShape::from_max_results(0), ResultShape::Capped(0));
            assert_eq!(ResultShape::from_max_results(5), ResultShape::Capped(5));
        }

        #[test]
        fn test_trace_returns_everything() {
            let shaped = shape_results(sorted_fixture(), ResultShape::All);
            assert_eq!(shaped.len(), 3);
        }

        #[test]
        fn test_track_dedups_to_most_recent_per_mac() {
            let shaped = shape_results(sorted_fixture(), ResultShape::LatestPerMac);
            assert_eq!(shaped.len(), 2);
            assert_eq!(shaped[0].mac, "AA:AA:AA:AA:AA:AA");
            assert_eq!(shaped[0].render_timestamp(), "2024-01-01T11:00:00");
            assert_eq!(shaped[1].mac, "BB:BB:BB:BB:BB:BB");
        }

        #[test]
        fn test_cap_truncates_sorted_sequence() {
            let shaped = shape_results(sorted_fixture(), ResultShape::Capped(2));
            assert_eq!(shaped.len(), 2);
            assert_eq!(shaped[0].render_timestamp(), "2024-01-01T11:00:00");
            let empty = shape_results(sorted_fixture(), ResultShape::Capped(0));
            assert!(empty.is_empty());
        }
    }
}
