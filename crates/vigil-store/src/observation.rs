//! Observation and sentry value types.
//!
//! An observation is an immutable record of one MAC sighting: which sentry
//! saw it, where that sentry sits, and when the report was admitted. The
//! canonical human-readable rendering is
//! `mac,YYYY-MM-DDTHH:MM:SS,sentry,lat,lon`.

use crate::error::StoreError;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp format used by the canonical rendering and the seed boundary.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A registered collector location. Add-only; never relocated once known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentry {
    /// Unique sentry name (registry key).
    pub name: String,
    /// Latitude of the sentry.
    pub lat: f32,
    /// Longitude of the sentry.
    pub lon: f32,
}

impl Sentry {
    /// Create a new sentry record.
    pub fn new(name: impl Into<String>, lat: f32, lon: f32) -> Self {
        Self {
            name: name.into(),
            lat,
            lon,
        }
    }
}

/// One geo-tagged MAC sighting. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The observed MAC address (full or fragment, as admitted).
    pub mac: String,
    /// Wall-clock admission time at the originating replica.
    pub observed_at: DateTime<Utc>,
    /// Name of the sentry that reported the sighting.
    pub sentry: String,
    /// Latitude of the reporting sentry at admission time.
    pub lat: f32,
    /// Longitude of the reporting sentry at admission time.
    pub lon: f32,
}

impl Observation {
    /// Create a new observation record.
    pub fn new(
        mac: impl Into<String>,
        observed_at: DateTime<Utc>,
        sentry: impl Into<String>,
        lat: f32,
        lon: f32,
    ) -> Self {
        Self {
            mac: mac.into(),
            observed_at,
            sentry: sentry.into(),
            lat,
            lon,
        }
    }

    /// The admission time truncated to whole seconds.
    ///
    /// Report ordering and track-mode tie-breaking operate at second
    /// resolution, matching the canonical rendering.
    pub fn observed_secs(&self) -> i64 {
        self.observed_at.timestamp()
    }

    /// Render the timestamp in the canonical `YYYY-MM-DDTHH:MM:SS` form.
    pub fn render_timestamp(&self) -> String {
        self.observed_at.format(TIMESTAMP_FORMAT).to_string()
    }

    /// Parse a timestamp in the canonical form (a space separator is
    /// accepted in place of the `T`, as seed fixtures use either).
    pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        let normalized = raw.replace(' ', "T");
        NaiveDateTime::parse_from_str(&normalized, TIMESTAMP_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|source| StoreError::BadTimestamp {
                raw: raw.to_string(),
                source,
            })
    }
}

impl fmt::Display for Observation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{}",
            self.mac,
            self.render_timestamp(),
            self.sentry,
            self.lat,
            self.lon
        )
    }
}
