//! Request timestamps: accepted input formats, the form that enters the
//! signature, and the freshness window.
//!
//! Inputs without an offset are taken as UTC. Whatever the input looked like,
//! the signature covers the UTC round-trip form with seven fractional digits,
//! e.g. `2024-01-01T10:00:00.0000000Z`. Precision beyond 100ns is truncated.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use thiserror::Error;

/// Naive layouts tried after RFC 3339 and RFC 2822, all read as UTC.
const NAIVE_FORMATS: [&str; 5] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y%m%d%H%M%S",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimestampError {
    #[error("unrecognized timestamp '{0}'")]
    Unparseable(String),

    #[error("timestamp {timestamp} is {skew_secs}s away from server time (tolerance {tolerance_secs}s)")]
    OutOfWindow {
        timestamp: String,
        skew_secs: i64,
        tolerance_secs: i64,
    },
}

/// Parse any accepted representation into UTC.
pub fn parse(input: &str) -> Result<DateTime<Utc>, TimestampError> {
    let trimmed = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(trimmed) {
        return Ok(dt.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| TimestampError::Unparseable(input.to_string()))
}

/// The textual form covered by the signature.
pub fn canonical(ts: &DateTime<Utc>) -> String {
    // leap seconds report nanos >= 1e9
    let ticks = (ts.timestamp_subsec_nanos() / 100).min(9_999_999);
    format!("{}.{ticks:07}Z", ts.format("%Y-%m-%dT%H:%M:%S"))
}

/// How far a request timestamp may drift from server time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessPolicy {
    pub enabled: bool,
    pub tolerance: TimeDelta,
}

impl FreshnessPolicy {
    pub fn new(tolerance: TimeDelta) -> Self {
        Self {
            enabled: true,
            tolerance,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Passes when `|now - ts| <= tolerance`, or when the policy is disabled.
    pub fn check(&self, ts: &DateTime<Utc>, now: &DateTime<Utc>) -> Result<(), TimestampError> {
        if !self.enabled {
            return Ok(());
        }
        let skew = now.signed_duration_since(*ts);
        if skew > self.tolerance || skew < -self.tolerance {
            return Err(TimestampError::OutOfWindow {
                timestamp: canonical(ts),
                skew_secs: skew.num_seconds(),
                tolerance_secs: self.tolerance.num_seconds(),
            });
        }
        Ok(())
    }
}

impl Default for FreshnessPolicy {
    fn default() -> Self {
        Self::new(TimeDelta::minutes(5))
    }
}
