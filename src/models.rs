//! Core data models used throughout Shelfwatch.
//!
//! These types represent the ranking samples, derived alerts, and report
//! rows that flow through the tracking and reporting pipeline.

use chrono::{DateTime, Timelike, Utc};
use serde::Serialize;

/// One ranking sample: where a product card sat in the marketplace search
/// results for a phrase at a point in time.
///
/// Observations are immutable once created. The history log only grows by
/// insertion; nothing ever mutates a stored observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Observation {
    /// Organic (unpaid) rank, 1-based.
    pub position: i64,
    /// Promoted (paid) slot rank. Absent when the card is not promoted.
    pub promo_position: Option<i64>,
    /// Sample time, minute resolution. Every observation produced within
    /// one fetch cycle carries the same timestamp.
    pub timestamp: DateTime<Utc>,
    /// Search phrase that produced this observation.
    pub phrase: String,
    /// Resolved stable product code (or the decimal form of the raw
    /// marketplace id when unmapped).
    pub sku: String,
}

/// A sharp rank drop derived from the two most recent observations of a SKU.
///
/// Alerts are ephemeral: they live only inside a single cycle's
/// notification payload and are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub sku: String,
    pub previous_position: i64,
    pub current_position: i64,
}

/// Truncate a timestamp to minute resolution.
pub fn to_minute(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

/// Render a timestamp the way it appears in notifications and exports.
pub fn format_minute(ts: &DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn to_minute_drops_seconds() {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap();
        let truncated = to_minute(ts);
        assert_eq!(format_minute(&truncated), "2025-03-14 09:26");
        assert_eq!(truncated.second(), 0);
    }
}
