//! Sharp-drop detection over the history log.
//!
//! For each SKU present in a fresh batch, the two most recent
//! observations of that SKU (across all phrases) are compared; a drop
//! alert fires when the organic position worsened by at least the
//! configured threshold. The comparison deliberately ignores how much
//! wall-clock time separates the two samples.

use std::collections::BTreeSet;

use crate::models::{Alert, Observation};

/// Collect the distinct SKUs of a freshly fetched batch.
pub fn fresh_skus(batch: &[Observation]) -> BTreeSet<String> {
    batch.iter().map(|obs| obs.sku.clone()).collect()
}

/// Find sharp rank drops for the given SKUs.
///
/// A SKU with fewer than two observations in the log never alerts, so a
/// first sighting cannot produce a false signal. Improvements and
/// unchanged positions never alert. Pure: the log snapshot is not
/// modified.
pub fn find_drops(
    log: &[Observation],
    fresh: &BTreeSet<String>,
    drop_threshold: i64,
) -> Vec<Alert> {
    let mut alerts = Vec::new();

    for sku in fresh {
        let mut entries: Vec<(usize, &Observation)> = log
            .iter()
            .enumerate()
            .filter(|(_, obs)| &obs.sku == sku)
            .collect();
        if entries.len() < 2 {
            continue;
        }
        // Newest first; equal timestamps (two polls within one minute)
        // fall back to insertion order.
        entries.sort_by(|a, b| b.1.timestamp.cmp(&a.1.timestamp).then(b.0.cmp(&a.0)));

        let current = entries[0].1;
        let previous = entries[1].1;
        if current.position - previous.position >= drop_threshold {
            alerts.push(Alert {
                sku: sku.clone(),
                previous_position: previous.position,
                current_position: current.position,
            });
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn obs(sku: &str, position: i64, hour: u32) -> Observation {
        Observation {
            position,
            promo_position: None,
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap(),
            phrase: "jersey".to_string(),
            sku: sku.to_string(),
        }
    }

    fn skus(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn single_observation_never_alerts() {
        let log = vec![obs("A", 5, 0)];
        assert!(find_drops(&log, &skus(&["A"]), 20).is_empty());
    }

    #[test]
    fn threshold_boundary_is_inclusive() {
        // previous position 10, threshold 20
        for (current, expect_alert) in [(29, false), (30, true), (31, true)] {
            let log = vec![obs("A", 10, 0), obs("A", current, 4)];
            let alerts = find_drops(&log, &skus(&["A"]), 20);
            assert_eq!(alerts.len(), usize::from(expect_alert), "current={}", current);
        }
    }

    #[test]
    fn improvements_and_ties_never_alert() {
        let improved = vec![obs("A", 40, 0), obs("A", 3, 4)];
        assert!(find_drops(&improved, &skus(&["A"]), 20).is_empty());

        let unchanged = vec![obs("A", 40, 0), obs("A", 40, 4)];
        assert!(find_drops(&unchanged, &skus(&["A"]), 20).is_empty());
    }

    #[test]
    fn compares_the_two_most_recent_by_timestamp_not_insertion() {
        // Inserted out of chronological order; most recent pair is 8 -> 45.
        let log = vec![obs("A", 45, 12), obs("A", 2, 0), obs("A", 8, 6)];
        let alerts = find_drops(&log, &skus(&["A"]), 20);
        assert_eq!(
            alerts,
            vec![Alert {
                sku: "A".to_string(),
                previous_position: 8,
                current_position: 45,
            }]
        );
    }

    #[test]
    fn equal_timestamps_resolve_by_insertion_order() {
        // Two polls landed within the same minute; the later insertion is
        // the current observation.
        let log = vec![obs("A", 5, 12), obs("A", 40, 12)];
        let alerts = find_drops(&log, &skus(&["A"]), 20);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].previous_position, 5);
        assert_eq!(alerts[0].current_position, 40);
    }

    #[test]
    fn only_fresh_skus_are_examined() {
        let log = vec![obs("A", 5, 0), obs("A", 90, 4), obs("B", 7, 4)];
        let alerts = find_drops(&log, &skus(&["B"]), 20);
        assert!(alerts.is_empty());
    }

    #[test]
    fn drops_pool_observations_across_phrases() {
        let mut early = obs("A", 4, 0);
        early.phrase = "mens pajama set".to_string();
        let late = obs("A", 60, 8);

        let alerts = find_drops(&[early, late], &skus(&["A"]), 20);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].previous_position, 4);
        assert_eq!(alerts[0].current_position, 60);
    }
}
