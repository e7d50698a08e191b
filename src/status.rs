//! Current-standing overview.
//!
//! Answers "where does every tracked phrase/SKU combination rank right
//! now" from the latest observation per group. Used by `shelf status`,
//! the `/status` Telegram command, and the HTTP status endpoint.

use anyhow::Result;
use std::collections::BTreeMap;

use crate::config::Config;
use crate::db;
use crate::history;
use crate::models::{format_minute, Observation};
use crate::report::build_status_snapshot;

/// Render the snapshot as plain text for a chat reply.
pub fn render_status_text(snapshot: &BTreeMap<(String, String), Observation>) -> String {
    if snapshot.is_empty() {
        return "No positions recorded yet.".to_string();
    }

    let mut text = String::from("Current positions:\n");
    for ((phrase, sku), obs) in snapshot {
        let promo = match obs.promo_position {
            Some(p) => format!(", promo {}", p),
            None => String::new(),
        };
        text.push_str(&format!(
            "{} / {}: position {}{} (at {})\n",
            phrase,
            sku,
            obs.position,
            promo,
            format_minute(&obs.timestamp)
        ));
    }
    text
}

/// Run the status command: print the latest rank per (phrase, SKU).
pub async fn run_status(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let log = history::load_all(&pool).await?;
    pool.close().await;

    if log.is_empty() {
        println!("no positions recorded yet");
        return Ok(());
    }

    let snapshot = build_status_snapshot(&log);

    println!(
        "{:<28} {:<20} {:>8} {:>6}   {}",
        "PHRASE", "SKU", "POS", "PROMO", "SEEN"
    );
    println!("{}", "-".repeat(76));
    for ((phrase, sku), obs) in &snapshot {
        let promo = obs
            .promo_position
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<28} {:<20} {:>8} {:>6}   {}",
            phrase,
            sku,
            obs.position,
            promo,
            format_minute(&obs.timestamp)
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn empty_snapshot_renders_a_placeholder() {
        let snapshot = BTreeMap::new();
        assert_eq!(render_status_text(&snapshot), "No positions recorded yet.");
    }

    #[test]
    fn snapshot_lines_carry_phrase_sku_and_rank() {
        let obs = Observation {
            position: 12,
            promo_position: Some(3),
            timestamp: Utc.with_ymd_and_hms(2025, 6, 1, 8, 30, 0).unwrap(),
            phrase: "jersey".to_string(),
            sku: "NL-JR-GR-0225".to_string(),
        };
        let mut snapshot = BTreeMap::new();
        snapshot.insert(("jersey".to_string(), "NL-JR-GR-0225".to_string()), obs);

        let text = render_status_text(&snapshot);
        assert!(text.contains("jersey / NL-JR-GR-0225: position 12, promo 3"));
        assert!(text.contains("2025-06-01 08:30"));
    }
}
