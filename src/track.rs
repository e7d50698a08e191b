//! Tracking-cycle orchestration.
//!
//! Coordinates one full cycle: fetch → identity-resolve → merge into the
//! history log → trend analysis → notification. This is the sequential
//! unit of work the scheduler fires every few hours and `shelf track`
//! runs once.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::db;
use crate::history;
use crate::marketplace::SearchClient;
use crate::models::{format_minute, Alert, Observation};
use crate::notify::Notifier;
use crate::trend;

/// Outcome of one tracking cycle, for CLI summaries and logs.
pub struct CycleOutcome {
    pub fetched: usize,
    pub log_len: usize,
    pub alerts: Vec<Alert>,
}

/// Run one tracking cycle against an already-open pool.
///
/// Failure containment per layer: page failures were already absorbed by
/// the fetcher; an empty batch is surfaced as a "nothing found" text and
/// a normal return. Only a history-store failure propagates — and the
/// operator is notified about it first, so a dead store never goes
/// silent.
pub async fn run_cycle(
    config: &Config,
    pool: &sqlx::SqlitePool,
    notifier: &dyn Notifier,
) -> Result<CycleOutcome> {
    let client = SearchClient::new(&config.marketplace)?;
    let identity = config.identity_map();

    let batch = client.fetch_all(&config.marketplace.phrases, &identity).await;
    if batch.is_empty() {
        tracing::info!("no product cards found this cycle");
        notifier.send_text("No product cards found.").await?;
        return Ok(CycleOutcome {
            fetched: 0,
            log_len: history::count(pool).await.unwrap_or(0) as usize,
            alerts: Vec::new(),
        });
    }

    let merged = match merge_and_persist(pool, &batch).await {
        Ok(merged) => merged,
        Err(err) => {
            // Surface the store failure to the operator before bailing;
            // a notification failure here must not mask the real error.
            let _ = notifier
                .send_text(&format!("History store failure: {:#}", err))
                .await;
            return Err(err);
        }
    };

    let fresh = trend::fresh_skus(&batch);
    let alerts = trend::find_drops(&merged, &fresh, config.alerts.drop_threshold);

    let message = render_cycle_message(&batch, &alerts);
    notifier.send_text(&message).await?;

    Ok(CycleOutcome {
        fetched: batch.len(),
        log_len: merged.len(),
        alerts,
    })
}

/// Load the prior log, persist the batch, and return the merged view.
async fn merge_and_persist(
    pool: &sqlx::SqlitePool,
    batch: &[Observation],
) -> Result<Vec<Observation>> {
    let existing = history::load(pool)
        .await
        .context("history log is unreadable")?;
    history::append_batch(pool, batch)
        .await
        .context("failed to persist batch")?;
    Ok(history::merge(existing, batch.to_vec()))
}

/// Compose the per-cycle notification text.
pub fn render_cycle_message(batch: &[Observation], alerts: &[Alert]) -> String {
    let mut message = String::from("Card positions:\n\n");
    for obs in batch {
        let promo = match obs.promo_position {
            Some(p) => p.to_string(),
            None => "-".to_string(),
        };
        message.push_str(&format!(
            "phrase: {}\nsku: {}\nposition: {}, promo: {}\ntime: {}\n\n",
            obs.phrase,
            obs.sku,
            obs.position,
            promo,
            format_minute(&obs.timestamp)
        ));
    }

    if !alerts.is_empty() {
        message.push_str("Sharp position drops detected:\n");
        for alert in alerts {
            message.push_str(&format!(
                "{}: position fell from {} to {}\n",
                alert.sku, alert.previous_position, alert.current_position
            ));
        }
    }

    message
}

/// Run the `track` command. With `--dry-run`, fetch and print what one
/// cycle would record without persisting or notifying.
pub async fn run_track(config: &Config, dry_run: bool) -> Result<()> {
    if dry_run {
        let client = SearchClient::new(&config.marketplace)?;
        let identity = config.identity_map();
        let batch = client.fetch_all(&config.marketplace.phrases, &identity).await;

        println!("track (dry-run)");
        println!("  observations fetched: {}", batch.len());
        for obs in &batch {
            println!(
                "  {} / {} -> position {} (promo {:?})",
                obs.phrase, obs.sku, obs.position, obs.promo_position
            );
        }
        if batch.is_empty() {
            println!("  no product cards found");
        }
        return Ok(());
    }

    let notifier = crate::notify::TelegramNotifier::from_config(&config.telegram)?;
    let pool = db::connect(config).await?;
    crate::migrate::ensure_schema(&pool).await?;

    let outcome = run_cycle(config, &pool, &notifier).await?;
    pool.close().await;

    println!("track");
    println!("  observations fetched: {}", outcome.fetched);
    println!("  history log length: {}", outcome.log_len);
    println!("  drop alerts: {}", outcome.alerts.len());
    println!("ok");
    Ok(())
}
