//! The append-only history log.
//!
//! Every ranking sample ever fetched lives in the `observations` table.
//! Merging a new batch never removes, rewrites, or reorders prior rows;
//! repeated polls of the same SKU at different timestamps are distinct
//! history points and are all retained. Analysis ordering is re-derived
//! from the `timestamp` column at read time — insertion order is only a
//! tiebreaker.
//!
//! Failure semantics: a log that has never been written reads as absent
//! ([`load`] returns `None`), which is how a first run is recognized. A
//! store that exists but cannot be opened or queried is a hard error and
//! must surface to the operator — it is never treated as an empty log.

use anyhow::{Context, Result};
use chrono::DateTime;
use sqlx::{Row, SqlitePool};

use crate::models::Observation;

/// Merge a new batch into the existing log.
///
/// Pure concatenation: every prior entry verbatim, followed by every
/// batch entry. No deduplication, no overwrite. With no prior log the
/// merged log is exactly the batch.
pub fn merge(existing: Option<Vec<Observation>>, batch: Vec<Observation>) -> Vec<Observation> {
    match existing {
        None => batch,
        Some(mut log) => {
            log.extend(batch);
            log
        }
    }
}

/// Load the full log, or `None` if nothing has ever been persisted.
pub async fn load(pool: &SqlitePool) -> Result<Option<Vec<Observation>>> {
    let log = load_all(pool).await?;
    if log.is_empty() {
        Ok(None)
    } else {
        Ok(Some(log))
    }
}

/// Load the full log in insertion order. Empty vec when absent.
pub async fn load_all(pool: &SqlitePool) -> Result<Vec<Observation>> {
    let rows = sqlx::query(
        "SELECT position, promo_position, timestamp, phrase, sku \
         FROM observations ORDER BY id",
    )
    .fetch_all(pool)
    .await
    .context("failed to read history log")?;

    rows.iter()
        .map(|row| {
            let ts: i64 = row.get("timestamp");
            let timestamp = DateTime::from_timestamp(ts, 0)
                .with_context(|| format!("history log holds invalid timestamp {}", ts))?;
            Ok(Observation {
                position: row.get("position"),
                promo_position: row.get("promo_position"),
                timestamp,
                phrase: row.get("phrase"),
                sku: row.get("sku"),
            })
        })
        .collect()
}

/// Persist a freshly fetched batch as the tail of the log.
///
/// All rows land in one transaction: a failure partway leaves every
/// previously committed observation untouched and none of the batch
/// visible. Returns the number of rows appended.
pub async fn append_batch(pool: &SqlitePool, batch: &[Observation]) -> Result<u64> {
    if batch.is_empty() {
        return Ok(0);
    }

    let mut tx = pool.begin().await.context("failed to open merge transaction")?;

    for obs in batch {
        sqlx::query(
            "INSERT INTO observations (position, promo_position, timestamp, phrase, sku) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(obs.position)
        .bind(obs.promo_position)
        .bind(obs.timestamp.timestamp())
        .bind(&obs.phrase)
        .bind(&obs.sku)
        .execute(&mut *tx)
        .await
        .context("failed to append observation")?;
    }

    tx.commit().await.context("failed to commit merge transaction")?;
    Ok(batch.len() as u64)
}

pub async fn count(pool: &SqlitePool) -> Result<i64> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM observations")
        .fetch_one(pool)
        .await?;
    Ok(n)
}
