use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    ensure_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the history schema if it does not exist. Idempotent.
///
/// `id` is an alias for the rowid and preserves insertion order across
/// merges; the log itself is append-only, so there are no UPDATE or
/// DELETE paths against this table anywhere in the crate.
pub async fn ensure_schema(pool: &sqlx::SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS observations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            position INTEGER NOT NULL CHECK (position >= 1),
            promo_position INTEGER,
            timestamp INTEGER NOT NULL,
            phrase TEXT NOT NULL,
            sku TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_sku_ts ON observations(sku, timestamp DESC)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_observations_phrase_sku ON observations(phrase, sku)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
