//! The `shelf run` daemon.
//!
//! Wires the scheduler, the command poller, and the liveness server
//! around the tracking core. One tracking cycle runs immediately at
//! startup; afterwards the jobs fire on their configured cadences. A
//! failed cycle is logged and reported — the daemon itself never exits
//! over it.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::commands;
use crate::config::Config;
use crate::db;
use crate::migrate;
use crate::notify::{Notifier, TelegramNotifier};
use crate::report;
use crate::scheduler::{run_job, Cadence};
use crate::server;
use crate::track;

pub async fn run_daemon(config: &Config) -> Result<()> {
    let (report_weekday, report_at) = config.report_cadence()?;

    let pool = db::connect(config).await?;
    migrate::ensure_schema(&pool).await?;

    let config = Arc::new(config.clone());
    let notifier = Arc::new(
        TelegramNotifier::from_config(&config.telegram)
            .context("daemon requires a configured notification transport")?,
    );

    // Operators expect positions in the channel as soon as the service
    // comes up, not one interval later.
    if let Err(err) = track::run_cycle(&config, &pool, notifier.as_ref()).await {
        tracing::error!(error = %err, "startup tracking cycle failed");
    }

    // Tracking job
    {
        let config = config.clone();
        let pool = pool.clone();
        let notifier = notifier.clone();
        let cadence = Cadence::Every(Duration::from_secs(
            config.schedule.track_every_hours * 3600,
        ));
        tokio::spawn(run_job("track", cadence, move || {
            let config = config.clone();
            let pool = pool.clone();
            let notifier = notifier.clone();
            async move {
                track::run_cycle(&config, &pool, notifier.as_ref())
                    .await
                    .map(|outcome| {
                        tracing::info!(
                            fetched = outcome.fetched,
                            alerts = outcome.alerts.len(),
                            "tracking cycle completed"
                        );
                    })
            }
        }));
    }

    // Weekly export job
    {
        let config = config.clone();
        let pool = pool.clone();
        let notifier = notifier.clone();
        let cadence = Cadence::Weekly {
            weekday: report_weekday,
            at: report_at,
        };
        tokio::spawn(run_job("report", cadence, move || {
            let config = config.clone();
            let pool = pool.clone();
            let notifier = notifier.clone();
            async move { deliver_report(&config, &pool, notifier.as_ref()).await }
        }));
    }

    // Command poller
    {
        let config = config.clone();
        let pool = pool.clone();
        let notifier: Arc<dyn Notifier> = notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = commands::poll_commands(config, pool, notifier).await {
                tracing::error!(error = %err, "command poller stopped");
            }
        });
    }

    // Liveness server runs in the foreground and keeps the daemon alive.
    server::serve(&config.server.bind, pool).await
}

async fn deliver_report(
    config: &Config,
    pool: &sqlx::SqlitePool,
    notifier: &dyn Notifier,
) -> Result<()> {
    match report::build_artifacts(config, pool).await? {
        None => {
            notifier
                .send_text("Nothing to report yet: no positions recorded.")
                .await
        }
        Some(artifacts) => {
            notifier
                .send_file(&artifacts.spreadsheet, "Position report")
                .await?;
            notifier
                .send_file(&artifacts.archive, "Position charts")
                .await
        }
    }
}
