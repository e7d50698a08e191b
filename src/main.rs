//! # Shelfwatch CLI (`shelf`)
//!
//! The `shelf` binary is the primary interface for Shelfwatch. It
//! provides commands for database initialization, one-off tracking
//! cycles, status queries, report generation, and the long-running
//! daemon.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelfwatch.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the SQLite history database and schema |
//! | `shelf track` | Run one fetch → merge → analyze → notify cycle |
//! | `shelf status` | Print the latest known rank per phrase/SKU |
//! | `shelf report` | Build the spreadsheet, charts, and archive |
//! | `shelf run` | Start the scheduler, command poller, and liveness server |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use shelfwatch::{config, daemon, migrate, report, status, track};

/// Shelfwatch — marketplace search-rank tracking and alerting for brand
/// catalogs.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/shelfwatch.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "Shelfwatch — marketplace search-rank tracking and alerting",
    version,
    long_about = "Shelfwatch polls a marketplace search API for configured phrases, tracks \
    where one brand's product cards rank, keeps the full position history in SQLite, alerts \
    a Telegram channel on sharp rank drops, and produces spreadsheet and chart exports."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shelfwatch.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the history database schema.
    ///
    /// Creates the SQLite file and the `observations` table. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Run one tracking cycle.
    ///
    /// Fetches positions for every configured phrase, appends the batch
    /// to the history log, checks for sharp drops, and notifies the
    /// configured Telegram chats.
    Track {
        /// Fetch and print without persisting or notifying.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the latest known rank per (phrase, SKU).
    Status,

    /// Build the report artifacts: CSV spreadsheet, per-SKU SVG charts,
    /// and a zip archive of the charts.
    Report {
        /// Also deliver the artifacts to the configured Telegram chats.
        #[arg(long)]
        send: bool,
    },

    /// Run the daemon: scheduled tracking and reporting, the command
    /// poller, and the liveness HTTP server.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("shelfwatch=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Track { dry_run } => {
            track::run_track(&cfg, dry_run).await?;
        }
        Commands::Status => {
            status::run_status(&cfg).await?;
        }
        Commands::Report { send } => {
            if send {
                let notifier = shelfwatch::notify::TelegramNotifier::from_config(&cfg.telegram)?;
                report::run_report(&cfg, Some(&notifier)).await?;
            } else {
                report::run_report(&cfg, None).await?;
            }
        }
        Commands::Run => {
            daemon::run_daemon(&cfg).await?;
        }
    }

    Ok(())
}
