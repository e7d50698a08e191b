//! Report derivations and export artifacts.
//!
//! Everything here is a full re-derivation from a log snapshot: the
//! tabular spreadsheet dump, the per-SKU chart series, and the status
//! snapshot. No incremental state is carried between export cycles, so
//! regenerating at any time from the same snapshot yields identical
//! artifacts.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::charts;
use crate::config::Config;
use crate::db;
use crate::history;
use crate::models::{format_minute, Observation};
use crate::notify::Notifier;

/// Derived export data: the full log as rows plus one chronological
/// position series per SKU.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Every observation in the log, in log order.
    pub rows: Vec<Observation>,
    /// Per-SKU (timestamp, position) series, ascending by timestamp.
    pub series: BTreeMap<String, Vec<(DateTime<Utc>, i64)>>,
}

/// Derive the full export from a log snapshot.
pub fn build_export(log: &[Observation]) -> Export {
    let mut series: BTreeMap<String, Vec<(DateTime<Utc>, i64)>> = BTreeMap::new();
    for obs in log {
        series
            .entry(obs.sku.clone())
            .or_default()
            .push((obs.timestamp, obs.position));
    }
    for points in series.values_mut() {
        points.sort_by_key(|(ts, _)| *ts);
    }

    Export {
        rows: log.to_vec(),
        series,
    }
}

/// Latest known observation per (phrase, SKU) — the answer to "where do
/// we rank right now" without rescanning history client-side.
pub fn build_status_snapshot(log: &[Observation]) -> BTreeMap<(String, String), Observation> {
    let mut snapshot: BTreeMap<(String, String), Observation> = BTreeMap::new();
    for obs in log {
        let key = (obs.phrase.clone(), obs.sku.clone());
        match snapshot.get(&key) {
            Some(existing) if existing.timestamp > obs.timestamp => {}
            _ => {
                snapshot.insert(key, obs.clone());
            }
        }
    }
    snapshot
}

/// Write the tabular snapshot as a CSV spreadsheet.
///
/// A faithful untransformed dump: one row per observation, in log order.
pub fn write_spreadsheet(rows: &[Observation], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut out = std::io::BufWriter::new(
        std::fs::File::create(path)
            .with_context(|| format!("failed to create spreadsheet: {}", path.display()))?,
    );

    writeln!(out, "position,promo_position,timestamp,phrase,sku")?;
    for obs in rows {
        let promo = obs
            .promo_position
            .map(|p| p.to_string())
            .unwrap_or_default();
        writeln!(
            out,
            "{},{},{},{},{}",
            obs.position,
            promo,
            csv_field(&format_minute(&obs.timestamp)),
            csv_field(&obs.phrase),
            csv_field(&obs.sku)
        )?;
    }

    out.flush()?;
    Ok(())
}

/// Quote a CSV field when it contains a delimiter, quote, or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render one SVG chart per SKU into `dir`, replacing whatever a previous
/// export left there.
pub fn write_charts(
    series: &BTreeMap<String, Vec<(DateTime<Utc>, i64)>>,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;

    // Charts are a full regeneration; stale charts for SKUs that fell out
    // of the log must not linger.
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("svg") {
            std::fs::remove_file(&path)?;
        }
    }

    let mut paths = Vec::new();
    for (sku, points) in series {
        let path = dir.join(format!("{}.svg", file_safe(sku)));
        std::fs::write(&path, charts::render_series_svg(sku, points))
            .with_context(|| format!("failed to write chart: {}", path.display()))?;
        paths.push(path);
    }

    Ok(paths)
}

/// SKUs become file names; anything outside a conservative set is
/// replaced so the archive stays portable.
fn file_safe(sku: &str) -> String {
    sku.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Bundle all chart files into one zip archive.
pub fn bundle_charts(chart_paths: &[PathBuf], zip_path: &Path) -> Result<()> {
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    if let Some(parent) = zip_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file = std::fs::File::create(zip_path)
        .with_context(|| format!("failed to create archive: {}", zip_path.display()))?;
    let mut zip = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for path in chart_paths {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("chart path has no file name")?;
        zip.start_file(name, options)?;
        let bytes = std::fs::read(path)?;
        zip.write_all(&bytes)?;
    }

    zip.finish()?;
    Ok(())
}

/// Paths of one export cycle's artifacts.
pub struct ReportArtifacts {
    pub spreadsheet: PathBuf,
    pub charts: Vec<PathBuf>,
    pub archive: PathBuf,
}

/// Build all report artifacts from the persisted log.
///
/// Returns `None` when the log is still absent — there is nothing to
/// report on a first run.
pub async fn build_artifacts(config: &Config, pool: &sqlx::SqlitePool) -> Result<Option<ReportArtifacts>> {
    let log = history::load_all(pool).await?;
    if log.is_empty() {
        return Ok(None);
    }

    let export = build_export(&log);
    let out_dir = &config.report.output_dir;

    let spreadsheet = out_dir.join("positions.csv");
    write_spreadsheet(&export.rows, &spreadsheet)?;

    let charts = write_charts(&export.series, &out_dir.join("charts"))?;

    let archive = out_dir.join("charts.zip");
    bundle_charts(&charts, &archive)?;

    Ok(Some(ReportArtifacts {
        spreadsheet,
        charts,
        archive,
    }))
}

/// Run the `report` command: build artifacts and optionally deliver them.
pub async fn run_report(config: &Config, notifier: Option<&dyn Notifier>) -> Result<()> {
    let pool = db::connect(config).await?;
    let artifacts = build_artifacts(config, &pool).await?;
    pool.close().await;

    let Some(artifacts) = artifacts else {
        println!("history log is empty — nothing to report");
        if let Some(notifier) = notifier {
            notifier.send_text("Nothing to report yet: no positions recorded.").await?;
        }
        return Ok(());
    };

    println!("report");
    println!("  spreadsheet: {}", artifacts.spreadsheet.display());
    println!("  charts: {}", artifacts.charts.len());
    println!("  archive: {}", artifacts.archive.display());

    if let Some(notifier) = notifier {
        notifier
            .send_file(&artifacts.spreadsheet, "Position report")
            .await?;
        notifier
            .send_file(&artifacts.archive, "Position charts")
            .await?;
        println!("  delivered");
    }

    println!("ok");
    Ok(())
}
