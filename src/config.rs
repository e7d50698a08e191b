use anyhow::{Context, Result};
use chrono::{NaiveTime, Weekday};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::identity::IdentityMap;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub marketplace: MarketplaceConfig,
    /// Raw marketplace id → SKU code. TOML table keys are strings; they
    /// must parse as unsigned integers.
    #[serde(default)]
    pub products: HashMap<String, String>,
    #[serde(default)]
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub db_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    /// Search endpoint URL including any fixed catalog parameters. The
    /// client appends `query` and `page` per request.
    pub search_url: String,
    /// Brand name whose cards are tracked; everything else is ignored.
    pub brand: String,
    /// Search phrases polled each cycle.
    pub phrases: Vec<String>,
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_max_pages() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct AlertsConfig {
    /// Minimum organic-position worsening between two consecutive
    /// observations of a SKU that raises a drop alert.
    #[serde(default = "default_drop_threshold")]
    pub drop_threshold: i64,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            drop_threshold: default_drop_threshold(),
        }
    }
}

fn default_drop_threshold() -> i64 {
    20
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    /// Environment variable holding the bot token. The token itself never
    /// lives in the config file.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    /// Chats notified on every cycle and authorized to issue commands.
    #[serde(default)]
    pub chat_ids: Vec<i64>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Long-poll timeout for getUpdates, seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: default_token_env(),
            chat_ids: Vec::new(),
            api_base: default_api_base(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

fn default_token_env() -> String {
    "TELEGRAM_TOKEN".to_string()
}
fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}
fn default_poll_timeout_secs() -> u64 {
    25
}

#[derive(Debug, Deserialize, Clone)]
pub struct ReportConfig {
    /// Directory receiving the spreadsheet, chart images, and archive.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    /// Hours between tracking cycles.
    #[serde(default = "default_track_every_hours")]
    pub track_every_hours: u64,
    /// Weekday of the periodic export, e.g. `"sun"` or `"sunday"`.
    #[serde(default = "default_report_weekday")]
    pub report_weekday: String,
    /// Time of day (UTC, `HH:MM`) of the periodic export.
    #[serde(default = "default_report_time")]
    pub report_time: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            track_every_hours: default_track_every_hours(),
            report_weekday: default_report_weekday(),
            report_time: default_report_time(),
        }
    }
}

fn default_track_every_hours() -> u64 {
    4
}
fn default_report_weekday() -> String {
    "sun".to_string()
}
fn default_report_time() -> String {
    "10:00".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7332".to_string()
}

impl Config {
    /// Build the identity map from the `[products]` table.
    ///
    /// Keys were validated as unsigned integers by [`load_config`], so
    /// parse failures cannot occur on a loaded config.
    pub fn identity_map(&self) -> IdentityMap {
        let map = self
            .products
            .iter()
            .filter_map(|(raw, sku)| raw.parse::<u64>().ok().map(|id| (id, sku.clone())))
            .collect();
        IdentityMap::new(map)
    }

    /// Parsed weekly report cadence from the `[schedule]` section.
    pub fn report_cadence(&self) -> Result<(Weekday, NaiveTime)> {
        let weekday = parse_weekday(&self.schedule.report_weekday)?;
        let at = NaiveTime::parse_from_str(&self.schedule.report_time, "%H:%M")
            .with_context(|| format!("invalid schedule.report_time: '{}'", self.schedule.report_time))?;
        Ok((weekday, at))
    }
}

/// Parse a weekday name, accepting both short (`"sun"`) and full
/// (`"sunday"`) forms, case-insensitive.
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        other => anyhow::bail!("unknown weekday: '{}'", other),
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate marketplace
    if config.marketplace.search_url.is_empty() {
        anyhow::bail!("marketplace.search_url must not be empty");
    }
    if config.marketplace.brand.is_empty() {
        anyhow::bail!("marketplace.brand must not be empty");
    }
    if config.marketplace.phrases.is_empty() {
        anyhow::bail!("marketplace.phrases must list at least one search phrase");
    }
    if config.marketplace.max_pages == 0 {
        anyhow::bail!("marketplace.max_pages must be >= 1");
    }

    // Validate products (keys must be raw numeric marketplace ids)
    for (raw, sku) in &config.products {
        if raw.parse::<u64>().is_err() {
            anyhow::bail!("products key '{}' is not a numeric marketplace id", raw);
        }
        if sku.is_empty() {
            anyhow::bail!("products entry '{}' maps to an empty SKU", raw);
        }
    }

    // Validate alerts
    if config.alerts.drop_threshold < 1 {
        anyhow::bail!("alerts.drop_threshold must be >= 1");
    }

    // Validate schedule
    if config.schedule.track_every_hours == 0 {
        anyhow::bail!("schedule.track_every_hours must be >= 1");
    }
    config.report_cadence()?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Weekday;
    use std::io::Write;

    fn write_config(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const MINIMAL: &str = r#"
[storage]
db_path = "./data/shelfwatch.sqlite"

[marketplace]
search_url = "https://search.example.com/v13/search?resultset=catalog&sort=popular"
brand = "Northloom"
phrases = ["mens pajama set", "jersey"]

[products]
"260800583" = "NL-PJ-BK-0924"
"#;

    #[test]
    fn minimal_config_loads_with_defaults() {
        let file = write_config(MINIMAL);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.marketplace.max_pages, 3);
        assert_eq!(config.marketplace.timeout_secs, 10);
        assert_eq!(config.alerts.drop_threshold, 20);
        assert_eq!(config.schedule.track_every_hours, 4);
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.identity_map().resolve(260800583), "NL-PJ-BK-0924");

        let (weekday, at) = config.report_cadence().unwrap();
        assert_eq!(weekday, Weekday::Sun);
        assert_eq!(at, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn rejects_empty_phrase_list() {
        let body = MINIMAL.replace(r#"phrases = ["mens pajama set", "jersey"]"#, "phrases = []");
        let file = write_config(&body);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("phrases"));
    }

    #[test]
    fn rejects_non_numeric_product_key() {
        let body = MINIMAL.replace(r#""260800583""#, r#""not-an-id""#);
        let file = write_config(&body);
        let err = load_config(file.path()).unwrap_err();
        assert!(err.to_string().contains("not-an-id"));
    }

    #[test]
    fn rejects_zero_drop_threshold() {
        let body = format!("{}\n[alerts]\ndrop_threshold = 0\n", MINIMAL);
        let file = write_config(&body);
        assert!(load_config(file.path()).is_err());
    }

    #[test]
    fn parses_weekday_forms() {
        assert_eq!(parse_weekday("Sunday").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday("wed").unwrap(), Weekday::Wed);
        assert!(parse_weekday("someday").is_err());
    }
}
