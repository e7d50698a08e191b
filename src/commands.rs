//! Inbound command channel.
//!
//! A thin adapter over the Telegram `getUpdates` long poll: it watches
//! for `/report` and `/status` texts from authorized chats and dispatches
//! them against the persisted log. Everything here stays outside the
//! tracking core — the adapter only consumes the reporter's output
//! contract.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::history;
use crate::notify::Notifier;
use crate::report;
use crate::status::render_status_text;

/// Recognized pull commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Report,
    Status,
}

/// Parse a message text into a command.
///
/// Accepts the bare form and the group form with a bot suffix
/// (`/status@shelfwatch_bot`); anything else is ignored.
pub fn parse_command(text: &str) -> Option<Command> {
    let first = text.trim().split_whitespace().next()?;
    let name = first.split('@').next()?;
    match name {
        "/report" => Some(Command::Report),
        "/status" => Some(Command::Status),
        _ => None,
    }
}

// ============ getUpdates wire format ============

#[derive(Debug, Deserialize)]
struct UpdatesResponse {
    #[serde(default)]
    result: Vec<Update>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

/// Long-poll the command channel forever.
///
/// Per-request failures are logged and retried after a short pause; a
/// failed dispatch never stops the poller. Only a missing bot token
/// aborts, since no command can ever arrive without one.
pub async fn poll_commands(
    config: Arc<Config>,
    pool: sqlx::SqlitePool,
    notifier: Arc<dyn Notifier>,
) -> Result<()> {
    let token = std::env::var(&config.telegram.token_env)
        .with_context(|| format!("{} environment variable not set", config.telegram.token_env))?;
    let api_base = config.telegram.api_base.trim_end_matches('/').to_string();
    let poll_timeout = config.telegram.poll_timeout_secs;

    // The HTTP timeout must outlast the server-side long-poll window.
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(poll_timeout + 10))
        .build()
        .context("failed to build command-channel HTTP client")?;

    let url = format!("{}/bot{}/getUpdates", api_base, token);
    let mut offset: Option<i64> = None;

    loop {
        let mut query: Vec<(&str, String)> = vec![("timeout", poll_timeout.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let updates = match fetch_updates(&http, &url, &query).await {
            Ok(updates) => updates,
            Err(err) => {
                tracing::warn!(error = %err, "getUpdates failed");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);

            let Some(message) = update.message else { continue };
            let Some(text) = message.text.as_deref() else { continue };
            if !config.telegram.chat_ids.contains(&message.chat.id) {
                tracing::warn!(chat_id = message.chat.id, "ignoring command from unauthorized chat");
                continue;
            }
            let Some(command) = parse_command(text) else { continue };

            tracing::info!(chat_id = message.chat.id, ?command, "command received");
            if let Err(err) = dispatch(command, &config, &pool, notifier.as_ref()).await {
                tracing::error!(?command, error = %err, "command dispatch failed");
            }
        }
    }
}

async fn fetch_updates(
    http: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<Vec<Update>> {
    let response: UpdatesResponse = http
        .get(url)
        .query(query)
        .send()
        .await
        .context("request failed")?
        .error_for_status()
        .context("non-success status")?
        .json()
        .await
        .context("malformed getUpdates payload")?;
    Ok(response.result)
}

async fn dispatch(
    command: Command,
    config: &Config,
    pool: &sqlx::SqlitePool,
    notifier: &dyn Notifier,
) -> Result<()> {
    match command {
        Command::Status => {
            let log = history::load_all(pool).await?;
            let snapshot = report::build_status_snapshot(&log);
            notifier.send_text(&render_status_text(&snapshot)).await
        }
        Command::Report => match report::build_artifacts(config, pool).await? {
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
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_both_commands() {
        assert_eq!(parse_command("/report"), Some(Command::Report));
        assert_eq!(parse_command("/status"), Some(Command::Status));
    }

    #[test]
    fn accepts_bot_suffix_and_trailing_words() {
        assert_eq!(parse_command("/status@shelfwatch_bot"), Some(Command::Status));
        assert_eq!(parse_command("  /report now please"), Some(Command::Report));
    }

    #[test]
    fn ignores_everything_else() {
        assert_eq!(parse_command("hello"), None);
        assert_eq!(parse_command("/reports"), None);
        assert_eq!(parse_command(""), None);
    }

    #[test]
    fn parses_update_payload() {
        let payload = r#"{
            "ok": true,
            "result": [
                {"update_id": 42,
                 "message": {"chat": {"id": 7}, "text": "/status"}},
                {"update_id": 43, "message": {"chat": {"id": 7}}}
            ]
        }"#;
        let response: UpdatesResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.result.len(), 2);
        assert_eq!(response.result[0].update_id, 42);
        assert_eq!(
            response.result[0].message.as_ref().unwrap().text.as_deref(),
            Some("/status")
        );
        assert!(response.result[1].message.as_ref().unwrap().text.is_none());
    }
}
