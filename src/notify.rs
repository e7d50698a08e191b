//! Outward notification transport.
//!
//! The pipeline only ever needs two operations from the messaging side:
//! send a text, send a file. [`Notifier`] is that seam; the production
//! implementation talks to the Telegram Bot API, and tests substitute a
//! capturing mock.
//!
//! Delivery is per-recipient: a failure for one chat is logged and never
//! blocks the remaining chats, and transport failures as a whole never
//! abort the pipeline that triggered the notification.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;

use crate::config::TelegramConfig;

/// Narrow send-text / send-file interface consumed by the core.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a text message to every configured recipient.
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Deliver a file with a caption to every configured recipient.
    async fn send_file(&self, path: &Path, caption: &str) -> Result<()>;
}

/// Telegram Bot API transport.
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_base: String,
    token: String,
    chat_ids: Vec<i64>,
}

impl TelegramNotifier {
    /// Build the transport from config; the bot token is read from the
    /// environment variable named in `[telegram] token_env`.
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = std::env::var(&config.token_env)
            .with_context(|| format!("{} environment variable not set", config.token_env))?;
        if config.chat_ids.is_empty() {
            anyhow::bail!("telegram.chat_ids must list at least one recipient");
        }

        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token,
            chat_ids: config.chat_ids.clone(),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn send_message_to(&self, chat_id: i64, text: &str) -> Result<()> {
        self.http
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("non-success status")?;
        Ok(())
    }

    async fn send_document_to(
        &self,
        chat_id: i64,
        file_name: &str,
        bytes: Vec<u8>,
        caption: &str,
    ) -> Result<()> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name.to_string());
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        self.http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .context("request failed")?
            .error_for_status()
            .context("non-success status")?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_text(&self, text: &str) -> Result<()> {
        for chat_id in &self.chat_ids {
            if let Err(err) = self.send_message_to(*chat_id, text).await {
                tracing::warn!(chat_id, error = %err, "text notification failed");
            }
        }
        Ok(())
    }

    async fn send_file(&self, path: &Path, caption: &str) -> Result<()> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read file for delivery: {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();

        for chat_id in &self.chat_ids {
            if let Err(err) = self
                .send_document_to(*chat_id, &file_name, bytes.clone(), caption)
                .await
            {
                tracing::warn!(chat_id, error = %err, "file notification failed");
            }
        }
        Ok(())
    }
}
