// =============================================================================
// Telegram Bot API Sink
// =============================================================================
//
// SECURITY: the bot token is part of the request URL, so neither the URL nor
// the token is ever logged or shown in `Debug` output. The chat id is treated
// the same way.
// =============================================================================

use anyhow::{ensure, Context, Result};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::notify::NotificationSink;

pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    base_url: String,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier for one bot and one destination chat.
    ///
    /// Both values are required; an empty one is a startup error.
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Result<Self> {
        let token = token.into();
        let chat_id = chat_id.into();
        ensure!(!token.trim().is_empty(), "Telegram bot token is empty");
        ensure!(!chat_id.trim().is_empty(), "Telegram chat id is empty");

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .context("failed to build reqwest client")?;

        debug!("TelegramNotifier initialised");

        Ok(Self {
            token,
            chat_id,
            base_url: "https://api.telegram.org".to_string(),
            client,
        })
    }

    /// Read `TELEGRAM_TOKEN` and `TELEGRAM_CHAT_ID` from the environment.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("TELEGRAM_TOKEN").context("TELEGRAM_TOKEN is not set")?;
        let chat_id = std::env::var("TELEGRAM_CHAT_ID").context("TELEGRAM_CHAT_ID is not set")?;
        Self::new(token, chat_id)
    }
}

#[async_trait]
impl NotificationSink for TelegramNotifier {
    #[instrument(skip_all, name = "telegram::send")]
    async fn send(&self, message: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.token);

        // Errors are rebuilt without the request URL, which embeds the token.
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "chat_id": self.chat_id, "text": message }))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Telegram sendMessage request failed: {}", e.without_url()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Telegram sendMessage returned {}: {}", status, body);
        }

        debug!("Telegram alert delivered");
        Ok(())
    }
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("token", &"<redacted>")
            .field("chat_id", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_secrets() {
        let notifier = TelegramNotifier::new("123456:SECRET", "-100987").unwrap();
        let rendered = format!("{notifier:?}");
        assert!(!rendered.contains("SECRET"));
        assert!(!rendered.contains("-100987"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn empty_credentials_rejected() {
        assert!(TelegramNotifier::new("", "42").is_err());
        assert!(TelegramNotifier::new("token", "  ").is_err());
    }
}
