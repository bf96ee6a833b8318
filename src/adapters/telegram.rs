//! Telegram bot notifications

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::AlertSink;
use crate::config::NotifierConfig;
use crate::error::{RadarError, Result};
use crate::supervisor::Alert;

const TELEGRAM_API: &str = "https://api.telegram.org";

/// Telegram notification client
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    base_url: String,
    bot_token: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

impl TelegramNotifier {
    pub fn new(bot_token: String, chat_id: String) -> Arc<Self> {
        Arc::new(Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            base_url: TELEGRAM_API.to_string(),
            bot_token,
            chat_id,
        })
    }

    /// Enabled only when both token and chat id are configured
    pub fn from_config(cfg: &NotifierConfig) -> Option<Arc<Self>> {
        match (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
            (Some(token), Some(chat)) if !token.is_empty() && !chat.is_empty() => {
                info!("Telegram notifications enabled");
                Some(Self::new(token.clone(), chat.clone()))
            }
            _ => None,
        }
    }

    /// Fallback to `TELEGRAM_BOT_TOKEN` / `TELEGRAM_CHAT_ID`
    pub fn from_env() -> Option<Arc<Self>> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let chat = std::env::var("TELEGRAM_CHAT_ID").ok()?;
        Self::from_config(&NotifierConfig {
            telegram_bot_token: Some(token),
            telegram_chat_id: Some(chat),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.base_url, self.bot_token)
    }

    pub async fn send_message(&self, text: &str) -> Result<()> {
        let body = SendMessage {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
        };

        let resp = self.client.post(self.endpoint()).json(&body).send().await?;
        if resp.status().is_success() {
            debug!("Telegram message sent");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(RadarError::Notification(format!("HTTP {}: {}", status, body)))
        }
    }
}

#[async_trait]
impl AlertSink for TelegramNotifier {
    async fn deliver(&self, alert: &Alert) -> Result<()> {
        self.send_message(&alert.format_text()).await
    }
}
