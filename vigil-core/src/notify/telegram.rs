use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use super::Notifier;
use crate::error::{Result, VigilError};
use crate::retry::{retry_with, RetryPolicy};

/// Hard per-message ceiling of the Bot API.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 4096;

const TRUNCATION_MARK: &str = "\n…";

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct GetUpdates {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    #[serde(default)]
    retry_after: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// Telegram Bot API client: HTML messages out, long-polled commands in.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: Client,
    api_base: String,
    token: String,
    retry: RetryPolicy,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("api_base", &self.api_base)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(15)).build()?;
        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryPolicy::new(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.token, method)
    }

    async fn send_once(
        &self,
        chat_id: &str,
        text: &str,
    ) -> std::result::Result<(), (VigilError, Option<Duration>)> {
        let payload = SendMessage {
            chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| (VigilError::HttpError(e), None))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body: Option<ApiResponse<serde_json::Value>> = response.json().await.ok();
        let description = body
            .as_ref()
            .and_then(|b| b.description.clone())
            .unwrap_or_else(|| "no description".to_string());

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = body
                .and_then(|b| b.parameters)
                .and_then(|p| p.retry_after)
                .map(Duration::from_secs);
            return Err((VigilError::RateLimited(description), retry_after));
        }

        Err((
            VigilError::NotificationFailed(format!(
                "Telegram API returned status {}: {}",
                status.as_u16(),
                description
            )),
            None,
        ))
    }

    /// Long-poll for inbound messages after `offset`.
    #[instrument(skip(self))]
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let request = GetUpdates {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };

        let response: ApiResponse<Vec<Update>> = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_secs + 10))
            .json(&request)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(VigilError::NotificationFailed(format!(
                "getUpdates failed: {}",
                response.description.unwrap_or_default()
            )));
        }
        let updates = response.result.unwrap_or_default();
        debug!(count = updates.len(), "Received updates");
        Ok(updates)
    }
}

/// Cut `text` to at most `limit` characters, marking the cut.
pub(crate) fn truncate_message(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(TRUNCATION_MARK.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_MARK);
    out
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), fields(chat_id = %chat_id, len = text.len()))]
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let text = truncate_message(text, TELEGRAM_MESSAGE_LIMIT);
        if text.ends_with(TRUNCATION_MARK) {
            warn!("Message exceeded the transport limit and was truncated");
        }
        retry_with(&self.retry, || self.send_once(chat_id, &text)).await?;
        debug!("Message delivered");
        Ok(())
    }
}
