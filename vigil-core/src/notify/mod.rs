//! Outbound messaging.

mod messages;
mod telegram;

use async_trait::async_trait;

use crate::error::{Result, VigilError};

pub use messages::{
    domain_alert_message, escape_html, format_timestamp, website_alert_message, DomainAlertKind,
    WebsiteTransition,
};
pub use telegram::{Chat, IncomingMessage, TelegramNotifier, Update, TELEGRAM_MESSAGE_LIMIT};

/// A channel able to deliver HTML-formatted text to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> Result<()>;
}

/// Stand-in used when no bot token is configured; every send fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledNotifier;

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send_message(&self, _chat_id: &str, _text: &str) -> Result<()> {
        Err(VigilError::NotifierDisabled)
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_notifier_refuses() {
        let result = DisabledNotifier.send_message("1", "hello").await;
        assert!(matches!(result, Err(VigilError::NotifierDisabled)));
    }
}
