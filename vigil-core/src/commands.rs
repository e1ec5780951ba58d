//! Inbound chat commands.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::{Result, VigilError};
use crate::notify::{Notifier, TelegramNotifier};
use crate::report::{ReportKind, Reporter};
use crate::store::Store;

const POLL_TIMEOUT_SECS: u64 = 30;
const POLL_BACKOFF: Duration = Duration::from_secs(5);

const HELP_TEXT: &str = "<b>Available commands</b>\n\
/report - full status report\n\
/websites - website report\n\
/domains - domain report\n\
/start - show this chat's id\n\
/help - this message";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Report(ReportKind),
}

impl Command {
    /// Parse the first word of a message. Handles the `/cmd@botname` form.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "help" => Some(Command::Help),
            "report" | "status" => Some(Command::Report(ReportKind::Full)),
            "websites" => Some(Command::Report(ReportKind::Websites)),
            "domains" => Some(Command::Report(ReportKind::Domains)),
            _ => None,
        }
    }
}

pub struct CommandDispatcher {
    store: Arc<dyn Store>,
    reporter: Arc<Reporter>,
    notifier: Arc<dyn Notifier>,
}

impl CommandDispatcher {
    pub fn new(store: Arc<dyn Store>, reporter: Arc<Reporter>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            reporter,
            notifier,
        }
    }

    /// Act on one message from `chat_id`. Unknown text is ignored.
    pub async fn handle(&self, chat_id: &str, text: &str) -> Result<()> {
        let Some(command) = Command::parse(text) else {
            debug!(chat_id, "Ignoring non-command message");
            return Ok(());
        };
        info!(chat_id, ?command, "Command received");

        match command {
            Command::Start => {
                let linked = self.store.find_user_by_chat(chat_id).await?.is_some();
                let reply = if linked {
                    format!(
                        "👋 This chat (<code>{}</code>) is linked. Send /help for commands.",
                        chat_id
                    )
                } else {
                    format!(
                        "👋 Your chat id is <code>{}</code>. Link it to your account to receive alerts.",
                        chat_id
                    )
                };
                self.notifier.send_message(chat_id, &reply).await
            }
            Command::Help => self.notifier.send_message(chat_id, HELP_TEXT).await,
            Command::Report(kind) => match self.store.find_user_by_chat(chat_id).await? {
                Some(user) => self.reporter.send_report_to(&user, kind).await.map(|_| ()),
                None => {
                    self.notifier
                        .send_message(
                            chat_id,
                            "This chat is not linked to an account. Send /start to see its id.",
                        )
                        .await
                }
            },
        }
    }
}

/// Long-poll the bot for messages until `shutdown` flips.
pub async fn run_polling(
    bot: TelegramNotifier,
    dispatcher: Arc<CommandDispatcher>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("Command polling started");
    let mut offset: Option<i64> = None;

    loop {
        let updates = tokio::select! {
            result = bot.get_updates(offset, POLL_TIMEOUT_SECS) => result,
            _ = shutdown.changed() => break,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                warn!(error = %e, "Polling for updates failed");
                tokio::select! {
                    _ = tokio::time::sleep(POLL_BACKOFF) => continue,
                    _ = shutdown.changed() => break,
                }
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            let Some(text) = message.text else {
                continue;
            };
            let chat_id = message.chat.id.to_string();
            if let Err(e) = dispatcher.handle(&chat_id, &text).await {
                match e {
                    VigilError::NoMessagingChannel | VigilError::NotFound(_) => {
                        debug!(chat_id = %chat_id, error = %e, "Command not applicable")
                    }
                    _ => warn!(chat_id = %chat_id, error = %e, "Command failed"),
                }
            }
        }
    }
    info!("Command polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::testing::RecordingNotifier;
    use crate::store::MemoryStore;

    fn dispatcher() -> (Arc<MemoryStore>, Arc<RecordingNotifier>, CommandDispatcher) {
        let store = Arc::new(MemoryStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let reporter = Arc::new(Reporter::new(store.clone(), notifier.clone()));
        let dispatcher = CommandDispatcher::new(store.clone(), reporter, notifier.clone());
        (store, notifier, dispatcher)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("/help extra words"), Some(Command::Help));
        assert_eq!(
            Command::parse("/report@vigil_bot"),
            Some(Command::Report(ReportKind::Full))
        );
        assert_eq!(
            Command::parse("  /Domains"),
            Some(Command::Report(ReportKind::Domains))
        );
        assert_eq!(Command::parse("report"), None);
        assert_eq!(Command::parse("/unknown"), None);
        assert_eq!(Command::parse(""), None);
    }

    #[tokio::test]
    async fn test_start_reports_chat_id() {
        let (_, notifier, dispatcher) = dispatcher();
        dispatcher.handle("4242", "/start").await.unwrap();
        let sent = notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("<code>4242</code>"));
    }

    #[tokio::test]
    async fn test_report_for_unlinked_chat() {
        let (_, notifier, dispatcher) = dispatcher();
        dispatcher.handle("1", "/report").await.unwrap();
        let sent = notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("not linked"));
    }

    #[tokio::test]
    async fn test_report_for_linked_chat() {
        let (store, notifier, dispatcher) = dispatcher();
        store.create_user(Some("99")).await.unwrap();
        dispatcher.handle("99", "/websites").await.unwrap();
        let sent = notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("Website report"));
    }

    #[tokio::test]
    async fn test_plain_text_ignored() {
        let (_, notifier, dispatcher) = dispatcher();
        dispatcher.handle("1", "hello there").await.unwrap();
        assert!(notifier.messages().is_empty());
    }
}
