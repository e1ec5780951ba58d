//! Aggregated status reports, daily and on demand.

mod format;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::{Result, VigilError};
use crate::models::{User, UserId};
use crate::notify::Notifier;
use crate::store::Store;

pub use format::{build_report, chunk_blocks, MIN_CHUNK_LIMIT};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    #[default]
    Full,
    Websites,
    Domains,
}

impl ReportKind {
    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Full => "Monitoring report",
            ReportKind::Websites => "Website report",
            ReportKind::Domains => "Domain report",
        }
    }

    pub fn includes_websites(&self) -> bool {
        matches!(self, ReportKind::Full | ReportKind::Websites)
    }

    pub fn includes_domains(&self) -> bool {
        matches!(self, ReportKind::Full | ReportKind::Domains)
    }
}

impl std::str::FromStr for ReportKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "full" | "all" => Ok(ReportKind::Full),
            "websites" | "sites" => Ok(ReportKind::Websites),
            "domains" => Ok(ReportKind::Domains),
            _ => Err(format!("Unknown report kind: {}", s)),
        }
    }
}

/// Outcome of sending the daily report to every recipient.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub recipients: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Reporter {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    chunk_limit: usize,
}

impl Reporter {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            chunk_limit: 4000,
        }
    }

    /// Values under `MIN_CHUNK_LIMIT` are raised to it.
    pub fn with_chunk_limit(mut self, limit: usize) -> Self {
        self.chunk_limit = limit.max(MIN_CHUNK_LIMIT);
        self
    }

    /// Render the report for one user without sending it.
    pub async fn render(&self, user: &User, kind: ReportKind, now: DateTime<Utc>) -> Result<Vec<String>> {
        let websites = if kind.includes_websites() {
            let mut all = self.store.websites_for_user(user.id).await?;
            all.retain(|t| t.website.is_active);
            all
        } else {
            Vec::new()
        };
        let domains = if kind.includes_domains() {
            let mut all = self.store.domains_for_user(user.id).await?;
            all.retain(|t| t.domain.is_active);
            all
        } else {
            Vec::new()
        };
        Ok(build_report(kind, &websites, &domains, now, self.chunk_limit))
    }

    /// On-demand report for a user id. Returns how many messages went out.
    pub async fn send_report(&self, user_id: UserId, kind: ReportKind) -> Result<usize> {
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("user {}", user_id)))?;
        self.send_report_to(&user, kind).await
    }

    #[instrument(skip(self, user), fields(user_id = user.id))]
    pub async fn send_report_to(&self, user: &User, kind: ReportKind) -> Result<usize> {
        let chat_id = user
            .chat_id
            .as_deref()
            .ok_or(VigilError::NoMessagingChannel)?;

        let messages = self.render(user, kind, Utc::now()).await?;
        for message in &messages {
            self.notifier.send_message(chat_id, message).await?;
        }
        info!(messages = messages.len(), ?kind, "Report sent");
        Ok(messages.len())
    }

    /// Full report to every user with a chat and notifications on. A failure
    /// for one user is logged and the rest still get theirs.
    pub async fn send_daily_reports(&self) -> Result<DispatchSummary> {
        let recipients = self.store.report_recipients().await?;
        let mut summary = DispatchSummary {
            recipients: recipients.len(),
            ..Default::default()
        };

        for user in &recipients {
            match self.send_report_to(user, ReportKind::Full).await {
                Ok(_) => summary.delivered += 1,
                Err(e) => {
                    summary.failed += 1;
                    error!(user_id = user.id, error = %e, "Daily report failed");
                }
            }
        }

        info!(
            recipients = summary.recipients,
            delivered = summary.delivered,
            failed = summary.failed,
            "Daily reports dispatched"
        );
        Ok(summary)
    }
}
