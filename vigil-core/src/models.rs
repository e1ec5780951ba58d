//! Monitored targets, users and immutable check records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};

pub type UserId = i64;
pub type WebsiteId = i64;
pub type DomainId = i64;

/// Liveness outcome of a single website check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WebsiteStatus {
    Online,
    Offline,
    Error,
}

impl WebsiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebsiteStatus::Online => "ONLINE",
            WebsiteStatus::Offline => "OFFLINE",
            WebsiteStatus::Error => "ERROR",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, WebsiteStatus::Online)
    }
}

impl std::fmt::Display for WebsiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for WebsiteStatus {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ONLINE" => Ok(WebsiteStatus::Online),
            "OFFLINE" => Ok(WebsiteStatus::Offline),
            "ERROR" => Ok(WebsiteStatus::Error),
            other => Err(VigilError::Other(format!("unknown website status: {}", other))),
        }
    }
}

/// Registration outcome of a single domain check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DomainStatus {
    Active,
    ExpiringSoon,
    Expired,
    Error,
}

impl DomainStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DomainStatus::Active => "ACTIVE",
            DomainStatus::ExpiringSoon => "EXPIRING_SOON",
            DomainStatus::Expired => "EXPIRED",
            DomainStatus::Error => "ERROR",
        }
    }

    pub fn is_healthy(&self) -> bool {
        matches!(self, DomainStatus::Active)
    }

    /// Statuses that warrant an expiry alert.
    pub fn is_critical(&self) -> bool {
        matches!(self, DomainStatus::ExpiringSoon | DomainStatus::Expired)
    }

    /// Ordering used by reports: lower sorts first.
    pub fn severity_rank(&self) -> u8 {
        match self {
            DomainStatus::Expired => 0,
            DomainStatus::ExpiringSoon => 1,
            DomainStatus::Error => 2,
            DomainStatus::Active => 3,
        }
    }
}

impl std::fmt::Display for DomainStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DomainStatus {
    type Err = VigilError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ACTIVE" => Ok(DomainStatus::Active),
            "EXPIRING_SOON" => Ok(DomainStatus::ExpiringSoon),
            "EXPIRED" => Ok(DomainStatus::Expired),
            "ERROR" => Ok(DomainStatus::Error),
            other => Err(VigilError::Other(format!("unknown domain status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Telegram chat id; alerts and reports are only sent when present.
    pub chat_id: Option<String>,
    pub notifications_enabled: bool,
}

impl User {
    /// Chat id to notify, if this user wants notifications at all.
    pub fn notification_chat(&self) -> Option<&str> {
        if self.notifications_enabled {
            self.chat_id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredWebsite {
    pub id: WebsiteId,
    pub user_id: UserId,
    pub name: String,
    pub url: String,
    /// Minutes between checks.
    pub check_interval: i64,
    pub is_active: bool,
    pub notify_on_down: bool,
    pub notify_on_up: bool,
    pub ip_address: Option<String>,
    pub hosting: Option<String>,
    pub metadata_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredDomain {
    pub id: DomainId,
    pub user_id: UserId,
    pub name: String,
    /// Registrable name, already passed through `extract_domain`.
    pub domain: String,
    /// Minutes between checks.
    pub check_interval: i64,
    pub is_active: bool,
    pub notify_on_expiry: bool,
}

pub const DEFAULT_WEBSITE_INTERVAL: i64 = 5;
pub const DEFAULT_DOMAIN_INTERVAL: i64 = 1440;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWebsite {
    pub user_id: UserId,
    pub name: String,
    pub url: String,
    pub check_interval: i64,
    pub notify_on_down: bool,
    pub notify_on_up: bool,
}

impl NewWebsite {
    pub fn new(user_id: UserId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            url: url.into(),
            check_interval: DEFAULT_WEBSITE_INTERVAL,
            notify_on_down: true,
            notify_on_up: true,
        }
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.check_interval = minutes.max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDomain {
    pub user_id: UserId,
    pub name: String,
    pub domain: String,
    pub check_interval: i64,
    pub notify_on_expiry: bool,
}

impl NewDomain {
    pub fn new(user_id: UserId, name: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            user_id,
            name: name.into(),
            domain: domain.into(),
            check_interval: DEFAULT_DOMAIN_INTERVAL,
            notify_on_expiry: true,
        }
    }

    pub fn with_interval(mut self, minutes: i64) -> Self {
        self.check_interval = minutes.max(1);
        self
    }
}

/// Outcome of probing a website, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteCheckResult {
    pub status: WebsiteStatus,
    /// Milliseconds until the response head arrived; `None` on transport failure.
    pub response_time_ms: Option<i64>,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
    /// `None` for plain-HTTP targets.
    pub ssl_valid: Option<bool>,
    pub ssl_expires_at: Option<DateTime<Utc>>,
    pub ssl_issuer: Option<String>,
    pub ssl_days_left: Option<i64>,
}

/// Stored website check. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebsiteCheck {
    pub id: i64,
    pub website_id: WebsiteId,
    pub checked_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: WebsiteCheckResult,
}

/// Outcome of a registration lookup, before it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCheckResult {
    pub status: DomainStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
    pub name_servers: Vec<String>,
    pub days_left: Option<i64>,
    pub error_message: Option<String>,
}

impl DomainCheckResult {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: DomainStatus::Error,
            expires_at: None,
            registrar: None,
            name_servers: Vec::new(),
            days_left: None,
            error_message: Some(message.into()),
        }
    }
}

/// Stored domain check. Never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainCheck {
    pub id: i64,
    pub domain_id: DomainId,
    pub checked_at: DateTime<Utc>,
    #[serde(flatten)]
    pub result: DomainCheckResult,
}

/// An active website together with its owner and most recent check.
#[derive(Debug, Clone)]
pub struct WebsiteTarget {
    pub website: MonitoredWebsite,
    pub owner: User,
    pub latest: Option<WebsiteCheck>,
}

/// An active domain together with its owner and most recent check.
#[derive(Debug, Clone)]
pub struct DomainTarget {
    pub domain: MonitoredDomain,
    pub owner: User,
    pub latest: Option<DomainCheck>,
}
