//! Persistence of users, monitored targets and their check history.

mod memory;
mod sqlite;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::{
    DomainCheck, DomainCheckResult, DomainId, DomainTarget, MonitoredDomain, MonitoredWebsite,
    NewDomain, NewWebsite, User, UserId, WebsiteCheck, WebsiteCheckResult, WebsiteId,
    WebsiteTarget,
};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Storage backend used by the monitor, reports and the CLI.
///
/// "Latest" always means most recent by `checked_at`, ties broken by
/// insertion order.
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_user(&self, chat_id: Option<&str>) -> Result<User>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;
    async fn find_user_by_chat(&self, chat_id: &str) -> Result<Option<User>>;
    /// Users with a chat id and notifications switched on.
    async fn report_recipients(&self) -> Result<Vec<User>>;

    async fn create_website(&self, website: NewWebsite) -> Result<MonitoredWebsite>;
    async fn find_website(&self, id: WebsiteId) -> Result<Option<MonitoredWebsite>>;
    /// Removes the website together with its check history.
    async fn delete_website(&self, id: WebsiteId) -> Result<bool>;
    async fn active_websites(&self) -> Result<Vec<WebsiteTarget>>;
    async fn websites_for_user(&self, user_id: UserId) -> Result<Vec<WebsiteTarget>>;
    async fn latest_website_check(&self, id: WebsiteId) -> Result<Option<WebsiteCheck>>;
    async fn insert_website_check(
        &self,
        id: WebsiteId,
        checked_at: DateTime<Utc>,
        result: &WebsiteCheckResult,
    ) -> Result<WebsiteCheck>;
    /// Newest first.
    async fn website_history(&self, id: WebsiteId, limit: usize) -> Result<Vec<WebsiteCheck>>;
    async fn update_website_metadata(
        &self,
        id: WebsiteId,
        ip_address: Option<String>,
        hosting: Option<String>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<()>;

    async fn create_domain(&self, domain: NewDomain) -> Result<MonitoredDomain>;
    async fn find_domain_by_name(
        &self,
        user_id: UserId,
        domain: &str,
    ) -> Result<Option<MonitoredDomain>>;
    async fn active_domains(&self) -> Result<Vec<DomainTarget>>;
    async fn domains_for_user(&self, user_id: UserId) -> Result<Vec<DomainTarget>>;
    async fn latest_domain_check(&self, id: DomainId) -> Result<Option<DomainCheck>>;
    async fn insert_domain_check(
        &self,
        id: DomainId,
        checked_at: DateTime<Utc>,
        result: &DomainCheckResult,
    ) -> Result<DomainCheck>;
    /// Keep only the `keep` most recent checks of a domain; returns how many
    /// were deleted.
    async fn prune_domain_checks(&self, id: DomainId, keep: usize) -> Result<u64>;
}

/// Open the backend named by `url`: `memory` for a throwaway in-process
/// store, anything else is handed to sqlx as a SQLite URL.
pub async fn open_store(url: &str) -> Result<Arc<dyn Store>> {
    if url == "memory" {
        Ok(Arc::new(MemoryStore::new()))
    } else {
        Ok(Arc::new(SqliteStore::connect(url).await?))
    }
}
