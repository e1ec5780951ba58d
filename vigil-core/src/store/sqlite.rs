use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use super::Store;
use crate::error::{Result, VigilError};
use crate::models::{
    DomainCheck, DomainCheckResult, DomainId, DomainStatus, DomainTarget, MonitoredDomain,
    MonitoredWebsite, NewDomain, NewWebsite, User, UserId, WebsiteCheck, WebsiteCheckResult,
    WebsiteId, WebsiteStatus, WebsiteTarget,
};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        chat_id TEXT UNIQUE,
        notifications_enabled INTEGER NOT NULL DEFAULT 1
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS websites (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        url TEXT NOT NULL,
        check_interval INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        notify_on_down INTEGER NOT NULL DEFAULT 1,
        notify_on_up INTEGER NOT NULL DEFAULT 1,
        ip_address TEXT,
        hosting TEXT,
        metadata_refreshed_at TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS website_checks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        website_id INTEGER NOT NULL REFERENCES websites(id) ON DELETE CASCADE,
        checked_at TEXT NOT NULL,
        status TEXT NOT NULL,
        response_time_ms INTEGER,
        status_code INTEGER,
        error_message TEXT,
        ssl_valid INTEGER,
        ssl_expires_at TEXT,
        ssl_issuer TEXT,
        ssl_days_left INTEGER
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_website_checks_latest ON website_checks(website_id, checked_at DESC)",
    r#"
    CREATE TABLE IF NOT EXISTS domains (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        domain TEXT NOT NULL,
        check_interval INTEGER NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        notify_on_expiry INTEGER NOT NULL DEFAULT 1,
        UNIQUE(user_id, domain)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS domain_checks (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        domain_id INTEGER NOT NULL REFERENCES domains(id) ON DELETE CASCADE,
        checked_at TEXT NOT NULL,
        status TEXT NOT NULL,
        expires_at TEXT,
        registrar TEXT,
        name_servers TEXT NOT NULL DEFAULT '[]',
        days_left INTEGER,
        error_message TEXT
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_domain_checks_latest ON domain_checks(domain_id, checked_at DESC)",
];

const WEBSITE_COLUMNS: &str = "w.id, w.user_id, w.name, w.url, w.check_interval, w.is_active, \
     w.notify_on_down, w.notify_on_up, w.ip_address, w.hosting, w.metadata_refreshed_at";

const DOMAIN_COLUMNS: &str =
    "d.id, d.user_id, d.name, d.domain, d.check_interval, d.is_active, d.notify_on_expiry";

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    chat_id: Option<String>,
    notifications_enabled: bool,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            chat_id: row.chat_id,
            notifications_enabled: row.notifications_enabled,
        }
    }
}

#[derive(Debug, FromRow)]
struct WebsiteRow {
    id: i64,
    user_id: i64,
    name: String,
    url: String,
    check_interval: i64,
    is_active: bool,
    notify_on_down: bool,
    notify_on_up: bool,
    ip_address: Option<String>,
    hosting: Option<String>,
    metadata_refreshed_at: Option<DateTime<Utc>>,
}

impl From<WebsiteRow> for MonitoredWebsite {
    fn from(row: WebsiteRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            url: row.url,
            check_interval: row.check_interval,
            is_active: row.is_active,
            notify_on_down: row.notify_on_down,
            notify_on_up: row.notify_on_up,
            ip_address: row.ip_address,
            hosting: row.hosting,
            metadata_refreshed_at: row.metadata_refreshed_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct DomainRow {
    id: i64,
    user_id: i64,
    name: String,
    domain: String,
    check_interval: i64,
    is_active: bool,
    notify_on_expiry: bool,
}

impl From<DomainRow> for MonitoredDomain {
    fn from(row: DomainRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            domain: row.domain,
            check_interval: row.check_interval,
            is_active: row.is_active,
            notify_on_expiry: row.notify_on_expiry,
        }
    }
}

#[derive(Debug, FromRow)]
struct WebsiteCheckRow {
    id: i64,
    website_id: i64,
    checked_at: DateTime<Utc>,
    status: String,
    response_time_ms: Option<i64>,
    status_code: Option<i64>,
    error_message: Option<String>,
    ssl_valid: Option<bool>,
    ssl_expires_at: Option<DateTime<Utc>>,
    ssl_issuer: Option<String>,
    ssl_days_left: Option<i64>,
}

impl TryFrom<WebsiteCheckRow> for WebsiteCheck {
    type Error = VigilError;

    fn try_from(row: WebsiteCheckRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            website_id: row.website_id,
            checked_at: row.checked_at,
            result: WebsiteCheckResult {
                status: WebsiteStatus::from_str(&row.status)?,
                response_time_ms: row.response_time_ms,
                status_code: row.status_code.and_then(|c| u16::try_from(c).ok()),
                error_message: row.error_message,
                ssl_valid: row.ssl_valid,
                ssl_expires_at: row.ssl_expires_at,
                ssl_issuer: row.ssl_issuer,
                ssl_days_left: row.ssl_days_left,
            },
        })
    }
}

#[derive(Debug, FromRow)]
struct DomainCheckRow {
    id: i64,
    domain_id: i64,
    checked_at: DateTime<Utc>,
    status: String,
    expires_at: Option<DateTime<Utc>>,
    registrar: Option<String>,
    name_servers: String,
    days_left: Option<i64>,
    error_message: Option<String>,
}

impl TryFrom<DomainCheckRow> for DomainCheck {
    type Error = VigilError;

    fn try_from(row: DomainCheckRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            domain_id: row.domain_id,
            checked_at: row.checked_at,
            result: DomainCheckResult {
                status: DomainStatus::from_str(&row.status)?,
                expires_at: row.expires_at,
                registrar: row.registrar,
                name_servers: serde_json::from_str(&row.name_servers)?,
                days_left: row.days_left,
                error_message: row.error_message,
            },
        })
    }
}

/// SQLite-backed store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the file if needed) and bring the schema up to date.
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` is a separate database.
        let pool = if url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(8)
                .connect_with(options)
                .await?
        };

        let store = Self { pool };
        store.migrate().await?;
        info!(url = %url, "Database ready");
        Ok(store)
    }

    /// Fresh private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    async fn migrate(&self) -> Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn owner(&self, user_id: UserId) -> Result<User> {
        self.find_user(user_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("user {}", user_id)))
    }

    async fn website_targets(&self, rows: Vec<WebsiteRow>) -> Result<Vec<WebsiteTarget>> {
        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            let website = MonitoredWebsite::from(row);
            targets.push(WebsiteTarget {
                owner: self.owner(website.user_id).await?,
                latest: self.latest_website_check(website.id).await?,
                website,
            });
        }
        Ok(targets)
    }

    async fn domain_targets(&self, rows: Vec<DomainRow>) -> Result<Vec<DomainTarget>> {
        let mut targets = Vec::with_capacity(rows.len());
        for row in rows {
            let domain = MonitoredDomain::from(row);
            targets.push(DomainTarget {
                owner: self.owner(domain.user_id).await?,
                latest: self.latest_domain_check(domain.id).await?,
                domain,
            });
        }
        Ok(targets)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_user(&self, chat_id: Option<&str>) -> Result<User> {
        let id = sqlx::query("INSERT INTO users (chat_id, notifications_enabled) VALUES (?, 1)")
            .bind(chat_id)
            .execute(&self.pool)
            .await?
            .last_insert_rowid();
        Ok(User {
            id,
            chat_id: chat_id.map(str::to_string),
            notifications_enabled: true,
        })
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, chat_id, notifications_enabled FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_chat(&self, chat_id: &str) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(
            "SELECT id, chat_id, notifications_enabled FROM users WHERE chat_id = ?",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(User::from))
    }

    async fn report_recipients(&self) -> Result<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(
            "SELECT id, chat_id, notifications_enabled FROM users \
             WHERE chat_id IS NOT NULL AND notifications_enabled = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(User::from).collect())
    }

    async fn create_website(&self, website: NewWebsite) -> Result<MonitoredWebsite> {
        self.owner(website.user_id).await?;
        let id = sqlx::query(
            "INSERT INTO websites (user_id, name, url, check_interval, notify_on_down, notify_on_up) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(website.user_id)
        .bind(&website.name)
        .bind(&website.url)
        .bind(website.check_interval)
        .bind(website.notify_on_down)
        .bind(website.notify_on_up)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        debug!(website_id = id, url = %website.url, "Website created");

        Ok(MonitoredWebsite {
            id,
            user_id: website.user_id,
            name: website.name,
            url: website.url,
            check_interval: website.check_interval,
            is_active: true,
            notify_on_down: website.notify_on_down,
            notify_on_up: website.notify_on_up,
            ip_address: None,
            hosting: None,
            metadata_refreshed_at: None,
        })
    }

    async fn find_website(&self, id: WebsiteId) -> Result<Option<MonitoredWebsite>> {
        let row = sqlx::query_as::<_, WebsiteRow>(&format!(
            "SELECT {} FROM websites w WHERE w.id = ?",
            WEBSITE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MonitoredWebsite::from))
    }

    async fn delete_website(&self, id: WebsiteId) -> Result<bool> {
        let affected = sqlx::query("DELETE FROM websites WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(affected > 0)
    }

    async fn active_websites(&self) -> Result<Vec<WebsiteTarget>> {
        let rows = sqlx::query_as::<_, WebsiteRow>(&format!(
            "SELECT {} FROM websites w WHERE w.is_active = 1 ORDER BY w.id",
            WEBSITE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.website_targets(rows).await
    }

    async fn websites_for_user(&self, user_id: UserId) -> Result<Vec<WebsiteTarget>> {
        let rows = sqlx::query_as::<_, WebsiteRow>(&format!(
            "SELECT {} FROM websites w WHERE w.user_id = ? ORDER BY w.id",
            WEBSITE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.website_targets(rows).await
    }

    async fn latest_website_check(&self, id: WebsiteId) -> Result<Option<WebsiteCheck>> {
        Ok(self.website_history(id, 1).await?.into_iter().next())
    }

    async fn insert_website_check(
        &self,
        id: WebsiteId,
        checked_at: DateTime<Utc>,
        result: &WebsiteCheckResult,
    ) -> Result<WebsiteCheck> {
        let check_id = sqlx::query(
            "INSERT INTO website_checks (website_id, checked_at, status, response_time_ms, \
             status_code, error_message, ssl_valid, ssl_expires_at, ssl_issuer, ssl_days_left) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(checked_at)
        .bind(result.status.as_str())
        .bind(result.response_time_ms)
        .bind(result.status_code.map(i64::from))
        .bind(&result.error_message)
        .bind(result.ssl_valid)
        .bind(result.ssl_expires_at)
        .bind(&result.ssl_issuer)
        .bind(result.ssl_days_left)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(WebsiteCheck {
            id: check_id,
            website_id: id,
            checked_at,
            result: result.clone(),
        })
    }

    async fn website_history(&self, id: WebsiteId, limit: usize) -> Result<Vec<WebsiteCheck>> {
        let rows = sqlx::query_as::<_, WebsiteCheckRow>(
            "SELECT * FROM website_checks WHERE website_id = ? \
             ORDER BY checked_at DESC, id DESC LIMIT ?",
        )
        .bind(id)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(WebsiteCheck::try_from).collect()
    }

    async fn update_website_metadata(
        &self,
        id: WebsiteId,
        ip_address: Option<String>,
        hosting: Option<String>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<()> {
        let affected = sqlx::query(
            "UPDATE websites SET ip_address = ?, hosting = ?, metadata_refreshed_at = ? WHERE id = ?",
        )
        .bind(ip_address)
        .bind(hosting)
        .bind(refreshed_at)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if affected == 0 {
            return Err(VigilError::NotFound(format!("website {}", id)));
        }
        Ok(())
    }

    async fn create_domain(&self, domain: NewDomain) -> Result<MonitoredDomain> {
        self.owner(domain.user_id).await?;
        let id = sqlx::query(
            "INSERT INTO domains (user_id, name, domain, check_interval, notify_on_expiry) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(domain.user_id)
        .bind(&domain.name)
        .bind(&domain.domain)
        .bind(domain.check_interval)
        .bind(domain.notify_on_expiry)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        debug!(domain_id = id, domain = %domain.domain, "Domain created");

        Ok(MonitoredDomain {
            id,
            user_id: domain.user_id,
            name: domain.name,
            domain: domain.domain,
            check_interval: domain.check_interval,
            is_active: true,
            notify_on_expiry: domain.notify_on_expiry,
        })
    }

    async fn find_domain_by_name(
        &self,
        user_id: UserId,
        domain: &str,
    ) -> Result<Option<MonitoredDomain>> {
        let row = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {} FROM domains d WHERE d.user_id = ? AND d.domain = ?",
            DOMAIN_COLUMNS
        ))
        .bind(user_id)
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(MonitoredDomain::from))
    }

    async fn active_domains(&self) -> Result<Vec<DomainTarget>> {
        let rows = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {} FROM domains d WHERE d.is_active = 1 ORDER BY d.id",
            DOMAIN_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;
        self.domain_targets(rows).await
    }

    async fn domains_for_user(&self, user_id: UserId) -> Result<Vec<DomainTarget>> {
        let rows = sqlx::query_as::<_, DomainRow>(&format!(
            "SELECT {} FROM domains d WHERE d.user_id = ? ORDER BY d.id",
            DOMAIN_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.domain_targets(rows).await
    }

    async fn latest_domain_check(&self, id: DomainId) -> Result<Option<DomainCheck>> {
        let row = sqlx::query_as::<_, DomainCheckRow>(
            "SELECT * FROM domain_checks WHERE domain_id = ? \
             ORDER BY checked_at DESC, id DESC LIMIT 1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(DomainCheck::try_from).transpose()
    }

    async fn insert_domain_check(
        &self,
        id: DomainId,
        checked_at: DateTime<Utc>,
        result: &DomainCheckResult,
    ) -> Result<DomainCheck> {
        let name_servers = serde_json::to_string(&result.name_servers)?;
        let check_id = sqlx::query(
            "INSERT INTO domain_checks (domain_id, checked_at, status, expires_at, registrar, \
             name_servers, days_left, error_message) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(checked_at)
        .bind(result.status.as_str())
        .bind(result.expires_at)
        .bind(&result.registrar)
        .bind(name_servers)
        .bind(result.days_left)
        .bind(&result.error_message)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        Ok(DomainCheck {
            id: check_id,
            domain_id: id,
            checked_at,
            result: result.clone(),
        })
    }

    async fn prune_domain_checks(&self, id: DomainId, keep: usize) -> Result<u64> {
        let deleted = sqlx::query(
            "DELETE FROM domain_checks WHERE domain_id = ? AND id NOT IN ( \
                SELECT id FROM domain_checks WHERE domain_id = ? \
                ORDER BY checked_at DESC, id DESC LIMIT ? \
             )",
        )
        .bind(id)
        .bind(id)
        .bind(i64::try_from(keep).unwrap_or(i64::MAX))
        .execute(&self.pool)
        .await?
        .rows_affected();

        if deleted > 0 {
            debug!(domain_id = id, deleted, "Pruned domain check history");
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[tokio::test]
    async fn test_in_memory_connection() {
        let store = SqliteStore::in_memory().await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT 1").fetch_one(&store.pool).await.unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn test_migrate_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store.migrate().await.unwrap();
    }

    #[tokio::test]
    async fn test_users_and_recipients() {
        contract::users_and_recipients(&SqliteStore::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        contract::latest_and_history(&SqliteStore::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_metadata_and_delete() {
        contract::metadata_and_delete(&SqliteStore::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_domain_retention() {
        contract::domain_retention(&SqliteStore::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_ordering_by_timestamp() {
        contract::ordering_by_timestamp(&SqliteStore::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn test_duplicate_domain_per_user_rejected() {
        let store = SqliteStore::in_memory().await.unwrap();
        let user = store.create_user(Some("1")).await.unwrap();
        store
            .create_domain(NewDomain::new(user.id, "a", "example.org"))
            .await
            .unwrap();
        let again = store
            .create_domain(NewDomain::new(user.id, "b", "example.org"))
            .await;
        assert!(matches!(again, Err(VigilError::Database(_))));
    }
}
