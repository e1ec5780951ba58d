use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::Store;
use crate::error::{Result, VigilError};
use crate::models::{
    DomainCheck, DomainCheckResult, DomainId, DomainTarget, MonitoredDomain, MonitoredWebsite,
    NewDomain, NewWebsite, User, UserId, WebsiteCheck, WebsiteCheckResult, WebsiteId,
    WebsiteTarget,
};

#[derive(Debug, Default)]
struct Inner {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    websites: BTreeMap<WebsiteId, MonitoredWebsite>,
    domains: BTreeMap<DomainId, MonitoredDomain>,
    website_checks: Vec<WebsiteCheck>,
    domain_checks: Vec<DomainCheck>,
}

impl Inner {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn latest_website(&self, id: WebsiteId) -> Option<WebsiteCheck> {
        self.website_checks
            .iter()
            .filter(|c| c.website_id == id)
            .max_by_key(|c| (c.checked_at, c.id))
            .cloned()
    }

    fn latest_domain(&self, id: DomainId) -> Option<DomainCheck> {
        self.domain_checks
            .iter()
            .filter(|c| c.domain_id == id)
            .max_by_key(|c| (c.checked_at, c.id))
            .cloned()
    }

    fn owner(&self, user_id: UserId) -> Result<User> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| VigilError::NotFound(format!("user {}", user_id)))
    }

    fn website_targets<'a>(
        &self,
        websites: impl Iterator<Item = &'a MonitoredWebsite>,
    ) -> Result<Vec<WebsiteTarget>> {
        websites
            .map(|w| {
                Ok(WebsiteTarget {
                    owner: self.owner(w.user_id)?,
                    latest: self.latest_website(w.id),
                    website: w.clone(),
                })
            })
            .collect()
    }

    fn domain_targets<'a>(
        &self,
        domains: impl Iterator<Item = &'a MonitoredDomain>,
    ) -> Result<Vec<DomainTarget>> {
        domains
            .map(|d| {
                Ok(DomainTarget {
                    owner: self.owner(d.user_id)?,
                    latest: self.latest_domain(d.id),
                    domain: d.clone(),
                })
            })
            .collect()
    }
}

/// In-process store; contents are lost on exit.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, chat_id: Option<&str>) -> Result<User> {
        let mut inner = self.inner.write().await;
        let user = User {
            id: inner.next_id(),
            chat_id: chat_id.map(str::to_string),
            notifications_enabled: true,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_chat(&self, chat_id: &str) -> Result<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.chat_id.as_deref() == Some(chat_id))
            .cloned())
    }

    async fn report_recipients(&self) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .filter(|u| u.notification_chat().is_some())
            .cloned()
            .collect())
    }

    async fn create_website(&self, website: NewWebsite) -> Result<MonitoredWebsite> {
        let mut inner = self.inner.write().await;
        inner.owner(website.user_id)?;
        let created = MonitoredWebsite {
            id: inner.next_id(),
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
        };
        inner.websites.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_website(&self, id: WebsiteId) -> Result<Option<MonitoredWebsite>> {
        Ok(self.inner.read().await.websites.get(&id).cloned())
    }

    async fn delete_website(&self, id: WebsiteId) -> Result<bool> {
        let mut inner = self.inner.write().await;
        let removed = inner.websites.remove(&id).is_some();
        inner.website_checks.retain(|c| c.website_id != id);
        Ok(removed)
    }

    async fn active_websites(&self) -> Result<Vec<WebsiteTarget>> {
        let inner = self.inner.read().await;
        inner.website_targets(inner.websites.values().filter(|w| w.is_active))
    }

    async fn websites_for_user(&self, user_id: UserId) -> Result<Vec<WebsiteTarget>> {
        let inner = self.inner.read().await;
        inner.website_targets(inner.websites.values().filter(|w| w.user_id == user_id))
    }

    async fn latest_website_check(&self, id: WebsiteId) -> Result<Option<WebsiteCheck>> {
        Ok(self.inner.read().await.latest_website(id))
    }

    async fn insert_website_check(
        &self,
        id: WebsiteId,
        checked_at: DateTime<Utc>,
        result: &WebsiteCheckResult,
    ) -> Result<WebsiteCheck> {
        let mut inner = self.inner.write().await;
        if !inner.websites.contains_key(&id) {
            return Err(VigilError::NotFound(format!("website {}", id)));
        }
        let check = WebsiteCheck {
            id: inner.next_id(),
            website_id: id,
            checked_at,
            result: result.clone(),
        };
        inner.website_checks.push(check.clone());
        Ok(check)
    }

    async fn website_history(&self, id: WebsiteId, limit: usize) -> Result<Vec<WebsiteCheck>> {
        let inner = self.inner.read().await;
        let mut checks: Vec<_> = inner
            .website_checks
            .iter()
            .filter(|c| c.website_id == id)
            .cloned()
            .collect();
        checks.sort_by_key(|c| std::cmp::Reverse((c.checked_at, c.id)));
        checks.truncate(limit);
        Ok(checks)
    }

    async fn update_website_metadata(
        &self,
        id: WebsiteId,
        ip_address: Option<String>,
        hosting: Option<String>,
        refreshed_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let website = inner
            .websites
            .get_mut(&id)
            .ok_or_else(|| VigilError::NotFound(format!("website {}", id)))?;
        website.ip_address = ip_address;
        website.hosting = hosting;
        website.metadata_refreshed_at = Some(refreshed_at);
        Ok(())
    }

    async fn create_domain(&self, domain: NewDomain) -> Result<MonitoredDomain> {
        let mut inner = self.inner.write().await;
        inner.owner(domain.user_id)?;
        let created = MonitoredDomain {
            id: inner.next_id(),
            user_id: domain.user_id,
            name: domain.name,
            domain: domain.domain,
            check_interval: domain.check_interval,
            is_active: true,
            notify_on_expiry: domain.notify_on_expiry,
        };
        inner.domains.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_domain_by_name(
        &self,
        user_id: UserId,
        domain: &str,
    ) -> Result<Option<MonitoredDomain>> {
        let inner = self.inner.read().await;
        Ok(inner
            .domains
            .values()
            .find(|d| d.user_id == user_id && d.domain == domain)
            .cloned())
    }

    async fn active_domains(&self) -> Result<Vec<DomainTarget>> {
        let inner = self.inner.read().await;
        inner.domain_targets(inner.domains.values().filter(|d| d.is_active))
    }

    async fn domains_for_user(&self, user_id: UserId) -> Result<Vec<DomainTarget>> {
        let inner = self.inner.read().await;
        inner.domain_targets(inner.domains.values().filter(|d| d.user_id == user_id))
    }

    async fn latest_domain_check(&self, id: DomainId) -> Result<Option<DomainCheck>> {
        Ok(self.inner.read().await.latest_domain(id))
    }

    async fn insert_domain_check(
        &self,
        id: DomainId,
        checked_at: DateTime<Utc>,
        result: &DomainCheckResult,
    ) -> Result<DomainCheck> {
        let mut inner = self.inner.write().await;
        if !inner.domains.contains_key(&id) {
            return Err(VigilError::NotFound(format!("domain {}", id)));
        }
        let check = DomainCheck {
            id: inner.next_id(),
            domain_id: id,
            checked_at,
            result: result.clone(),
        };
        inner.domain_checks.push(check.clone());
        Ok(check)
    }

    async fn prune_domain_checks(&self, id: DomainId, keep: usize) -> Result<u64> {
        let mut inner = self.inner.write().await;
        let mut ranked: Vec<_> = inner
            .domain_checks
            .iter()
            .filter(|c| c.domain_id == id)
            .map(|c| (c.checked_at, c.id))
            .collect();
        if ranked.len() <= keep {
            return Ok(0);
        }
        ranked.sort_by(|a, b| b.cmp(a));
        let doomed: Vec<i64> = ranked[keep..].iter().map(|(_, check_id)| *check_id).collect();

        let before = inner.domain_checks.len();
        inner
            .domain_checks
            .retain(|c| c.domain_id != id || !doomed.contains(&c.id));
        Ok((before - inner.domain_checks.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::super::contract;
    use super::*;

    #[tokio::test]
    async fn test_users_and_recipients() {
        contract::users_and_recipients(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_latest_and_history() {
        contract::latest_and_history(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_metadata_and_delete() {
        contract::metadata_and_delete(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_domain_retention() {
        contract::domain_retention(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_ordering_by_timestamp() {
        contract::ordering_by_timestamp(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn test_check_for_unknown_target_rejected() {
        let store = MemoryStore::new();
        let result = store
            .insert_website_check(
                99,
                contract::t(0),
                &contract::website_result(crate::models::WebsiteStatus::Online),
            )
            .await;
        assert!(matches!(result, Err(VigilError::NotFound(_))));
    }
}
