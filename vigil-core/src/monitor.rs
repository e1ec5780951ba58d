//! Check cycles: pick due targets, probe them, record, alert.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, error, info, instrument, warn};

use crate::alerts::{self, Alert, ReminderPolicy};
use crate::config::Config;
use crate::domain::DomainProbe;
use crate::error::{Result, VigilError};
use crate::models::{
    DomainCheck, DomainTarget, MonitoredDomain, MonitoredWebsite, NewDomain, NewWebsite,
    WebsiteCheck, WebsiteId, WebsiteTarget,
};
use crate::netinfo::{host_of, HostLookup};
use crate::notify::Notifier;
use crate::status::WebsiteProbe;
use crate::store::Store;
use crate::validation::{extract_domain, is_valid_domain, normalize_domain};

/// Whether a target last checked at `last_checked` should be probed at `now`.
/// Never-checked targets are always due.
pub fn is_due(last_checked: Option<DateTime<Utc>>, interval_minutes: i64, now: DateTime<Utc>) -> bool {
    match last_checked {
        None => true,
        Some(at) => (now - at).num_minutes() >= interval_minutes,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitorSettings {
    pub domain_check_retention: usize,
    pub reminder: ReminderPolicy,
    pub metadata_max_age: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            domain_check_retention: 50,
            reminder: ReminderPolicy::default(),
            metadata_max_age: Duration::hours(24),
        }
    }
}

impl From<&Config> for MonitorSettings {
    fn from(config: &Config) -> Self {
        let defaults = Self::default();
        Self {
            domain_check_retention: config.domain_check_retention,
            reminder: ReminderPolicy {
                within_days: config.expiry_warning_days,
                interval: Duration::try_days(config.reminder_interval_days)
                    .unwrap_or(defaults.reminder.interval),
            },
            metadata_max_age: Duration::try_hours(config.metadata_refresh_hours)
                .unwrap_or(defaults.metadata_max_age),
        }
    }
}

/// Counters for one pass over a target type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub targets: usize,
    pub checked: usize,
    pub failed: usize,
    pub alerts: usize,
}

pub struct Monitor {
    store: Arc<dyn Store>,
    websites: Arc<dyn WebsiteProbe>,
    domains: Arc<dyn DomainProbe>,
    notifier: Arc<dyn Notifier>,
    hosts: Option<Arc<dyn HostLookup>>,
    settings: MonitorSettings,
}

impl Monitor {
    pub fn new(
        store: Arc<dyn Store>,
        websites: Arc<dyn WebsiteProbe>,
        domains: Arc<dyn DomainProbe>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            websites,
            domains,
            notifier,
            hosts: None,
            settings: MonitorSettings::default(),
        }
    }

    pub fn with_host_lookup(mut self, hosts: Arc<dyn HostLookup>) -> Self {
        self.hosts = Some(hosts);
        self
    }

    pub fn with_settings(mut self, settings: MonitorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub async fn run_website_cycle(&self) -> Result<CycleSummary> {
        self.run_website_cycle_at(Utc::now()).await
    }

    /// One pass over every active website. Targets are handled one after
    /// another; a failing target is logged and skipped.
    #[instrument(skip(self))]
    pub async fn run_website_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let targets = self.store.active_websites().await?;
        let mut summary = CycleSummary {
            targets: targets.len(),
            ..Default::default()
        };

        for target in &targets {
            let last = target.latest.as_ref().map(|c| c.checked_at);
            if !is_due(last, target.website.check_interval, now) {
                continue;
            }
            match self.process_website(target, now).await {
                Ok((_, alerted)) => {
                    summary.checked += 1;
                    summary.alerts += usize::from(alerted);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(website_id = target.website.id, error = %e, "Website check failed");
                }
            }
        }

        info!(
            targets = summary.targets,
            checked = summary.checked,
            failed = summary.failed,
            alerts = summary.alerts,
            "Website cycle finished"
        );
        Ok(summary)
    }

    pub async fn run_domain_cycle(&self) -> Result<CycleSummary> {
        self.run_domain_cycle_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn run_domain_cycle_at(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let targets = self.store.active_domains().await?;
        let mut summary = CycleSummary {
            targets: targets.len(),
            ..Default::default()
        };

        for target in &targets {
            let last = target.latest.as_ref().map(|c| c.checked_at);
            if !is_due(last, target.domain.check_interval, now) {
                continue;
            }
            match self.process_domain(target, now).await {
                Ok((_, alerted)) => {
                    summary.checked += 1;
                    summary.alerts += usize::from(alerted);
                }
                Err(e) => {
                    summary.failed += 1;
                    error!(domain_id = target.domain.id, error = %e, "Domain check failed");
                }
            }
        }

        info!(
            targets = summary.targets,
            checked = summary.checked,
            failed = summary.failed,
            alerts = summary.alerts,
            "Domain cycle finished"
        );
        Ok(summary)
    }

    async fn process_website(
        &self,
        target: &WebsiteTarget,
        now: DateTime<Utc>,
    ) -> Result<(WebsiteCheck, bool)> {
        let website = &target.website;
        let result = self.websites.check(&website.url).await;
        let check = self.store.insert_website_check(website.id, now, &result).await?;
        info!(
            website_id = website.id,
            status = %check.result.status,
            response_ms = ?check.result.response_time_ms,
            "Website checked"
        );

        let alert = alerts::website_alert(website, &target.owner, target.latest.as_ref(), &check);
        let alerted = match alert {
            Some(alert) => self.deliver(alert).await,
            None => false,
        };

        self.refresh_metadata(website, now).await;
        Ok((check, alerted))
    }

    async fn process_domain(
        &self,
        target: &DomainTarget,
        now: DateTime<Utc>,
    ) -> Result<(DomainCheck, bool)> {
        let domain = &target.domain;
        let result = self.domains.check(&domain.domain).await;
        let check = self.store.insert_domain_check(domain.id, now, &result).await?;
        info!(
            domain_id = domain.id,
            status = %check.result.status,
            days_left = ?check.result.days_left,
            "Domain checked"
        );

        if let Err(e) = self
            .store
            .prune_domain_checks(domain.id, self.settings.domain_check_retention)
            .await
        {
            warn!(domain_id = domain.id, error = %e, "Pruning domain history failed");
        }

        let alert = alerts::domain_alert(
            domain,
            &target.owner,
            target.latest.as_ref(),
            &check,
            self.settings.reminder,
        );
        let alerted = match alert {
            Some(alert) => self.deliver(alert).await,
            None => false,
        };
        Ok((check, alerted))
    }

    async fn deliver(&self, alert: Alert) -> bool {
        match self.notifier.send_message(&alert.chat_id, &alert.text).await {
            Ok(()) => true,
            Err(e) => {
                warn!(chat_id = %alert.chat_id, error = %e, "Alert delivery failed");
                false
            }
        }
    }

    async fn refresh_metadata(&self, website: &MonitoredWebsite, now: DateTime<Utc>) {
        let Some(hosts) = &self.hosts else {
            return;
        };
        let fresh = website.ip_address.is_some()
            && website
                .metadata_refreshed_at
                .is_some_and(|at| now - at < self.settings.metadata_max_age);
        if fresh {
            return;
        }

        let (ip, hosting) = match lookup_metadata(hosts.as_ref(), &website.url).await {
            Ok(found) => found,
            Err(e) => {
                warn!(website_id = website.id, error = %e, "Metadata lookup failed");
                return;
            }
        };
        debug!(website_id = website.id, %ip, hosting = ?hosting, "Metadata refreshed");

        if let Err(e) = self
            .store
            .update_website_metadata(website.id, Some(ip.to_string()), hosting, now)
            .await
        {
            warn!(website_id = website.id, error = %e, "Storing metadata failed");
        }
    }

    /// Check one website right away, outside the interval gate.
    pub async fn check_website_now(&self, id: WebsiteId) -> Result<WebsiteCheck> {
        let website = self
            .store
            .find_website(id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("website {}", id)))?;
        let owner = self
            .store
            .find_user(website.user_id)
            .await?
            .ok_or_else(|| VigilError::NotFound(format!("user {}", website.user_id)))?;
        let latest = self.store.latest_website_check(id).await?;

        let target = WebsiteTarget {
            website,
            owner,
            latest,
        };
        let (check, _) = self.process_website(&target, Utc::now()).await?;
        Ok(check)
    }

    /// Register a website and, when its host is a registrable name not yet
    /// tracked by the same user, start tracking that domain too. Problems with
    /// the derived domain never fail the registration.
    pub async fn add_website(
        &self,
        website: NewWebsite,
    ) -> Result<(MonitoredWebsite, Option<MonitoredDomain>)> {
        let website = self.store.create_website(website).await?;
        info!(website_id = website.id, url = %website.url, "Website registered");

        let domain = match self.track_domain_of(&website).await {
            Ok(domain) => domain,
            Err(e) => {
                warn!(website_id = website.id, error = %e, "Could not derive domain for website");
                None
            }
        };
        Ok((website, domain))
    }

    async fn track_domain_of(&self, website: &MonitoredWebsite) -> Result<Option<MonitoredDomain>> {
        let name = extract_domain(&website.url);
        if name.parse::<IpAddr>().is_ok() || !is_valid_domain(&name) {
            debug!(host = %name, "Website host is not a registrable domain");
            return Ok(None);
        }
        if self
            .store
            .find_domain_by_name(website.user_id, &name)
            .await?
            .is_some()
        {
            return Ok(None);
        }

        let domain = self
            .store
            .create_domain(NewDomain::new(website.user_id, name.clone(), name))
            .await?;
        let result = self.domains.check(&domain.domain).await;
        self.store
            .insert_domain_check(domain.id, Utc::now(), &result)
            .await?;
        info!(domain_id = domain.id, domain = %domain.domain, "Domain derived from website");
        Ok(Some(domain))
    }

    /// Register a domain explicitly; the name is normalized first.
    pub async fn add_domain(&self, mut domain: NewDomain) -> Result<MonitoredDomain> {
        domain.domain = normalize_domain(&domain.domain)?;
        if let Some(existing) = self
            .store
            .find_domain_by_name(domain.user_id, &domain.domain)
            .await?
        {
            return Ok(existing);
        }
        self.store.create_domain(domain).await
    }
}

async fn lookup_metadata(hosts: &dyn HostLookup, url: &str) -> Result<(IpAddr, Option<String>)> {
    let host = host_of(url)?;
    let ip = hosts.resolve(&host).await?;
    let hosting = match hosts.lookup_org(ip).await {
        Ok(org) => org,
        Err(e) => {
            debug!(%ip, error = %e, "Organization lookup failed");
            None
        }
    };
    Ok((ip, hosting))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;

    use super::*;
    use crate::models::{DomainCheckResult, DomainStatus, WebsiteCheckResult, WebsiteStatus};
    use crate::notify::testing::RecordingNotifier;
    use crate::store::MemoryStore;

    struct StubWebsiteProbe {
        status: Mutex<WebsiteStatus>,
        calls: AtomicUsize,
    }

    impl StubWebsiteProbe {
        fn new(status: WebsiteStatus) -> Self {
            Self {
                status: Mutex::new(status),
                calls: AtomicUsize::new(0),
            }
        }

        fn set(&self, status: WebsiteStatus) {
            *self.status.lock().unwrap() = status;
        }
    }

    #[async_trait]
    impl WebsiteProbe for StubWebsiteProbe {
        async fn check(&self, _url: &str) -> WebsiteCheckResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let status = *self.status.lock().unwrap();
            WebsiteCheckResult {
                status,
                response_time_ms: Some(25),
                status_code: Some(if status == WebsiteStatus::Online { 200 } else { 503 }),
                error_message: (status != WebsiteStatus::Online).then(|| "HTTP 503".to_string()),
                ssl_valid: None,
                ssl_expires_at: None,
                ssl_issuer: None,
                ssl_days_left: None,
            }
        }
    }

    struct StubDomainProbe {
        result: Mutex<DomainCheckResult>,
        calls: AtomicUsize,
    }

    impl StubDomainProbe {
        fn new(status: DomainStatus, days_left: Option<i64>) -> Self {
            Self {
                result: Mutex::new(DomainCheckResult {
                    status,
                    expires_at: None,
                    registrar: Some("Registrar".to_string()),
                    name_servers: vec!["ns1.example.net".to_string()],
                    days_left,
                    error_message: None,
                }),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DomainProbe for StubDomainProbe {
        async fn check(&self, _domain: &str) -> DomainCheckResult {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.lock().unwrap().clone()
        }
    }

    #[derive(Default)]
    struct StubHosts {
        lookups: AtomicUsize,
    }

    #[async_trait]
    impl HostLookup for StubHosts {
        async fn resolve(&self, _host: &str) -> Result<IpAddr> {
            self.lookups.fetch_add(1, Ordering::SeqCst);
            Ok("192.0.2.10".parse().unwrap())
        }

        async fn lookup_org(&self, _ip: IpAddr) -> Result<Option<String>> {
            Ok(Some("Example Hosting".to_string()))
        }
    }

    struct Fixture {
        store: Arc<MemoryStore>,
        websites: Arc<StubWebsiteProbe>,
        domains: Arc<StubDomainProbe>,
        notifier: Arc<RecordingNotifier>,
        monitor: Monitor,
    }

    fn fixture_with(notifier: RecordingNotifier, settings: MonitorSettings) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let websites = Arc::new(StubWebsiteProbe::new(WebsiteStatus::Online));
        let domains = Arc::new(StubDomainProbe::new(DomainStatus::Active, Some(200)));
        let notifier = Arc::new(notifier);
        let monitor = Monitor::new(
            store.clone(),
            websites.clone(),
            domains.clone(),
            notifier.clone(),
        )
        .with_settings(settings);
        Fixture {
            store,
            websites,
            domains,
            notifier,
            monitor,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(RecordingNotifier::default(), MonitorSettings::default())
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn test_is_due() {
        assert!(is_due(None, 5, t0()));
        assert!(!is_due(Some(t0()), 5, t0()));
        assert!(!is_due(Some(t0()), 5, t0() + Duration::seconds(299)));
        assert!(is_due(Some(t0()), 5, t0() + Duration::minutes(5)));
        assert!(is_due(Some(t0()), 1440, t0() + Duration::days(2)));
    }

    #[test]
    fn test_settings_fall_back_on_unrepresentable_durations() {
        let config = Config {
            reminder_interval_days: i64::MAX,
            metadata_refresh_hours: i64::MAX,
            ..Config::default()
        };
        let settings = MonitorSettings::from(&config);
        assert_eq!(settings.reminder.interval, Duration::days(7));
        assert_eq!(settings.metadata_max_age, Duration::hours(24));
    }

    #[tokio::test]
    async fn test_gate_skips_recently_checked() {
        let f = fixture();
        let user = f.store.create_user(Some("555")).await.unwrap();
        f.store
            .create_website(NewWebsite::new(user.id, "Shop", "https://shop.example.com"))
            .await
            .unwrap();

        let first = f.monitor.run_website_cycle_at(t0()).await.unwrap();
        assert_eq!(first.checked, 1);

        for minute in 0..5 {
            let again = f
                .monitor
                .run_website_cycle_at(t0() + Duration::minutes(minute))
                .await
                .unwrap();
            assert_eq!(again.checked, 0);
        }
        assert_eq!(f.websites.calls.load(Ordering::SeqCst), 1);

        let due = f
            .monitor
            .run_website_cycle_at(t0() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(due.checked, 1);
    }

    #[tokio::test]
    async fn test_first_check_never_alerts() {
        let f = fixture();
        f.websites.set(WebsiteStatus::Offline);
        let user = f.store.create_user(Some("555")).await.unwrap();
        f.store
            .create_website(NewWebsite::new(user.id, "Shop", "https://shop.example.com"))
            .await
            .unwrap();
        *f.domains.result.lock().unwrap() = DomainCheckResult {
            status: DomainStatus::Expired,
            expires_at: None,
            registrar: None,
            name_servers: vec![],
            days_left: Some(-3),
            error_message: None,
        };
        f.store
            .create_domain(NewDomain::new(user.id, "shop", "example.com"))
            .await
            .unwrap();

        f.monitor.run_website_cycle_at(t0()).await.unwrap();
        f.monitor.run_domain_cycle_at(t0()).await.unwrap();
        assert!(f.notifier.messages().is_empty());
    }

    #[tokio::test]
    async fn test_going_down_sends_one_alert() {
        let f = fixture();
        let user = f.store.create_user(Some("555")).await.unwrap();
        f.store
            .create_website(NewWebsite::new(user.id, "Shop", "https://shop.example.com"))
            .await
            .unwrap();

        f.monitor.run_website_cycle_at(t0()).await.unwrap();
        f.websites.set(WebsiteStatus::Offline);
        let summary = f
            .monitor
            .run_website_cycle_at(t0() + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(summary.alerts, 1);
        let sent = f.notifier.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "555");
        assert!(sent[0].1.contains("<b>Status:</b> OFFLINE"));

        // Staying down is silent; coming back is announced.
        f.monitor
            .run_website_cycle_at(t0() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(f.notifier.messages().len(), 1);
        f.websites.set(WebsiteStatus::Online);
        f.monitor
            .run_website_cycle_at(t0() + Duration::minutes(15))
            .await
            .unwrap();
        let sent = f.notifier.messages();
        assert_eq!(sent.len(), 2);
        assert!(sent[1].1.contains("back up"));
    }

    #[tokio::test]
    async fn test_reminder_waits_for_interval() {
        let f = fixture();
        *f.domains.result.lock().unwrap() = DomainCheckResult {
            status: DomainStatus::ExpiringSoon,
            expires_at: None,
            registrar: None,
            name_servers: vec![],
            days_left: Some(20),
            error_message: None,
        };
        let user = f.store.create_user(Some("555")).await.unwrap();
        f.store
            .create_domain(NewDomain::new(user.id, "Main", "example.com"))
            .await
            .unwrap();

        f.monitor.run_domain_cycle_at(t0()).await.unwrap();
        f.monitor
            .run_domain_cycle_at(t0() + Duration::hours(24))
            .await
            .unwrap();
        assert!(f.notifier.messages().is_empty());

        f.monitor
            .run_domain_cycle_at(t0() + Duration::hours(24) + Duration::days(8))
            .await
            .unwrap();
        let sent = f.notifier.messages();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].1.contains("reminder"));
    }

    #[tokio::test]
    async fn test_domain_history_is_pruned() {
        let settings = MonitorSettings {
            domain_check_retention: 3,
            ..MonitorSettings::default()
        };
        let f = fixture_with(RecordingNotifier::default(), settings);
        let user = f.store.create_user(None).await.unwrap();
        let domain = f
            .store
            .create_domain(NewDomain::new(user.id, "Main", "example.com"))
            .await
            .unwrap();

        for day in 0..5 {
            f.monitor
                .run_domain_cycle_at(t0() + Duration::days(day))
                .await
                .unwrap();
        }
        assert_eq!(f.domains.calls.load(Ordering::SeqCst), 5);
        assert_eq!(f.store.prune_domain_checks(domain.id, 3).await.unwrap(), 0);
        let latest = f.store.latest_domain_check(domain.id).await.unwrap().unwrap();
        assert_eq!(latest.checked_at, t0() + Duration::days(4));
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_stop_cycle() {
        let f = fixture_with(
            RecordingNotifier::failing_for(&["blocked"]),
            MonitorSettings::default(),
        );
        let blocked = f.store.create_user(Some("blocked")).await.unwrap();
        let fine = f.store.create_user(Some("fine")).await.unwrap();
        for (user, url) in [(&blocked, "https://a.example.com"), (&fine, "https://b.example.com")] {
            f.store
                .create_website(NewWebsite::new(user.id, url, url))
                .await
                .unwrap();
        }

        f.monitor.run_website_cycle_at(t0()).await.unwrap();
        f.websites.set(WebsiteStatus::Error);
        let summary = f
            .monitor
            .run_website_cycle_at(t0() + Duration::minutes(5))
            .await
            .unwrap();

        assert_eq!(summary.checked, 2);
        assert_eq!(summary.failed, 0);
        assert_eq!(summary.alerts, 1);
        let sent = f.notifier.messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "fine");
    }

    #[tokio::test]
    async fn test_metadata_refreshed_once_per_day() {
        let hosts = Arc::new(StubHosts::default());
        let f = fixture();
        let monitor = Monitor::new(
            f.store.clone(),
            f.websites.clone(),
            f.domains.clone(),
            f.notifier.clone(),
        )
        .with_host_lookup(hosts.clone());

        let user = f.store.create_user(Some("555")).await.unwrap();
        let site = f
            .store
            .create_website(NewWebsite::new(user.id, "Shop", "https://shop.example.com"))
            .await
            .unwrap();

        monitor.run_website_cycle_at(t0()).await.unwrap();
        let stored = f.store.find_website(site.id).await.unwrap().unwrap();
        assert_eq!(stored.ip_address.as_deref(), Some("192.0.2.10"));
        assert_eq!(stored.hosting.as_deref(), Some("Example Hosting"));

        monitor
            .run_website_cycle_at(t0() + Duration::hours(1))
            .await
            .unwrap();
        assert_eq!(hosts.lookups.load(Ordering::SeqCst), 1);

        monitor
            .run_website_cycle_at(t0() + Duration::hours(25))
            .await
            .unwrap();
        assert_eq!(hosts.lookups.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_add_website_derives_domain_once() {
        let f = fixture();
        let user = f.store.create_user(Some("555")).await.unwrap();

        let (_, domain) = f
            .monitor
            .add_website(NewWebsite::new(user.id, "Shop", "https://www.Example.com/shop"))
            .await
            .unwrap();
        let domain = domain.unwrap();
        assert_eq!(domain.domain, "example.com");
        assert_eq!(domain.check_interval, 1440);
        assert!(f
            .store
            .latest_domain_check(domain.id)
            .await
            .unwrap()
            .is_some());

        let (_, again) = f
            .monitor
            .add_website(NewWebsite::new(user.id, "Blog", "https://example.com/blog"))
            .await
            .unwrap();
        assert!(again.is_none());

        let (_, by_ip) = f
            .monitor
            .add_website(NewWebsite::new(user.id, "Box", "http://192.0.2.1:8080/"))
            .await
            .unwrap();
        assert!(by_ip.is_none());
        assert_eq!(f.store.domains_for_user(user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_check_now_unknown_website() {
        let f = fixture();
        let result = f.monitor.check_website_now(404).await;
        assert!(matches!(result, Err(VigilError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_check_now_records() {
        let f = fixture();
        let user = f.store.create_user(None).await.unwrap();
        let site = f
            .store
            .create_website(NewWebsite::new(user.id, "Shop", "https://shop.example.com"))
            .await
            .unwrap();
        let check = f.monitor.check_website_now(site.id).await.unwrap();
        assert_eq!(check.result.status, WebsiteStatus::Online);
        assert_eq!(
            f.store.latest_website_check(site.id).await.unwrap().map(|c| c.id),
            Some(check.id)
        );
    }

    #[tokio::test]
    async fn test_add_domain_normalizes() {
        let f = fixture();
        let user = f.store.create_user(None).await.unwrap();
        let domain = f
            .monitor
            .add_domain(NewDomain::new(user.id, "Main", "https://www.Example.com:8443/path?x=1"))
            .await
            .unwrap();
        assert_eq!(domain.domain, "example.com");
        assert!(f
            .monitor
            .add_domain(NewDomain::new(user.id, "Bad", "not a domain"))
            .await
            .is_err());
    }
}
