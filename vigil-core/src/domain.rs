//! Domain registration checks: WHOIS first, RDAP when WHOIS fails or
//! answers without any registration fields.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::models::{DomainCheckResult, DomainStatus};
use crate::rdap::{RdapClient, RdapDomain};
use crate::validation::extract_domain;
use crate::whois::{WhoisClient, WhoisRecord};

/// Anything that can resolve a domain's registration status.
#[async_trait]
pub trait DomainProbe: Send + Sync {
    async fn check(&self, domain: &str) -> DomainCheckResult;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationSource {
    Whois,
    Rdap,
}

/// Registration facts from either data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub source: RegistrationSource,
    pub expires_at: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
    pub name_servers: Vec<String>,
}

impl Registration {
    /// Nothing usable was extracted.
    pub fn is_empty(&self) -> bool {
        self.expires_at.is_none() && self.registrar.is_none() && self.name_servers.is_empty()
    }
}

impl From<WhoisRecord> for Registration {
    fn from(record: WhoisRecord) -> Self {
        Self {
            source: RegistrationSource::Whois,
            expires_at: record.expires_at,
            registrar: record.registrar,
            name_servers: record.name_servers,
        }
    }
}

impl From<RdapDomain> for Registration {
    fn from(domain: RdapDomain) -> Self {
        Self {
            source: RegistrationSource::Rdap,
            expires_at: domain.expiration_date(),
            registrar: domain.registrar(),
            name_servers: domain.nameserver_names(),
        }
    }
}

/// Whole days until `expires_at`, rounded toward negative infinity.
pub fn days_until(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_seconds().div_euclid(86_400)
}

/// Status for a resolved (or missing) expiry date.
pub fn derive_status(
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    warning_days: i64,
) -> (DomainStatus, Option<i64>) {
    match expires_at {
        None => (DomainStatus::Active, None),
        Some(expires_at) => {
            let days_left = days_until(expires_at, now);
            let status = if days_left < 0 {
                DomainStatus::Expired
            } else if days_left <= warning_days {
                DomainStatus::ExpiringSoon
            } else {
                DomainStatus::Active
            };
            (status, Some(days_left))
        }
    }
}

/// Turn a lookup outcome into the stored result shape.
pub fn settle(
    outcome: Result<Registration>,
    now: DateTime<Utc>,
    warning_days: i64,
) -> DomainCheckResult {
    match outcome {
        Ok(registration) => {
            let (status, days_left) = derive_status(registration.expires_at, now, warning_days);
            DomainCheckResult {
                status,
                expires_at: registration.expires_at,
                registrar: registration.registrar,
                name_servers: registration.name_servers,
                days_left,
                error_message: None,
            }
        }
        Err(e) => DomainCheckResult::error(e.to_string()),
    }
}

/// Run `primary`; if it fails, run `fallback`. When both fail the primary
/// error is returned. An empty primary answer also consults `fallback`, but
/// stands (and settles as active) when the fallback fails.
pub async fn with_fallback<P, F, FFut>(primary: P, fallback: F) -> Result<Registration>
where
    P: Future<Output = Result<Registration>>,
    F: FnOnce() -> FFut,
    FFut: Future<Output = Result<Registration>>,
{
    match primary.await {
        Ok(registration) if !registration.is_empty() => Ok(registration),
        Ok(empty) => match fallback().await {
            Ok(registration) => Ok(registration),
            Err(fallback_error) => {
                debug!(error = %fallback_error, "Fallback lookup failed, keeping empty primary answer");
                Ok(empty)
            }
        },
        Err(primary_error) => {
            warn!(error = %primary_error, "Primary registration lookup failed, trying fallback");
            match fallback().await {
                Ok(registration) => Ok(registration),
                Err(fallback_error) => {
                    warn!(error = %fallback_error, "Fallback registration lookup failed");
                    Err(primary_error)
                }
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct DomainChecker {
    whois: WhoisClient,
    rdap: RdapClient,
    warning_days: i64,
}

impl DomainChecker {
    pub fn new(whois: WhoisClient, rdap: RdapClient) -> Self {
        Self {
            whois,
            rdap,
            warning_days: 30,
        }
    }

    /// Build with the stock clients and the given timeouts.
    pub fn with_timeouts(
        whois_timeout: Duration,
        whois_follow_depth: u8,
        rdap_timeout: Duration,
    ) -> Result<Self> {
        let whois = WhoisClient::new()
            .with_timeout(whois_timeout)
            .with_follow_depth(whois_follow_depth);
        Ok(Self::new(whois, RdapClient::new(rdap_timeout)?))
    }

    pub fn with_warning_days(mut self, days: i64) -> Self {
        self.warning_days = days;
        self
    }

    pub async fn lookup(&self, domain: &str) -> Result<Registration> {
        with_fallback(
            async { self.whois.lookup(domain).await.map(Registration::from) },
            || async { self.rdap.lookup_domain(domain).await.map(Registration::from) },
        )
        .await
    }
}

#[async_trait]
impl DomainProbe for DomainChecker {
    #[instrument(skip(self), fields(domain = %domain))]
    async fn check(&self, domain: &str) -> DomainCheckResult {
        let domain = extract_domain(domain);
        let outcome = self.lookup(&domain).await;
        let result = settle(outcome, Utc::now(), self.warning_days);
        info!(status = %result.status, days_left = ?result.days_left, "Domain checked");
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VigilError;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap()
    }

    fn registration(source: RegistrationSource, expires_in_days: Option<i64>) -> Registration {
        Registration {
            source,
            expires_at: expires_in_days.map(|d| now() + chrono::Duration::days(d)),
            registrar: Some("Registrar".to_string()),
            name_servers: vec!["ns1.example.com".to_string()],
        }
    }

    #[test]
    fn test_status_thresholds() {
        let at = |d: i64| Some(now() + chrono::Duration::days(d));
        assert_eq!(derive_status(None, now(), 30), (DomainStatus::Active, None));
        assert_eq!(derive_status(at(-1), now(), 30), (DomainStatus::Expired, Some(-1)));
        assert_eq!(derive_status(at(0), now(), 30), (DomainStatus::ExpiringSoon, Some(0)));
        assert_eq!(derive_status(at(30), now(), 30), (DomainStatus::ExpiringSoon, Some(30)));
        assert_eq!(derive_status(at(31), now(), 30), (DomainStatus::Active, Some(31)));
    }

    #[test]
    fn test_days_left_floors_past_dates() {
        let an_hour_ago = now() - chrono::Duration::hours(1);
        assert_eq!(days_until(an_hour_ago, now()), -1);
        let (status, _) = derive_status(Some(an_hour_ago), now(), 30);
        assert_eq!(status, DomainStatus::Expired);
    }

    #[test]
    fn test_days_left_status_invariant() {
        for offset_hours in (-24 * 40..24 * 40).step_by(7) {
            let expires = now() + chrono::Duration::hours(offset_hours);
            let (status, days) = derive_status(Some(expires), now(), 30);
            let days = days.unwrap();
            match status {
                DomainStatus::Expired => assert!(days < 0),
                DomainStatus::ExpiringSoon => assert!((0..=30).contains(&days)),
                DomainStatus::Active => assert!(days > 30),
                DomainStatus::Error => panic!("error status from resolved expiry"),
            }
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_fallback() {
        let fallback_ran = AtomicBool::new(false);
        let outcome = with_fallback(
            async { Ok(registration(RegistrationSource::Whois, Some(100))) },
            || async {
                fallback_ran.store(true, Ordering::SeqCst);
                Ok(registration(RegistrationSource::Rdap, Some(100)))
            },
        )
        .await
        .unwrap();
        assert_eq!(outcome.source, RegistrationSource::Whois);
        assert!(!fallback_ran.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_fallback_used_when_primary_fails() {
        let outcome = with_fallback(
            async { Err::<Registration, _>(VigilError::WhoisError("connection reset".into())) },
            || async { Ok(registration(RegistrationSource::Rdap, Some(10))) },
        )
        .await;
        let result = settle(outcome, now(), 30);
        assert_eq!(result.status, DomainStatus::ExpiringSoon);
        assert_eq!(result.days_left, Some(10));
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_primary_error_wins_when_both_fail() {
        let outcome = with_fallback(
            async { Err::<Registration, _>(VigilError::WhoisError("whois down".into())) },
            || async { Err::<Registration, _>(VigilError::RdapError("rdap down".into())) },
        )
        .await;
        let result = settle(outcome, now(), 30);
        assert_eq!(result.status, DomainStatus::Error);
        let message = result.error_message.unwrap();
        assert!(message.contains("whois down"));
        assert!(!message.contains("rdap down"));
        assert!(result.days_left.is_none());
    }

    #[tokio::test]
    async fn test_empty_whois_answer_settles_active_when_fallback_fails() {
        let empty = Registration {
            source: RegistrationSource::Whois,
            expires_at: None,
            registrar: None,
            name_servers: Vec::new(),
        };
        let outcome = with_fallback(async { Ok(empty) }, || async {
            Err::<Registration, _>(VigilError::RdapError("404".into()))
        })
        .await;
        let result = settle(outcome, now(), 30);
        assert_eq!(result.status, DomainStatus::Active);
        assert!(result.days_left.is_none());
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_empty_whois_answer_enriched_by_fallback() {
        let empty = Registration {
            source: RegistrationSource::Whois,
            expires_at: None,
            registrar: None,
            name_servers: Vec::new(),
        };
        let outcome = with_fallback(async { Ok(empty) }, || async {
            Ok(registration(RegistrationSource::Rdap, Some(5)))
        })
        .await
        .unwrap();
        assert_eq!(outcome.source, RegistrationSource::Rdap);
    }

    #[test]
    fn test_missing_expiry_is_active() {
        let result = settle(Ok(registration(RegistrationSource::Whois, None)), now(), 30);
        assert_eq!(result.status, DomainStatus::Active);
        assert!(result.expires_at.is_none());
        assert!(result.days_left.is_none());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_domain_check() {
        let checker = DomainChecker::with_timeouts(
            Duration::from_secs(15),
            3,
            Duration::from_secs(10),
        )
        .unwrap();
        let result = checker.check("https://www.example.com/path").await;
        assert_ne!(result.status, DomainStatus::Error);
    }
}
