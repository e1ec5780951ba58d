//! Deciding whether a freshly recorded check deserves a message.
//!
//! Both detectors compare the new check against the one before it. With no
//! previous check there is nothing to compare and nothing is sent.

use chrono::Duration;

use crate::models::{
    DomainCheck, DomainStatus, MonitoredDomain, MonitoredWebsite, User, WebsiteCheck,
    WebsiteStatus,
};
use crate::notify::{
    domain_alert_message, website_alert_message, DomainAlertKind, WebsiteTransition,
};

/// A message ready to hand to a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub chat_id: String,
    pub text: String,
}

pub fn website_transition(
    previous: WebsiteStatus,
    current: WebsiteStatus,
) -> Option<WebsiteTransition> {
    match (previous, current) {
        (WebsiteStatus::Online, WebsiteStatus::Offline | WebsiteStatus::Error) => {
            Some(WebsiteTransition::WentDown)
        }
        (WebsiteStatus::Offline | WebsiteStatus::Error, WebsiteStatus::Online) => {
            Some(WebsiteTransition::CameUp)
        }
        (WebsiteStatus::Online, WebsiteStatus::Online)
        | (WebsiteStatus::Offline | WebsiteStatus::Error, WebsiteStatus::Offline)
        | (WebsiteStatus::Offline | WebsiteStatus::Error, WebsiteStatus::Error) => None,
    }
}

pub fn website_alert(
    website: &MonitoredWebsite,
    owner: &User,
    previous: Option<&WebsiteCheck>,
    current: &WebsiteCheck,
) -> Option<Alert> {
    let previous = previous?;
    let transition = website_transition(previous.result.status, current.result.status)?;
    let wanted = match transition {
        WebsiteTransition::WentDown => website.notify_on_down,
        WebsiteTransition::CameUp => website.notify_on_up,
    };
    if !wanted {
        return None;
    }
    let chat_id = owner.notification_chat()?;

    Some(Alert {
        chat_id: chat_id.to_string(),
        text: website_alert_message(website, current, transition),
    })
}

/// Thresholds for the domain detector.
#[derive(Debug, Clone, Copy)]
pub struct ReminderPolicy {
    /// Reminders only fire while this many days or fewer remain.
    pub within_days: i64,
    /// Minimum spacing between the previous check and a reminder.
    pub interval: Duration,
}

impl Default for ReminderPolicy {
    fn default() -> Self {
        Self {
            within_days: 30,
            interval: Duration::days(7),
        }
    }
}

pub fn domain_alert_kind(
    previous: &DomainCheck,
    current: &DomainCheck,
    policy: ReminderPolicy,
) -> Option<DomainAlertKind> {
    if previous.result.status != current.result.status {
        return match current.result.status {
            DomainStatus::ExpiringSoon | DomainStatus::Expired => Some(DomainAlertKind::Critical),
            DomainStatus::Active | DomainStatus::Error => None,
        };
    }

    let close = current
        .result
        .days_left
        .is_some_and(|days| days <= policy.within_days);
    let spaced = current.checked_at - previous.checked_at > policy.interval;
    (close && spaced).then_some(DomainAlertKind::Reminder)
}

pub fn domain_alert(
    domain: &MonitoredDomain,
    owner: &User,
    previous: Option<&DomainCheck>,
    current: &DomainCheck,
    policy: ReminderPolicy,
) -> Option<Alert> {
    if !domain.notify_on_expiry {
        return None;
    }
    let kind = domain_alert_kind(previous?, current, policy)?;
    let chat_id = owner.notification_chat()?;

    Some(Alert {
        chat_id: chat_id.to_string(),
        text: domain_alert_message(domain, current, kind),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DomainCheckResult, WebsiteCheckResult};
    use chrono::{DateTime, TimeZone, Utc};

    fn at(hours: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 9, 0, 0).unwrap() + Duration::hours(hours)
    }

    fn owner(enabled: bool) -> User {
        User {
            id: 1,
            chat_id: Some("555".to_string()),
            notifications_enabled: enabled,
        }
    }

    fn website(down: bool, up: bool) -> MonitoredWebsite {
        MonitoredWebsite {
            id: 1,
            user_id: 1,
            name: "Shop".to_string(),
            url: "https://shop.example.com".to_string(),
            check_interval: 5,
            is_active: true,
            notify_on_down: down,
            notify_on_up: up,
            ip_address: None,
            hosting: None,
            metadata_refreshed_at: None,
        }
    }

    fn wcheck(status: WebsiteStatus, hours: i64) -> WebsiteCheck {
        WebsiteCheck {
            id: hours,
            website_id: 1,
            checked_at: at(hours),
            result: WebsiteCheckResult {
                status,
                response_time_ms: None,
                status_code: None,
                error_message: None,
                ssl_valid: None,
                ssl_expires_at: None,
                ssl_issuer: None,
                ssl_days_left: None,
            },
        }
    }

    fn domain(notify: bool) -> MonitoredDomain {
        MonitoredDomain {
            id: 1,
            user_id: 1,
            name: "example.com".to_string(),
            domain: "example.com".to_string(),
            check_interval: 1440,
            is_active: true,
            notify_on_expiry: notify,
        }
    }

    fn dcheck(status: DomainStatus, days_left: Option<i64>, hours: i64) -> DomainCheck {
        DomainCheck {
            id: hours,
            domain_id: 1,
            checked_at: at(hours),
            result: DomainCheckResult {
                status,
                expires_at: None,
                registrar: None,
                name_servers: vec![],
                days_left,
                error_message: None,
            },
        }
    }

    #[test]
    fn test_transition_table() {
        use WebsiteStatus::*;
        assert_eq!(website_transition(Online, Offline), Some(WebsiteTransition::WentDown));
        assert_eq!(website_transition(Online, Error), Some(WebsiteTransition::WentDown));
        assert_eq!(website_transition(Offline, Online), Some(WebsiteTransition::CameUp));
        assert_eq!(website_transition(Error, Online), Some(WebsiteTransition::CameUp));
        assert_eq!(website_transition(Offline, Error), None);
        assert_eq!(website_transition(Error, Offline), None);
        assert_eq!(website_transition(Online, Online), None);
    }

    #[test]
    fn test_first_website_check_is_silent() {
        let current = wcheck(WebsiteStatus::Offline, 0);
        assert!(website_alert(&website(true, true), &owner(true), None, &current).is_none());
    }

    #[test]
    fn test_down_alert_carries_status() {
        let previous = wcheck(WebsiteStatus::Online, 0);
        let current = wcheck(WebsiteStatus::Offline, 1);
        let alert =
            website_alert(&website(true, true), &owner(true), Some(&previous), &current).unwrap();
        assert_eq!(alert.chat_id, "555");
        assert!(alert.text.contains("<b>Status:</b> OFFLINE"));
    }

    #[test]
    fn test_flags_gate_website_alerts() {
        let previous = wcheck(WebsiteStatus::Online, 0);
        let current = wcheck(WebsiteStatus::Error, 1);
        assert!(website_alert(&website(false, true), &owner(true), Some(&previous), &current)
            .is_none());
        assert!(website_alert(&website(true, true), &owner(false), Some(&previous), &current)
            .is_none());

        let back = wcheck(WebsiteStatus::Online, 2);
        assert!(website_alert(&website(true, false), &owner(true), Some(&current), &back)
            .is_none());
    }

    #[test]
    fn test_critical_domain_transition() {
        let policy = ReminderPolicy::default();
        let previous = dcheck(DomainStatus::Active, Some(31), 0);
        let current = dcheck(DomainStatus::ExpiringSoon, Some(30), 24);
        assert_eq!(
            domain_alert_kind(&previous, &current, policy),
            Some(DomainAlertKind::Critical)
        );

        let expired = dcheck(DomainStatus::Expired, Some(-1), 48);
        assert_eq!(
            domain_alert_kind(&current, &expired, policy),
            Some(DomainAlertKind::Critical)
        );

        let renewed = dcheck(DomainStatus::Active, Some(365), 72);
        assert_eq!(domain_alert_kind(&expired, &renewed, policy), None);
    }

    #[test]
    fn test_reminder_spacing() {
        let policy = ReminderPolicy::default();
        let first = dcheck(DomainStatus::ExpiringSoon, Some(20), 0);
        let next_day = dcheck(DomainStatus::ExpiringSoon, Some(19), 24);
        assert_eq!(domain_alert_kind(&first, &next_day, policy), None);

        let eight_days = dcheck(DomainStatus::ExpiringSoon, Some(11), 24 * 9);
        assert_eq!(
            domain_alert_kind(&next_day, &eight_days, policy),
            Some(DomainAlertKind::Reminder)
        );
    }

    #[test]
    fn test_no_reminder_when_far_from_expiry() {
        let policy = ReminderPolicy::default();
        let first = dcheck(DomainStatus::Active, Some(200), 0);
        let later = dcheck(DomainStatus::Active, Some(190), 24 * 10);
        assert_eq!(domain_alert_kind(&first, &later, policy), None);
    }

    #[test]
    fn test_domain_alert_gating() {
        let policy = ReminderPolicy::default();
        let previous = dcheck(DomainStatus::Active, Some(40), 0);
        let current = dcheck(DomainStatus::ExpiringSoon, Some(25), 24 * 15);

        assert!(domain_alert(&domain(true), &owner(true), None, &current, policy).is_none());
        assert!(domain_alert(&domain(false), &owner(true), Some(&previous), &current, policy)
            .is_none());
        assert!(domain_alert(&domain(true), &owner(false), Some(&previous), &current, policy)
            .is_none());

        let alert =
            domain_alert(&domain(true), &owner(true), Some(&previous), &current, policy).unwrap();
        assert!(alert.text.contains("expires soon"));
    }
}
