use chrono::{DateTime, Utc};

use crate::models::{DomainCheck, DomainStatus, MonitoredDomain, MonitoredWebsite, WebsiteCheck};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebsiteTransition {
    WentDown,
    CameUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainAlertKind {
    /// Status moved into EXPIRING_SOON or EXPIRED.
    Critical,
    /// Status unchanged, expiry still close.
    Reminder,
}

/// Escape the three characters Telegram's HTML mode cares about.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M UTC").to_string()
}

pub fn website_alert_message(
    website: &MonitoredWebsite,
    check: &WebsiteCheck,
    transition: WebsiteTransition,
) -> String {
    let heading = match transition {
        WebsiteTransition::WentDown => "🔴 <b>Website is down</b>",
        WebsiteTransition::CameUp => "🟢 <b>Website is back up</b>",
    };

    let mut message = format!(
        "{}\n\n<b>Site:</b> {}\n<b>URL:</b> {}\n<b>Time:</b> {}\n<b>Status:</b> {}",
        heading,
        escape_html(&website.name),
        escape_html(&website.url),
        format_timestamp(check.checked_at),
        check.result.status,
    );

    if let Some(error) = &check.result.error_message {
        message.push_str(&format!("\n<b>Error:</b> {}", escape_html(error)));
    }
    if let (WebsiteTransition::CameUp, Some(ms)) = (transition, check.result.response_time_ms) {
        message.push_str(&format!("\n<b>Response time:</b> {} ms", ms));
    }
    if let Some(ip) = &website.ip_address {
        message.push_str(&format!("\n<b>IP:</b> {}", escape_html(ip)));
    }
    if let Some(hosting) = &website.hosting {
        message.push_str(&format!("\n<b>Hosting:</b> {}", escape_html(hosting)));
    }
    message
}

pub fn domain_alert_message(
    domain: &MonitoredDomain,
    check: &DomainCheck,
    kind: DomainAlertKind,
) -> String {
    let heading = match (kind, check.result.status) {
        (DomainAlertKind::Reminder, _) => "⏰ <b>Domain renewal reminder</b>",
        (DomainAlertKind::Critical, DomainStatus::Expired) => "❌ <b>Domain has expired</b>",
        (DomainAlertKind::Critical, _) => "⚠️ <b>Domain expires soon</b>",
    };

    let mut message = format!(
        "{}\n\n<b>Domain:</b> {}\n<b>Address:</b> {}\n<b>Time:</b> {}\n<b>Status:</b> {}",
        heading,
        escape_html(&domain.name),
        escape_html(&domain.domain),
        format_timestamp(check.checked_at),
        check.result.status,
    );

    if let Some(days) = check.result.days_left {
        message.push_str(&format!("\n<b>Days left:</b> {}", days));
    }
    if let Some(expires_at) = check.result.expires_at {
        message.push_str(&format!(
            "\n<b>Expires:</b> {}",
            expires_at.format("%Y-%m-%d")
        ));
    }
    if let Some(registrar) = &check.result.registrar {
        message.push_str(&format!("\n<b>Registrar:</b> {}", escape_html(registrar)));
    }
    message
}
