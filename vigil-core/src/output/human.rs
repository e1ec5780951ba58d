use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use super::OutputFormatter;
use crate::colors::{paint_domain, paint_ssl_level, paint_website, PaletteExt};
use crate::models::{
    DomainCheckResult, DomainStatus, MonitoredDomain, MonitoredWebsite, User, WebsiteCheck,
    WebsiteCheckResult, WebsiteStatus,
};
use crate::status::SslWarningLevel;

static HTML_TAG: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"</?[a-z]+>").ok());

fn format_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%d").to_string()
}

/// Chat reports are HTML; the terminal wants plain text.
fn strip_html(text: &str) -> String {
    let bare = match HTML_TAG.as_ref() {
        Some(re) => re.replace_all(text, "").into_owned(),
        None => text.to_string(),
    };
    bare.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

pub struct HumanFormatter {
    use_colors: bool,
}

impl Default for HumanFormatter {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanFormatter {
    pub fn new() -> Self {
        Self { use_colors: true }
    }

    pub fn without_colors(mut self) -> Self {
        self.use_colors = false;
        self
    }

    fn header(&self, text: &str) -> String {
        if self.use_colors {
            text.heading().to_string()
        } else {
            text.to_string()
        }
    }

    fn label(&self, text: &str) -> String {
        if self.use_colors {
            text.label().to_string()
        } else {
            text.to_string()
        }
    }

    fn muted(&self, text: &str) -> String {
        if self.use_colors {
            text.muted().to_string()
        } else {
            text.to_string()
        }
    }

    fn website_status(&self, status: WebsiteStatus) -> String {
        if self.use_colors {
            paint_website(status, status.as_str()).to_string()
        } else {
            status.as_str().to_string()
        }
    }

    fn domain_status(&self, status: DomainStatus) -> String {
        if self.use_colors {
            paint_domain(status, status.as_str()).to_string()
        } else {
            status.as_str().to_string()
        }
    }

    fn field(&self, name: &str, value: &str) -> String {
        format!("  {}: {}", self.label(name), value)
    }

    fn ssl_line(&self, result: &WebsiteCheckResult) -> Option<String> {
        let valid = result.ssl_valid?;
        let mut text = if valid {
            "valid".to_string()
        } else {
            "invalid".to_string()
        };
        if let Some(expires) = result.ssl_expires_at {
            text.push_str(&format!(", expires {}", format_date(expires)));
        }
        if let Some(days) = result.ssl_days_left {
            text.push_str(&format!(" ({} days)", days));
        }
        let level = result.ssl_days_left.and_then(SslWarningLevel::for_days_left);
        let painted = match (self.use_colors, valid, level) {
            (false, _, _) => text,
            (true, false, _) => text.bad().to_string(),
            (true, true, Some(level)) => paint_ssl_level(level, &text).to_string(),
            (true, true, None) => text.good().to_string(),
        };
        Some(self.field("SSL", &painted))
    }
}

impl OutputFormatter for HumanFormatter {
    fn format_website_check(&self, url: &str, result: &WebsiteCheckResult) -> String {
        let mut output = vec![self.header(&format!("Website: {}", url))];
        output.push(self.field("Status", &self.website_status(result.status)));

        if let Some(code) = result.status_code {
            output.push(self.field("HTTP", &code.to_string()));
        }
        if let Some(ms) = result.response_time_ms {
            output.push(self.field("Response time", &format!("{} ms", ms)));
        }
        if let Some(line) = self.ssl_line(result) {
            output.push(line);
        }
        if let Some(ref issuer) = result.ssl_issuer {
            output.push(self.field("Issuer", issuer));
        }
        if let Some(ref error) = result.error_message {
            output.push(self.field("Error", error));
        }

        output.join("\n")
    }

    fn format_domain_check(&self, domain: &str, result: &DomainCheckResult) -> String {
        let mut output = vec![self.header(&format!("Domain: {}", domain))];
        output.push(self.field("Status", &self.domain_status(result.status)));

        if let Some(expires) = result.expires_at {
            let days = result
                .days_left
                .map(|d| format!(" ({} days)", d))
                .unwrap_or_default();
            output.push(self.field("Expires", &format!("{}{}", format_date(expires), days)));
        }
        if let Some(ref registrar) = result.registrar {
            output.push(self.field("Registrar", registrar));
        }
        if !result.name_servers.is_empty() {
            output.push(format!("  {}:", self.label("Name servers")));
            for ns in &result.name_servers {
                output.push(format!("    - {}", ns));
            }
        }
        if let Some(ref error) = result.error_message {
            output.push(self.field("Error", error));
        }

        output.join("\n")
    }

    fn format_history(&self, website: &MonitoredWebsite, checks: &[WebsiteCheck]) -> String {
        let mut output = vec![self.header(&format!(
            "History: {} ({})",
            website.name, website.url
        ))];
        if checks.is_empty() {
            output.push(self.muted("  No checks recorded yet"));
            return output.join("\n");
        }

        for check in checks {
            let time = check.checked_at.format("%Y-%m-%d %H:%M").to_string();
            let mut line = format!(
                "  {}  {:<7}",
                self.muted(&time),
                self.website_status(check.result.status)
            );
            if let Some(code) = check.result.status_code {
                line.push_str(&format!("  {}", code));
            }
            if let Some(ms) = check.result.response_time_ms {
                line.push_str(&format!("  {} ms", ms));
            }
            if let Some(ref error) = check.result.error_message {
                line.push_str(&format!("  {}", self.muted(error)));
            }
            output.push(line);
        }

        output.join("\n")
    }

    fn format_user(&self, user: &User) -> String {
        let chat = user.chat_id.as_deref().unwrap_or("not linked");
        [
            self.header(&format!("User #{}", user.id)),
            self.field("Chat", chat),
            self.field(
                "Notifications",
                if user.notifications_enabled { "on" } else { "off" },
            ),
        ]
        .join("\n")
    }

    fn format_website_added(
        &self,
        website: &MonitoredWebsite,
        domain: Option<&MonitoredDomain>,
    ) -> String {
        let mut output = vec![
            self.header(&format!("Website #{} added", website.id)),
            self.field("Name", &website.name),
            self.field("URL", &website.url),
            self.field("Interval", &format!("{} min", website.check_interval)),
        ];
        if let Some(domain) = domain {
            output.push(self.field(
                "Domain",
                &format!("{} (#{}, also monitored)", domain.domain, domain.id),
            ));
        }
        output.join("\n")
    }

    fn format_domain_added(&self, domain: &MonitoredDomain) -> String {
        [
            self.header(&format!("Domain #{} added", domain.id)),
            self.field("Name", &domain.name),
            self.field("Domain", &domain.domain),
            self.field("Interval", &format!("{} min", domain.check_interval)),
        ]
        .join("\n")
    }

    fn format_report(&self, messages: &[String]) -> String {
        messages
            .iter()
            .map(|m| strip_html(m))
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn plain() -> HumanFormatter {
        HumanFormatter::new().without_colors()
    }

    #[test]
    fn test_website_check_lines() {
        let result = WebsiteCheckResult {
            status: WebsiteStatus::Online,
            response_time_ms: Some(84),
            status_code: Some(200),
            error_message: None,
            ssl_valid: Some(true),
            ssl_expires_at: Some(Utc.with_ymd_and_hms(2026, 11, 1, 0, 0, 0).unwrap()),
            ssl_issuer: Some("R11".to_string()),
            ssl_days_left: Some(12),
        };
        let out = plain().format_website_check("https://shop.example.com", &result);
        assert!(out.starts_with("Website: https://shop.example.com"));
        assert!(out.contains("Status: ONLINE"));
        assert!(out.contains("Response time: 84 ms"));
        assert!(out.contains("SSL: valid, expires 2026-11-01 (12 days)"));
        assert!(out.contains("Issuer: R11"));
        assert!(!out.contains("Error"));
    }

    #[test]
    fn test_domain_check_error() {
        let out = plain().format_domain_check("example.com", &DomainCheckResult::error("timed out"));
        assert!(out.contains("Status: ERROR"));
        assert!(out.contains("Error: timed out"));
        assert!(!out.contains("Expires"));
    }

    #[test]
    fn test_report_strips_markup() {
        let out = plain().format_report(&[
            "<b>Monitoring report</b>\nA &amp; B".to_string(),
            "<code>x</code> &lt;ok&gt;".to_string(),
        ]);
        assert_eq!(out, "Monitoring report\nA & B\n\nx <ok>");
    }
}
