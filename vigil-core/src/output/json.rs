use serde::Serialize;

use super::OutputFormatter;
use crate::models::{
    DomainCheckResult, MonitoredDomain, MonitoredWebsite, User, WebsiteCheck, WebsiteCheckResult,
};

pub struct JsonFormatter {
    pretty: bool,
}

impl Default for JsonFormatter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Serialize)]
struct Checked<'a, T: Serialize> {
    target: &'a str,
    #[serde(flatten)]
    result: &'a T,
}

#[derive(Serialize)]
struct History<'a> {
    website: &'a MonitoredWebsite,
    checks: &'a [WebsiteCheck],
}

#[derive(Serialize)]
struct WebsiteAdded<'a> {
    website: &'a MonitoredWebsite,
    domain: Option<&'a MonitoredDomain>,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact(mut self) -> Self {
        self.pretty = false;
        self
    }

    fn to_json<T: Serialize + ?Sized>(&self, value: &T) -> String {
        if self.pretty {
            serde_json::to_string_pretty(value)
                .unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        } else {
            serde_json::to_string(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
        }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_website_check(&self, url: &str, result: &WebsiteCheckResult) -> String {
        self.to_json(&Checked { target: url, result })
    }

    fn format_domain_check(&self, domain: &str, result: &DomainCheckResult) -> String {
        self.to_json(&Checked {
            target: domain,
            result,
        })
    }

    fn format_history(&self, website: &MonitoredWebsite, checks: &[WebsiteCheck]) -> String {
        self.to_json(&History { website, checks })
    }

    fn format_user(&self, user: &User) -> String {
        self.to_json(user)
    }

    fn format_website_added(
        &self,
        website: &MonitoredWebsite,
        domain: Option<&MonitoredDomain>,
    ) -> String {
        self.to_json(&WebsiteAdded { website, domain })
    }

    fn format_domain_added(&self, domain: &MonitoredDomain) -> String {
        self.to_json(domain)
    }

    fn format_report(&self, messages: &[String]) -> String {
        self.to_json(messages)
    }
}
