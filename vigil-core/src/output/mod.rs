mod human;
mod json;

pub use human::HumanFormatter;
pub use json::JsonFormatter;

use serde::{Deserialize, Serialize};

use crate::models::{
    DomainCheckResult, MonitoredDomain, MonitoredWebsite, User, WebsiteCheck, WebsiteCheckResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Human,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" | "pretty" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown output format: {}", s)),
        }
    }
}

/// Rendering of CLI results. Chat messages are built in `notify` and `report`.
pub trait OutputFormatter {
    fn format_website_check(&self, url: &str, result: &WebsiteCheckResult) -> String;
    fn format_domain_check(&self, domain: &str, result: &DomainCheckResult) -> String;
    fn format_history(&self, website: &MonitoredWebsite, checks: &[WebsiteCheck]) -> String;
    fn format_user(&self, user: &User) -> String;
    fn format_website_added(
        &self,
        website: &MonitoredWebsite,
        domain: Option<&MonitoredDomain>,
    ) -> String;
    fn format_domain_added(&self, domain: &MonitoredDomain) -> String;
    fn format_report(&self, messages: &[String]) -> String;
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        OutputFormat::Human => Box::new(HumanFormatter::new()),
        OutputFormat::Json => Box::new(JsonFormatter::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("TEXT".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
