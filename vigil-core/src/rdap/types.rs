use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The subset of an RDAP domain object this crate reads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapDomain {
    #[serde(default)]
    pub ldh_name: Option<String>,

    #[serde(default)]
    pub events: Vec<RdapEvent>,

    #[serde(default)]
    pub entities: Vec<RdapEntity>,

    #[serde(default)]
    pub nameservers: Vec<RdapNameserver>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEvent {
    pub event_action: String,
    #[serde(default)]
    pub event_date: Option<String>,
}

impl RdapEvent {
    pub fn parsed_date(&self) -> Option<DateTime<Utc>> {
        let raw = self.event_date.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| crate::whois::parse_date(raw))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapEntity {
    #[serde(default)]
    pub handle: Option<String>,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default)]
    pub vcard_array: Option<serde_json::Value>,
}

impl RdapEntity {
    /// The vCard `fn` (formatted name) property.
    pub fn display_name(&self) -> Option<String> {
        let props = self.vcard_array.as_ref()?.as_array()?.get(1)?.as_array()?;
        props
            .iter()
            .filter_map(|prop| prop.as_array())
            .find(|prop| prop.len() >= 4 && prop[0].as_str() == Some("fn"))
            .and_then(|prop| prop[3].as_str())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RdapNameserver {
    #[serde(default)]
    pub ldh_name: Option<String>,

    #[serde(default)]
    pub unicode_name: Option<String>,
}

impl RdapDomain {
    pub fn expiration_date(&self) -> Option<DateTime<Utc>> {
        self.events
            .iter()
            .find(|e| e.event_action.eq_ignore_ascii_case("expiration"))
            .and_then(|e| e.parsed_date())
    }

    pub fn registrar(&self) -> Option<String> {
        self.entities
            .iter()
            .find(|e| e.roles.iter().any(|r| r == "registrar"))
            .and_then(|e| e.display_name().or_else(|| e.handle.clone()))
    }

    pub fn nameserver_names(&self) -> Vec<String> {
        self.nameservers
            .iter()
            .filter_map(|ns| ns.ldh_name.as_ref().or(ns.unicode_name.as_ref()))
            .map(|name| name.trim_end_matches('.').to_lowercase())
            .collect()
    }
}
