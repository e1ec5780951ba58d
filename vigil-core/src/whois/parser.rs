//! Tolerant key/value extraction from free-form WHOIS text.
//!
//! Registries disagree on field names (`Registry Expiry Date`, `paid-till`,
//! `Expiration Time`, ...), so every field is read from a prioritized list of
//! normalized keys and the first usable value wins.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static FIELD_LINE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r#"^\s*"?([A-Za-z][A-Za-z0-9 _./()-]*?)"?\s*:\s*(.*?)\s*$"#).ok());

/// Normalized keys carrying the expiry date, most specific first.
const EXPIRY_KEYS: &[&str] = &[
    "registryexpirydate",
    "expirationdate",
    "registrarregistrationexpirationdate",
    "expirydate",
    "expiry",
    "expire",
    "expires",
    "expireson",
    "expirationtime",
    "paidtill",
    "validuntil",
    "renewaldate",
];

const REGISTRAR_KEYS: &[&str] = &[
    "registrar",
    "registrarname",
    "sponsoringregistrar",
    "registrarorganization",
];

const NAMESERVER_KEYS: &[&str] = &["nameserver", "nameservers", "nserver"];

/// Fields pulled out of one WHOIS response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhoisRecord {
    pub domain: String,
    pub whois_server: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub registrar: Option<String>,
    pub name_servers: Vec<String>,
    /// `refer:` / `Whois Server:` target announced by the response, if any.
    pub referral: Option<String>,
}

impl WhoisRecord {
    pub fn parse(domain: &str, whois_server: &str, raw: &str) -> Self {
        let fields = collect_fields(raw);

        let expires_at = EXPIRY_KEYS
            .iter()
            .filter_map(|key| fields.get(*key))
            .flatten()
            .find_map(|value| parse_date(value));

        let registrar = REGISTRAR_KEYS
            .iter()
            .filter_map(|key| fields.get(*key))
            .flatten()
            .find(|value| is_meaningful(value))
            .cloned();

        let mut name_servers: Vec<String> = Vec::new();
        for key in NAMESERVER_KEYS {
            for value in fields.get(*key).into_iter().flatten() {
                // Some registries inline glue addresses after the host name.
                if let Some(host) = value.split_whitespace().next() {
                    let host = host.trim_end_matches('.').to_lowercase();
                    if !host.is_empty() && !name_servers.contains(&host) {
                        name_servers.push(host);
                    }
                }
            }
        }

        let referral = ["registrarwhoisserver", "whoisserver", "refer", "whois"]
            .iter()
            .filter_map(|key| fields.get(*key))
            .flatten()
            .map(|value| {
                value
                    .trim_start_matches("whois://")
                    .trim_end_matches('/')
                    .to_lowercase()
            })
            .find(|server| server.contains('.') && !server.contains(' '));

        WhoisRecord {
            domain: domain.to_string(),
            whois_server: whois_server.to_string(),
            expires_at,
            registrar,
            name_servers,
            referral,
        }
    }

    /// True when the response contains nothing this crate can use.
    pub fn is_empty(&self) -> bool {
        self.expires_at.is_none() && self.registrar.is_none() && self.name_servers.is_empty()
    }
}

/// Lower-cases a field name and drops everything but letters and digits, so
/// `Registry Expiry Date`, `registry-expiry-date` and `registryExpiryDate`
/// all collapse to the same key.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn collect_fields(raw: &str) -> HashMap<String, Vec<String>> {
    let mut fields: HashMap<String, Vec<String>> = HashMap::new();
    let Some(re) = FIELD_LINE.as_ref() else {
        return fields;
    };

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('%') || trimmed.starts_with('#') || trimmed.starts_with(">>>") {
            continue;
        }
        let Some(caps) = re.captures(line) else {
            continue;
        };
        let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
            continue;
        };

        let value = value
            .as_str()
            .trim_end_matches(',')
            .trim_matches('"')
            .trim()
            .to_string();
        if value.is_empty() {
            continue;
        }
        fields.entry(normalize_key(key.as_str())).or_default().push(value);
    }

    fields
}

fn is_meaningful(value: &str) -> bool {
    let lower = value.to_lowercase();
    !lower.is_empty() && !lower.contains("redacted") && lower != "n/a"
}

/// Parse the many date spellings WHOIS servers use into UTC.
pub fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let cleaned = value
        .trim()
        .replace(" (UTC)", "")
        .replace(" UTC", "Z")
        .replace(" +0000", "Z");

    if let Ok(dt) = DateTime::parse_from_rfc3339(&cleaned) {
        return Some(dt.with_timezone(&Utc));
    }

    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%dT%H:%M:%SZ",
        "%Y-%m-%dT%H:%M:%S%.fZ",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M:%SZ",
        "%Y-%m-%d %H:%M:%S",
        "%Y.%m.%d %H:%M:%S",
        "%d.%m.%Y %H:%M:%S",
    ];
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
            return Some(dt.and_utc());
        }
    }

    const DATE_FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%d-%b-%Y",
        "%d-%B-%Y",
        "%Y.%m.%d",
        "%Y/%m/%d",
        "%d.%m.%Y",
        "%d/%m/%Y",
        "%b %d %Y",
    ];
    // Date-only values may still be followed by a time or timezone token.
    let date_part = cleaned.split_whitespace().next().unwrap_or(&cleaned);
    for fmt in DATE_FORMATS {
        for candidate in [cleaned.as_str(), date_part] {
            if let Ok(d) = NaiveDate::parse_from_str(candidate, fmt) {
                return d.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const VERISIGN_SAMPLE: &str = "\
   Domain Name: EXAMPLE.COM
   Registry Domain ID: 2336799_DOMAIN_COM-VRSN
   Registrar WHOIS Server: whois.iana.org
   Updated Date: 2024-08-14T07:01:34Z
   Creation Date: 1995-08-14T04:00:00Z
   Registry Expiry Date: 2025-08-13T04:00:00Z
   Registrar: RESERVED-Internet Assigned Numbers Authority
   Name Server: A.IANA-SERVERS.NET
   Name Server: B.IANA-SERVERS.NET
>>> Last update of whois database: 2024-09-01T00:00:00Z <<<
";

    const TCINET_SAMPLE: &str = "\
% TCI Whois Service. Terms of use:
% https://tcinet.ru/documents/whois_ru_rf.pdf

domain:        EXAMPLE.RU
nserver:       ns1.example.ru. 192.0.2.1
nserver:       ns2.example.ru.
state:         REGISTERED, DELEGATED, VERIFIED
org:           Example LLC
registrar:     RU-CENTER-RU
created:       2005-03-01T12:00:00Z
paid-till:     2026-03-01T21:00:00Z
free-date:     2026-04-02
source:        TCI
";

    #[test]
    fn test_parse_gtld_response() {
        let record = WhoisRecord::parse("example.com", "whois.verisign-grs.com", VERISIGN_SAMPLE);
        assert_eq!(
            record.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 8, 13, 4, 0, 0).unwrap())
        );
        assert_eq!(
            record.registrar.as_deref(),
            Some("RESERVED-Internet Assigned Numbers Authority")
        );
        assert_eq!(
            record.name_servers,
            vec!["a.iana-servers.net", "b.iana-servers.net"]
        );
        assert_eq!(record.referral.as_deref(), Some("whois.iana.org"));
    }

    #[test]
    fn test_parse_ru_response_strips_inline_addresses() {
        let record = WhoisRecord::parse("example.ru", "whois.tcinet.ru", TCINET_SAMPLE);
        assert_eq!(
            record.expires_at,
            Some(Utc.with_ymd_and_hms(2026, 3, 1, 21, 0, 0).unwrap())
        );
        assert_eq!(record.registrar.as_deref(), Some("RU-CENTER-RU"));
        assert_eq!(record.name_servers, vec!["ns1.example.ru", "ns2.example.ru"]);
        assert!(record.referral.is_none());
    }

    #[test]
    fn test_paid_till_alone_is_enough() {
        let record = WhoisRecord::parse("x.ru", "whois.tcinet.ru", "\"paid-till\": \"2030-01-01\"");
        assert_eq!(
            record.expires_at,
            Some(Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_iana_refer_line() {
        let raw = "% IANA WHOIS server\nrefer:        whois.nic.example\n\ndomain: EXAMPLE\n";
        let record = WhoisRecord::parse("foo.example", "whois.iana.org", raw);
        assert_eq!(record.referral.as_deref(), Some("whois.nic.example"));
        assert!(record.is_empty());
    }

    #[test]
    fn test_redacted_registrar_skipped() {
        let raw = "Registrar: REDACTED FOR PRIVACY\nRegistrar Name: Example Registrar Inc.\n";
        let record = WhoisRecord::parse("example.net", "whois.example", raw);
        assert_eq!(record.registrar.as_deref(), Some("Example Registrar Inc."));
    }

    #[test]
    fn test_date_formats() {
        let expected = Utc.with_ymd_and_hms(2027, 1, 15, 0, 0, 0).unwrap();
        for input in [
            "2027-01-15",
            "15-Jan-2027",
            "2027.01.15",
            "15.01.2027",
            "2027-01-15 00:00:00 UTC",
            "2027-01-15T00:00:00+00:00",
        ] {
            assert_eq!(parse_date(input), Some(expected), "input {:?}", input);
        }
        assert_eq!(parse_date("not a date"), None);
    }

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("Registry Expiry Date"), "registryexpirydate");
        assert_eq!(normalize_key("paid-till"), "paidtill");
        assert_eq!(normalize_key("registryExpiryDate"), "registryexpirydate");
    }
}
