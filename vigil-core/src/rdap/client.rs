use std::time::Duration;

use reqwest::Client;
use tracing::{debug, instrument};

use super::types::RdapDomain;
use crate::error::{Result, VigilError};
use crate::validation::{normalize_domain, tld_of};
use crate::whois::rdap_base_for;

const USER_AGENT: &str = concat!("vigil/", env!("CARGO_PKG_VERSION"), " (RDAP)");

#[derive(Debug, Clone)]
pub struct RdapClient {
    http: Client,
    /// Replaces the per-TLD endpoint selection when set.
    base_override: Option<String>,
}

impl RdapClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            base_override: None,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.base_override = Some(base.into());
        self
    }

    /// Endpoint queried for `domain`.
    pub fn url_for(&self, domain: &str) -> String {
        let base = match &self.base_override {
            Some(base) => base.as_str(),
            None => rdap_base_for(tld_of(domain).unwrap_or_default()),
        };
        format!("{}/domain/{}", base.trim_end_matches('/'), domain)
    }

    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup_domain(&self, domain: &str) -> Result<RdapDomain> {
        let domain = normalize_domain(domain)?;
        let url = self.url_for(&domain);
        debug!(url = %url, "Querying RDAP");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/rdap+json, application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    VigilError::Timeout(format!("RDAP query for {} timed out", domain))
                } else {
                    VigilError::RdapError(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(VigilError::RdapError(format!(
                "RDAP query failed with status {}",
                response.status()
            )));
        }

        response
            .json::<RdapDomain>()
            .await
            .map_err(|e| VigilError::RdapError(format!("invalid RDAP payload: {}", e)))
    }
}
