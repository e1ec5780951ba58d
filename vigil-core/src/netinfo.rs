//! Resolved IP and hosting organization for monitored websites.

use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{Result, VigilError};

const IP_API_BASE: &str = "http://ip-api.com/json/";

/// Hostname resolution and IP ownership lookup.
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn resolve(&self, host: &str) -> Result<IpAddr>;
    async fn lookup_org(&self, ip: IpAddr) -> Result<Option<String>>;
}

#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: String,
    #[serde(default)]
    org: Option<String>,
    #[serde(default)]
    isp: Option<String>,
    #[serde(default, rename = "as")]
    as_name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl IpApiResponse {
    /// Most specific non-empty owner name.
    fn organization(self) -> Option<String> {
        [self.org, self.isp, self.as_name]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .find(|s| !s.is_empty())
    }
}

#[derive(Clone)]
pub struct HostInfoClient {
    resolver: TokioAsyncResolver,
    http: Client,
    api_base: String,
}

impl HostInfoClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 2;

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::google(), opts),
            http,
            api_base: IP_API_BASE.to_string(),
        })
    }

    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }
}

impl std::fmt::Debug for HostInfoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostInfoClient")
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[async_trait]
impl HostLookup for HostInfoClient {
    #[instrument(skip(self), fields(host = %host))]
    async fn resolve(&self, host: &str) -> Result<IpAddr> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(ip);
        }
        let lookup = self.resolver.lookup_ip(host).await?;
        lookup
            .iter()
            .next()
            .ok_or_else(|| VigilError::NotFound(format!("no address for {}", host)))
    }

    #[instrument(skip(self), fields(ip = %ip))]
    async fn lookup_org(&self, ip: IpAddr) -> Result<Option<String>> {
        let url = format!("{}{}", self.api_base, ip);
        let response: IpApiResponse = self.http.get(&url).send().await?.json().await?;

        if response.status != "success" {
            debug!(message = ?response.message, "IP lookup unsuccessful");
            return Ok(None);
        }
        Ok(response.organization())
    }
}

/// Host part of a website URL.
pub fn host_of(url: &str) -> Result<String> {
    let parsed = reqwest::Url::parse(url).map_err(|e| VigilError::InvalidUrl(e.to_string()))?;
    parsed
        .host_str()
        .map(|h| h.trim_start_matches('[').trim_end_matches(']').to_string())
        .ok_or_else(|| VigilError::InvalidUrl(format!("no host in {}", url)))
}
