//! Certificate inspection over a raw TLS handshake.

use std::time::Duration;

use chrono::{DateTime, Utc};
use native_tls::TlsConnector;
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};
use x509_parser::prelude::*;

use super::classify::SslFailure;
use crate::error::{Result, VigilError};

/// What an inspection learned about a host's certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SslReport {
    pub valid: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub issuer: Option<String>,
    /// Whole days until expiry, never negative.
    pub days_left: Option<i64>,
    pub error: Option<String>,
}

impl SslReport {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            expires_at: None,
            issuer: None,
            days_left: None,
            error: Some(error.into()),
        }
    }
}

/// How urgently an expiring certificate needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslWarningLevel {
    Critical,
    Warning,
    Info,
}

impl SslWarningLevel {
    pub fn for_days_left(days_left: i64) -> Option<Self> {
        match days_left {
            d if d <= 7 => Some(SslWarningLevel::Critical),
            d if d <= 30 => Some(SslWarningLevel::Warning),
            d if d <= 60 => Some(SslWarningLevel::Info),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SslWarningLevel::Critical => "critical",
            SslWarningLevel::Warning => "warning",
            SslWarningLevel::Info => "info",
        }
    }
}

/// Fields read from the leaf certificate.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateFacts {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub issuer: Option<String>,
}

impl CertificateFacts {
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = X509Certificate::from_der(der)
            .map_err(|e| VigilError::Tls(format!("unparseable certificate: {}", e)))?;

        let validity = cert.validity();
        let not_before = DateTime::from_timestamp(validity.not_before.timestamp(), 0)
            .ok_or_else(|| VigilError::Tls("certificate notBefore out of range".to_string()))?;
        let not_after = DateTime::from_timestamp(validity.not_after.timestamp(), 0)
            .ok_or_else(|| VigilError::Tls("certificate notAfter out of range".to_string()))?;

        let issuer = cert
            .issuer()
            .iter_organization()
            .chain(cert.issuer().iter_common_name())
            .find_map(|attr| attr.as_str().ok())
            .map(str::to_string);

        Ok(Self {
            not_before,
            not_after,
            issuer,
        })
    }
}

/// Outcome of the strict (verifying) handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trust {
    Trusted,
    Rejected(SslFailure),
    /// Skipped because the validity window already decided the outcome.
    NotChecked,
}

/// Combine certificate facts and the trust verdict into a report.
pub fn assess(facts: &CertificateFacts, trust: Trust, now: DateTime<Utc>) -> SslReport {
    let expired = facts.not_after < now;
    let not_yet_valid = facts.not_before > now;
    let trusted = trust == Trust::Trusted;
    let valid = !expired && !not_yet_valid && trusted;

    let error = if valid {
        None
    } else if expired {
        Some(SslFailure::Expired)
    } else if not_yet_valid {
        Some(SslFailure::NotYetValid)
    } else if let Trust::Rejected(failure) = trust {
        Some(failure)
    } else {
        Some(SslFailure::CertificateProblem)
    };

    let days_left = (facts.not_after - now).num_seconds().div_euclid(86_400).max(0);

    SslReport {
        valid,
        expires_at: Some(facts.not_after),
        issuer: facts.issuer.clone(),
        days_left: Some(days_left),
        error: error.map(|f| f.reason().to_string()),
    }
}

#[derive(Debug, Clone)]
pub struct SslInspector {
    timeout: Duration,
}

impl Default for SslInspector {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl SslInspector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Inspect the certificate served for an https URL. Never fails: every
    /// problem is reported through `SslReport::error`.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn inspect(&self, url: &str) -> SslReport {
        let (host, port) = match parse_target(url) {
            Ok(target) => target,
            Err(e) => return SslReport::failed(e.to_string()),
        };

        match timeout(self.timeout, self.inspect_host(&host, port)).await {
            Ok(Ok(report)) => report,
            Ok(Err(e)) => {
                debug!(error = %e, "SSL inspection failed");
                SslReport::failed(format!("SSL error: {}", e))
            }
            Err(_) => SslReport::failed("SSL check timed out"),
        }
    }

    async fn inspect_host(&self, host: &str, port: u16) -> Result<SslReport> {
        let permissive = TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .build()
            .map_err(|e| VigilError::Tls(e.to_string()))?;
        let permissive = tokio_native_tls::TlsConnector::from(permissive);

        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| VigilError::Tls(format!("connect to {}:{} failed: {}", host, port, e)))?;
        let tls_stream = permissive
            .connect(host, stream)
            .await
            .map_err(|e| VigilError::Tls(e.to_string()))?;

        let der = tls_stream
            .get_ref()
            .peer_certificate()
            .map_err(|e| VigilError::Tls(e.to_string()))?
            .ok_or_else(|| VigilError::Tls("no certificate presented".to_string()))?
            .to_der()
            .map_err(|e| VigilError::Tls(e.to_string()))?;
        drop(tls_stream);

        let facts = CertificateFacts::from_der(&der)?;
        let now = Utc::now();

        let trust = if facts.not_before <= now && now <= facts.not_after {
            self.verify_trust(host, port).await
        } else {
            Trust::NotChecked
        };

        Ok(assess(&facts, trust, now))
    }

    /// Repeat the handshake with full chain and hostname verification.
    async fn verify_trust(&self, host: &str, port: u16) -> Trust {
        let strict = match TlsConnector::new() {
            Ok(connector) => tokio_native_tls::TlsConnector::from(connector),
            Err(_) => return Trust::Rejected(SslFailure::Generic),
        };
        let stream = match TcpStream::connect((host, port)).await {
            Ok(stream) => stream,
            Err(_) => return Trust::Rejected(SslFailure::CertificateProblem),
        };

        match strict.connect(host, stream).await {
            Ok(_) => Trust::Trusted,
            Err(e) => {
                let failure = match SslFailure::from_message(&e.to_string()) {
                    Some(SslFailure::HostnameMismatch) => SslFailure::HostnameMismatch,
                    _ => SslFailure::Untrusted,
                };
                Trust::Rejected(failure)
            }
        }
    }
}

fn parse_target(url: &str) -> Result<(String, u16)> {
    let parsed = reqwest::Url::parse(url).map_err(|e| VigilError::InvalidUrl(e.to_string()))?;
    if parsed.scheme() != "https" {
        return Err(VigilError::InvalidUrl(format!("not an https URL: {}", url)));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| VigilError::InvalidUrl(format!("no host in {}", url)))?
        .to_string();
    Ok((host, parsed.port_or_known_default().unwrap_or(443)))
}
