use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, instrument};

use super::classify::classify_transport_error;
use super::ssl::{SslInspector, SslReport};
use crate::error::Result;
use crate::models::{WebsiteCheckResult, WebsiteStatus};

const USER_AGENT: &str = concat!("vigil/", env!("CARGO_PKG_VERSION"));

/// Anything that can probe a URL and classify the outcome.
#[async_trait]
pub trait WebsiteProbe: Send + Sync {
    async fn check(&self, url: &str) -> WebsiteCheckResult;
}

/// HTTP liveness probe with concurrent certificate inspection.
#[derive(Debug, Clone)]
pub struct WebsiteChecker {
    http: Client,
    ssl: SslInspector,
}

impl WebsiteChecker {
    pub fn new(request_timeout: Duration, ssl_timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(request_timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            http,
            ssl: SslInspector::new(ssl_timeout),
        })
    }

    async fn timed_get(&self, url: &str) -> (reqwest::Result<reqwest::Response>, Duration) {
        let started = Instant::now();
        let response = self.http.get(url).send().await;
        (response, started.elapsed())
    }
}

#[async_trait]
impl WebsiteProbe for WebsiteChecker {
    #[instrument(skip(self), fields(url = %url))]
    async fn check(&self, url: &str) -> WebsiteCheckResult {
        let parsed = match reqwest::Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => return invalid_url(url, &e.to_string()),
        };
        let secure = parsed.scheme() == "https";

        let ssl_probe = async {
            if secure {
                Some(self.ssl.inspect(url).await)
            } else {
                None
            }
        };
        let ((response, elapsed), ssl) = tokio::join!(self.timed_get(url), ssl_probe);

        match response {
            Ok(response) => {
                let code = response.status().as_u16();
                debug!(status_code = code, elapsed_ms = elapsed.as_millis() as u64, "HTTP probe done");
                classify_response(code, elapsed, ssl)
            }
            Err(e) => {
                debug!(error = %e, "HTTP probe failed");
                let mut result = classify_transport_error(&e, e.is_timeout(), secure);
                // Keep certificate metadata even when the request itself failed.
                if let Some(report) = ssl.filter(|r| r.expires_at.is_some()) {
                    result.ssl_expires_at = report.expires_at;
                    result.ssl_issuer = report.issuer;
                    result.ssl_days_left = report.days_left;
                    result.ssl_valid = Some(report.valid);
                }
                result
            }
        }
    }
}

/// Classify a completed HTTP exchange, folding in the certificate report.
pub fn classify_response(
    status_code: u16,
    elapsed: Duration,
    ssl: Option<SslReport>,
) -> WebsiteCheckResult {
    let online = (200..400).contains(&status_code);
    let mut error_message = if online {
        None
    } else {
        Some(format!("HTTP {}", status_code))
    };

    if let Some(report) = ssl.as_ref().filter(|r| !r.valid) {
        if let Some(reason) = &report.error {
            error_message = Some(match error_message {
                Some(http) => format!("{}; SSL: {}", http, reason),
                None => format!("SSL: {}", reason),
            });
        }
    }

    WebsiteCheckResult {
        status: if online {
            WebsiteStatus::Online
        } else {
            WebsiteStatus::Offline
        },
        response_time_ms: Some(elapsed.as_millis() as i64),
        status_code: Some(status_code),
        error_message,
        ssl_valid: ssl.as_ref().map(|r| r.valid),
        ssl_expires_at: ssl.as_ref().and_then(|r| r.expires_at),
        ssl_issuer: ssl.as_ref().and_then(|r| r.issuer.clone()),
        ssl_days_left: ssl.as_ref().and_then(|r| r.days_left),
    }
}

fn invalid_url(url: &str, reason: &str) -> WebsiteCheckResult {
    WebsiteCheckResult {
        status: WebsiteStatus::Error,
        response_time_ms: None,
        status_code: None,
        error_message: Some(format!("invalid URL {}: {}", url, reason)),
        ssl_valid: None,
        ssl_expires_at: None,
        ssl_issuer: None,
        ssl_days_left: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ssl(valid: bool, error: Option<&str>) -> SslReport {
        SslReport {
            valid,
            expires_at: Some(Utc::now()),
            issuer: Some("R3".to_string()),
            days_left: Some(12),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_success_codes_are_online() {
        for code in [200, 204, 301, 399] {
            let result = classify_response(code, Duration::from_millis(120), None);
            assert_eq!(result.status, WebsiteStatus::Online);
            assert_eq!(result.response_time_ms, Some(120));
            assert!(result.error_message.is_none());
            assert!(result.ssl_valid.is_none());
        }
    }

    #[test]
    fn test_error_codes_are_offline() {
        let result = classify_response(503, Duration::from_millis(80), None);
        assert_eq!(result.status, WebsiteStatus::Offline);
        assert_eq!(result.error_message.as_deref(), Some("HTTP 503"));
        assert_eq!(result.response_time_ms, Some(80));
        assert_eq!(result.status_code, Some(503));
    }

    #[test]
    fn test_invalid_certificate_annotates_without_demoting() {
        let result = classify_response(
            200,
            Duration::from_millis(50),
            Some(ssl(false, Some("certificate untrusted"))),
        );
        assert_eq!(result.status, WebsiteStatus::Online);
        assert_eq!(result.error_message.as_deref(), Some("SSL: certificate untrusted"));
        assert_eq!(result.ssl_valid, Some(false));
        assert_eq!(result.ssl_days_left, Some(12));
    }

    #[test]
    fn test_invalid_certificate_appends_to_http_error() {
        let result = classify_response(
            404,
            Duration::from_millis(50),
            Some(ssl(false, Some("certificate expired"))),
        );
        assert_eq!(
            result.error_message.as_deref(),
            Some("HTTP 404; SSL: certificate expired")
        );
    }

    #[test]
    fn test_valid_certificate_fields_copied() {
        let result = classify_response(200, Duration::from_millis(10), Some(ssl(true, None)));
        assert_eq!(result.ssl_valid, Some(true));
        assert_eq!(result.ssl_issuer.as_deref(), Some("R3"));
        assert!(result.error_message.is_none());
    }

    #[tokio::test]
    async fn test_malformed_url_is_error() {
        let checker =
            WebsiteChecker::new(Duration::from_secs(1), Duration::from_secs(1)).unwrap();
        let result = checker.check("not a url").await;
        assert_eq!(result.status, WebsiteStatus::Error);
        assert!(result.response_time_ms.is_none());
    }

    #[tokio::test]
    async fn test_refused_port_is_offline() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let checker =
            WebsiteChecker::new(Duration::from_secs(2), Duration::from_secs(1)).unwrap();
        let result = checker.check(&format!("http://127.0.0.1:{}/", port)).await;
        assert_eq!(result.status, WebsiteStatus::Offline);
        assert!(result.response_time_ms.is_none());
        assert!(result.status_code.is_none());
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn test_live_https_site() {
        let checker =
            WebsiteChecker::new(Duration::from_secs(10), Duration::from_secs(5)).unwrap();
        let result = checker.check("https://example.com").await;
        assert_eq!(result.status, WebsiteStatus::Online);
        assert_eq!(result.ssl_valid, Some(true));
    }
}
