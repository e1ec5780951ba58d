//! Mapping of transport-level failures onto website statuses.

use std::error::Error as StdError;
use std::io;

use crate::models::{WebsiteCheckResult, WebsiteStatus};

/// User-facing certificate failure reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SslFailure {
    Expired,
    NotYetValid,
    Untrusted,
    HostnameMismatch,
    CertificateProblem,
    Generic,
}

impl SslFailure {
    pub fn reason(&self) -> &'static str {
        match self {
            SslFailure::Expired => "certificate expired",
            SslFailure::NotYetValid => "certificate not yet valid",
            SslFailure::Untrusted => "certificate untrusted",
            SslFailure::HostnameMismatch => "certificate does not match domain",
            SslFailure::CertificateProblem => "certificate problem",
            SslFailure::Generic => "SSL error",
        }
    }

    /// Recognize a TLS failure from the (lower-cased) error text, if it is one.
    pub fn from_message(text: &str) -> Option<Self> {
        let text = text.to_lowercase();
        let tls_related = ["certificate", "ssl", "tls", "handshake", "x509"]
            .iter()
            .any(|needle| text.contains(needle));
        if !tls_related {
            return None;
        }

        let failure = if text.contains("expired") {
            SslFailure::Expired
        } else if text.contains("not yet valid") {
            SslFailure::NotYetValid
        } else if text.contains("hostname mismatch")
            || text.contains("does not match")
            || text.contains("not valid for")
        {
            SslFailure::HostnameMismatch
        } else if text.contains("self signed")
            || text.contains("self-signed")
            || text.contains("unable to get local issuer")
            || text.contains("unable to get issuer")
            || text.contains("unable to verify")
            || text.contains("unknown issuer")
            || text.contains("untrusted")
        {
            SslFailure::Untrusted
        } else if text.contains("certificate") {
            SslFailure::CertificateProblem
        } else {
            SslFailure::Generic
        };
        Some(failure)
    }
}

/// Connection-level conditions that mean "the site is down".
fn offline_reason(kind: io::ErrorKind) -> Option<&'static str> {
    match kind {
        io::ErrorKind::TimedOut => Some("connection timed out"),
        io::ErrorKind::ConnectionRefused => Some("connection refused"),
        io::ErrorKind::ConnectionReset => Some("connection reset"),
        io::ErrorKind::ConnectionAborted => Some("connection aborted"),
        io::ErrorKind::HostUnreachable => Some("host unreachable"),
        io::ErrorKind::NetworkUnreachable => Some("network unreachable"),
        _ => None,
    }
}

const OFFLINE_TEXT: &[(&str, &str)] = &[
    ("timed out", "connection timed out"),
    ("timeout", "connection timed out"),
    ("connection refused", "connection refused"),
    ("connection reset", "connection reset"),
    ("connection aborted", "connection aborted"),
    ("host unreachable", "host unreachable"),
    ("no route to host", "host unreachable"),
    ("network unreachable", "network unreachable"),
    ("network is unreachable", "network unreachable"),
];

/// Every message in the `source()` chain, outermost first, joined by ": ".
pub fn error_chain_text(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(inner) = current {
        let text = inner.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = inner.source();
    }
    parts.join(": ")
}

fn io_kind(err: &(dyn StdError + 'static)) -> Option<io::ErrorKind> {
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = current {
        if let Some(io_err) = e.downcast_ref::<io::Error>() {
            return Some(io_err.kind());
        }
        current = e.source();
    }
    None
}

/// Classify a request that never produced an HTTP response.
///
/// `timed_out` comes from the HTTP client itself; `secure` tells whether the
/// target uses https, which is the only case certificate reasons apply to.
pub fn classify_transport_error(
    err: &(dyn StdError + 'static),
    timed_out: bool,
    secure: bool,
) -> WebsiteCheckResult {
    let text = error_chain_text(err);
    let lower = text.to_lowercase();

    let offline = if timed_out {
        Some("connection timed out")
    } else {
        io_kind(err).and_then(offline_reason).or_else(|| {
            OFFLINE_TEXT
                .iter()
                .find(|(needle, _)| lower.contains(needle))
                .map(|(_, reason)| *reason)
        })
    };

    let ssl = if secure { SslFailure::from_message(&lower) } else { None };

    let error_message = match (ssl, offline) {
        (Some(failure), _) => format!("SSL: {}", failure.reason()),
        (None, Some(reason)) => format!("site unreachable ({})", reason),
        (None, None) => text,
    };

    WebsiteCheckResult {
        status: if offline.is_some() {
            WebsiteStatus::Offline
        } else {
            WebsiteStatus::Error
        },
        response_time_ms: None,
        status_code: None,
        error_message: Some(error_message),
        ssl_valid: ssl.map(|_| false),
        ssl_expires_at: None,
        ssl_issuer: None,
        ssl_days_left: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug)]
    struct Wrapped {
        msg: &'static str,
        inner: Option<io::Error>,
    }

    impl fmt::Display for Wrapped {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.msg)
        }
    }

    impl StdError for Wrapped {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            self.inner.as_ref().map(|e| e as &(dyn StdError + 'static))
        }
    }

    #[test]
    fn test_refused_connection_is_offline() {
        let err = Wrapped {
            msg: "error sending request",
            inner: Some(io::Error::new(io::ErrorKind::ConnectionRefused, "os error 111")),
        };
        let result = classify_transport_error(&err, false, false);
        assert_eq!(result.status, WebsiteStatus::Offline);
        assert_eq!(
            result.error_message.as_deref(),
            Some("site unreachable (connection refused)")
        );
        assert!(result.response_time_ms.is_none());
        assert!(result.ssl_valid.is_none());
    }

    #[test]
    fn test_client_timeout_is_offline() {
        let err = io::Error::new(io::ErrorKind::Other, "operation did not complete");
        let result = classify_transport_error(&err, true, true);
        assert_eq!(result.status, WebsiteStatus::Offline);
    }

    #[test]
    fn test_dns_failure_is_error() {
        let err = Wrapped {
            msg: "error sending request: dns error: failed to lookup address information",
            inner: None,
        };
        let result = classify_transport_error(&err, false, false);
        assert_eq!(result.status, WebsiteStatus::Error);
        assert!(result.error_message.unwrap().contains("dns error"));
    }

    #[test]
    fn test_expired_certificate_on_https() {
        let err = Wrapped {
            msg: "error:0A000086:SSL routines::certificate verify failed: (certificate has expired)",
            inner: None,
        };
        let result = classify_transport_error(&err, false, true);
        assert_eq!(result.status, WebsiteStatus::Error);
        assert_eq!(result.error_message.as_deref(), Some("SSL: certificate expired"));
        assert_eq!(result.ssl_valid, Some(false));
    }

    #[test]
    fn test_ssl_reason_mapping() {
        assert_eq!(
            SslFailure::from_message("certificate verify failed: (self-signed certificate)"),
            Some(SslFailure::Untrusted)
        );
        assert_eq!(
            SslFailure::from_message("certificate verify failed: (Hostname mismatch)"),
            Some(SslFailure::HostnameMismatch)
        );
        assert_eq!(
            SslFailure::from_message("bad certificate extension"),
            Some(SslFailure::CertificateProblem)
        );
        assert_eq!(
            SslFailure::from_message("tls handshake eof"),
            Some(SslFailure::Generic)
        );
        assert_eq!(SslFailure::from_message("connection refused"), None);
    }

    #[test]
    fn test_chain_text_skips_repeats() {
        let err = Wrapped {
            msg: "outer: refused",
            inner: Some(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
        };
        assert_eq!(error_chain_text(&err), "outer: refused");
    }
}
