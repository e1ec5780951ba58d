//! Website health checking
//!
//! - HTTP liveness with status-code classification
//! - TLS certificate inspection (expiry, issuer, trust)
//! - Mapping of transport failures onto OFFLINE / ERROR

mod classify;
mod ssl;
mod website;

pub use classify::{classify_transport_error, error_chain_text, SslFailure};
pub use ssl::{assess, CertificateFacts, SslInspector, SslReport, SslWarningLevel, Trust};
pub use website::{classify_response, WebsiteChecker, WebsiteProbe};
