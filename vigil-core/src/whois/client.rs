use std::collections::HashSet;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use super::parser::WhoisRecord;
use super::servers::{get_whois_server, IANA_WHOIS_SERVER};
use crate::error::{Result, VigilError};
use crate::validation::{normalize_domain, tld_of};

const WHOIS_PORT: u16 = 43;
const MAX_RESPONSE_SIZE: usize = 512 * 1024;

/// Port-43 WHOIS client with referral following.
#[derive(Debug, Clone)]
pub struct WhoisClient {
    timeout: Duration,
    follow_depth: u8,
}

impl Default for WhoisClient {
    fn default() -> Self {
        Self::new()
    }
}

impl WhoisClient {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            follow_depth: 3,
        }
    }

    /// Upper bound for the whole lookup, referrals included.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// How many referrals to follow after the first server.
    pub fn with_follow_depth(mut self, depth: u8) -> Self {
        self.follow_depth = depth;
        self
    }

    #[instrument(skip(self), fields(domain = %domain))]
    pub async fn lookup(&self, domain: &str) -> Result<WhoisRecord> {
        let domain = normalize_domain(domain)?;
        timeout(self.timeout, self.lookup_inner(&domain))
            .await
            .map_err(|_| {
                VigilError::Timeout(format!(
                    "WHOIS lookup for {} exceeded {}ms",
                    domain,
                    self.timeout.as_millis()
                ))
            })?
    }

    async fn lookup_inner(&self, domain: &str) -> Result<WhoisRecord> {
        let tld = tld_of(domain).ok_or_else(|| VigilError::InvalidDomain(domain.to_string()))?;

        let first_server = match get_whois_server(tld) {
            Some(server) => server.to_string(),
            None => self.discover_server(tld).await?,
        };

        let mut visited: HashSet<String> = HashSet::new();
        let mut server = first_server;
        let mut merged: Option<WhoisRecord> = None;
        let mut depth = 0u8;

        loop {
            visited.insert(server.clone());
            debug!(whois_server = %server, depth, "Querying WHOIS server");

            let raw = match self.query_server(&server, domain).await {
                Ok(raw) => raw,
                // A broken registrar server must not discard what the registry said.
                Err(e) if merged.is_some() => {
                    warn!(whois_server = %server, error = %e, "Referred WHOIS server failed");
                    break;
                }
                Err(e) => return Err(e),
            };

            let record = WhoisRecord::parse(domain, &server, &raw);
            let next = record.referral.clone();
            merged = Some(match merged {
                Some(previous) => merge(previous, record),
                None => record,
            });

            match next {
                Some(next) if visited.contains(&next) => {
                    debug!(referral = %next, "Ignoring already visited referral");
                    break;
                }
                Some(next) if depth < self.follow_depth => {
                    depth += 1;
                    server = next;
                }
                Some(next) => {
                    warn!(referral = %next, depth, "WHOIS referral depth exhausted");
                    break;
                }
                None => break,
            }
        }

        let record = merged
            .ok_or_else(|| VigilError::WhoisError(format!("no WHOIS response for {}", domain)))?;

        if record.is_empty() {
            debug!("WHOIS response carried no recognised registration fields");
        }
        Ok(record)
    }

    /// Ask the IANA root which server is authoritative for `tld`.
    async fn discover_server(&self, tld: &str) -> Result<String> {
        debug!(tld, "Discovering WHOIS server via IANA");
        let raw = self.query_server(IANA_WHOIS_SERVER, tld).await?;
        WhoisRecord::parse(tld, IANA_WHOIS_SERVER, &raw)
            .referral
            .ok_or_else(|| VigilError::WhoisServerNotFound(tld.to_string()))
    }

    async fn query_server(&self, server: &str, query: &str) -> Result<String> {
        let addr = format!("{}:{}", server, WHOIS_PORT);

        let mut stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| VigilError::WhoisError(format!("failed to connect to {}: {}", server, e)))?;

        stream
            .write_all(format!("{}\r\n", query).as_bytes())
            .await
            .map_err(|e| VigilError::WhoisError(format!("failed to send query to {}: {}", server, e)))?;

        let mut response = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream
                .read(&mut buf)
                .await
                .map_err(|e| VigilError::WhoisError(format!("read error from {}: {}", server, e)))?;
            if n == 0 {
                break;
            }
            response.extend_from_slice(&buf[..n]);
            if response.len() > MAX_RESPONSE_SIZE {
                return Err(VigilError::WhoisError(format!(
                    "response from {} too large",
                    server
                )));
            }
        }

        // Non-UTF-8 registries are read as Latin-1.
        Ok(match String::from_utf8(response) {
            Ok(text) => text,
            Err(e) => e.into_bytes().iter().map(|&b| b as char).collect(),
        })
    }
}

/// Prefer fields from the deeper (registrar) response, keeping registry data
/// where the registrar is silent.
fn merge(registry: WhoisRecord, registrar: WhoisRecord) -> WhoisRecord {
    WhoisRecord {
        domain: registrar.domain,
        whois_server: registrar.whois_server,
        expires_at: registrar.expires_at.or(registry.expires_at),
        registrar: registrar.registrar.or(registry.registrar),
        name_servers: if registrar.name_servers.is_empty() {
            registry.name_servers
        } else {
            registrar.name_servers
        },
        referral: registrar.referral,
    }
}
