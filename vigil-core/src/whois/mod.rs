mod client;
mod parser;
mod servers;

pub use client::WhoisClient;
pub use parser::{normalize_key, parse_date, WhoisRecord};
pub use servers::{get_whois_server, rdap_base_for, IANA_WHOIS_SERVER};
