mod client;
mod types;

pub use client::RdapClient;
pub use types::{RdapDomain, RdapEntity, RdapEvent, RdapNameserver};
