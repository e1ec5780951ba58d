pub mod alerts;
pub mod colors;
pub mod commands;
pub mod config;
pub mod domain;
pub mod error;
pub mod models;
pub mod monitor;
pub mod netinfo;
pub mod notify;
pub mod output;
pub mod rdap;
pub mod report;
pub mod retry;
pub mod scheduler;
pub mod status;
pub mod store;
pub mod validation;
pub mod whois;

pub use config::Config;
pub use error::{Result, VigilError};
pub use validation::{extract_domain, normalize_domain};

pub use models::{
    DomainCheck, DomainCheckResult, DomainStatus, MonitoredDomain, MonitoredWebsite, NewDomain,
    NewWebsite, User, WebsiteCheck, WebsiteCheckResult, WebsiteStatus,
};

pub use commands::{run_polling, CommandDispatcher};
pub use domain::{DomainChecker, DomainProbe};
pub use monitor::{CycleSummary, Monitor, MonitorSettings};
pub use netinfo::{HostInfoClient, HostLookup};
pub use notify::{DisabledNotifier, Notifier, TelegramNotifier};
pub use report::{ReportKind, Reporter};
pub use scheduler::Scheduler;
pub use status::{WebsiteChecker, WebsiteProbe};
pub use store::{open_store, MemoryStore, SqliteStore, Store};

pub use output::{get_formatter, OutputFormat, OutputFormatter};
