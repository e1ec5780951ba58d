//! Layered configuration: defaults, then an optional TOML file, then
//! `VIGIL_*` environment variables.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{FixedOffset, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VigilError};
use crate::report::MIN_CHUNK_LIMIT;

/// Telegram's hard per-message ceiling.
pub const TRANSPORT_MESSAGE_LIMIT: usize = 4096;

/// Upper bound for day-valued settings; ten years.
const MAX_DAYS: i64 = 3650;

fn check_range(key: &str, value: i64, min: i64, max: i64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(VigilError::Config(format!(
            "{} must be between {} and {}, got {}",
            key, min, max, value
        )))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
    pub database_url: String,
    pub request_timeout_ms: u64,
    pub ssl_timeout_ms: u64,
    pub whois_timeout_ms: u64,
    pub whois_follow_depth: u8,
    pub rdap_timeout_ms: u64,
    pub website_tick_seconds: u64,
    /// Wall-clock time (`HH:MM`) of the daily domain cycle and reports.
    pub daily_run_at: String,
    pub utc_offset_minutes: i32,
    pub report_chunk_limit: usize,
    pub domain_check_retention: usize,
    pub expiry_warning_days: i64,
    pub reminder_interval_days: i64,
    pub metadata_refresh_hours: i64,
    pub command_polling: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            telegram_bot_token: None,
            telegram_api_base: "https://api.telegram.org".to_string(),
            database_url: "sqlite://vigil.db".to_string(),
            request_timeout_ms: 10_000,
            ssl_timeout_ms: 5_000,
            whois_timeout_ms: 15_000,
            whois_follow_depth: 3,
            rdap_timeout_ms: 10_000,
            website_tick_seconds: 60,
            daily_run_at: "09:00".to_string(),
            utc_offset_minutes: 0,
            report_chunk_limit: 4_000,
            domain_check_retention: 50,
            expiry_warning_days: 30,
            reminder_interval_days: 7,
            metadata_refresh_hours: 24,
            command_polling: true,
        }
    }
}

// Every key optional so file and environment can be merged field by field.
#[derive(Deserialize, Default, Debug)]
struct PartialConfig {
    telegram_bot_token: Option<String>,
    telegram_api_base: Option<String>,
    database_url: Option<String>,
    request_timeout_ms: Option<u64>,
    ssl_timeout_ms: Option<u64>,
    whois_timeout_ms: Option<u64>,
    whois_follow_depth: Option<u8>,
    rdap_timeout_ms: Option<u64>,
    website_tick_seconds: Option<u64>,
    daily_run_at: Option<String>,
    utc_offset_minutes: Option<i32>,
    report_chunk_limit: Option<usize>,
    domain_check_retention: Option<usize>,
    expiry_warning_days: Option<i64>,
    reminder_interval_days: Option<i64>,
    metadata_refresh_hours: Option<i64>,
    command_polling: Option<bool>,
}

impl PartialConfig {
    /// Fields set in `self` win over `other`.
    fn or(self, other: PartialConfig) -> PartialConfig {
        PartialConfig {
            telegram_bot_token: self.telegram_bot_token.or(other.telegram_bot_token),
            telegram_api_base: self.telegram_api_base.or(other.telegram_api_base),
            database_url: self.database_url.or(other.database_url),
            request_timeout_ms: self.request_timeout_ms.or(other.request_timeout_ms),
            ssl_timeout_ms: self.ssl_timeout_ms.or(other.ssl_timeout_ms),
            whois_timeout_ms: self.whois_timeout_ms.or(other.whois_timeout_ms),
            whois_follow_depth: self.whois_follow_depth.or(other.whois_follow_depth),
            rdap_timeout_ms: self.rdap_timeout_ms.or(other.rdap_timeout_ms),
            website_tick_seconds: self.website_tick_seconds.or(other.website_tick_seconds),
            daily_run_at: self.daily_run_at.or(other.daily_run_at),
            utc_offset_minutes: self.utc_offset_minutes.or(other.utc_offset_minutes),
            report_chunk_limit: self.report_chunk_limit.or(other.report_chunk_limit),
            domain_check_retention: self.domain_check_retention.or(other.domain_check_retention),
            expiry_warning_days: self.expiry_warning_days.or(other.expiry_warning_days),
            reminder_interval_days: self.reminder_interval_days.or(other.reminder_interval_days),
            metadata_refresh_hours: self.metadata_refresh_hours.or(other.metadata_refresh_hours),
            command_polling: self.command_polling.or(other.command_polling),
        }
    }

    fn into_config(self) -> Config {
        let d = Config::default();
        Config {
            telegram_bot_token: self.telegram_bot_token.filter(|t| !t.trim().is_empty()),
            telegram_api_base: self.telegram_api_base.unwrap_or(d.telegram_api_base),
            database_url: self.database_url.unwrap_or(d.database_url),
            request_timeout_ms: self.request_timeout_ms.unwrap_or(d.request_timeout_ms),
            ssl_timeout_ms: self.ssl_timeout_ms.unwrap_or(d.ssl_timeout_ms),
            whois_timeout_ms: self.whois_timeout_ms.unwrap_or(d.whois_timeout_ms),
            whois_follow_depth: self.whois_follow_depth.unwrap_or(d.whois_follow_depth),
            rdap_timeout_ms: self.rdap_timeout_ms.unwrap_or(d.rdap_timeout_ms),
            website_tick_seconds: self.website_tick_seconds.unwrap_or(d.website_tick_seconds),
            daily_run_at: self.daily_run_at.unwrap_or(d.daily_run_at),
            utc_offset_minutes: self.utc_offset_minutes.unwrap_or(d.utc_offset_minutes),
            report_chunk_limit: self.report_chunk_limit.unwrap_or(d.report_chunk_limit),
            domain_check_retention: self
                .domain_check_retention
                .unwrap_or(d.domain_check_retention),
            expiry_warning_days: self.expiry_warning_days.unwrap_or(d.expiry_warning_days),
            reminder_interval_days: self
                .reminder_interval_days
                .unwrap_or(d.reminder_interval_days),
            metadata_refresh_hours: self
                .metadata_refresh_hours
                .unwrap_or(d.metadata_refresh_hours),
            command_polling: self.command_polling.unwrap_or(d.command_polling),
        }
    }
}

impl Config {
    /// Load configuration. Environment (`VIGIL_*`, `.env` honoured) overrides
    /// the TOML file, which overrides built-in defaults. A missing file is not
    /// an error.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        dotenv::dotenv().ok();

        let file_config = match config_path {
            Some(path_str) => Self::read_file(Path::new(path_str))?,
            None => PartialConfig::default(),
        };

        let env_config: PartialConfig = envy::prefixed("VIGIL_")
            .from_env()
            .map_err(|e| VigilError::Config(format!("failed to read environment: {}", e)))?;

        let config = env_config.or(file_config).into_config();
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let partial: PartialConfig = toml::from_str(contents)
            .map_err(|e| VigilError::Config(format!("invalid TOML: {}", e)))?;
        let config = partial.into_config();
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<PartialConfig> {
        if !path.exists() {
            return Ok(PartialConfig::default());
        }
        let contents = fs::read_to_string(path).map_err(|e| {
            VigilError::Config(format!("failed to read config file at {:?}: {}", path, e))
        })?;
        toml::from_str(&contents).map_err(|e| {
            VigilError::Config(format!("failed to parse TOML at {:?}: {}", path, e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_CHUNK_LIMIT..TRANSPORT_MESSAGE_LIMIT).contains(&self.report_chunk_limit) {
            return Err(VigilError::Config(format!(
                "report_chunk_limit must be between {} and {}",
                MIN_CHUNK_LIMIT,
                TRANSPORT_MESSAGE_LIMIT - 1
            )));
        }
        if self.domain_check_retention == 0 {
            return Err(VigilError::Config(
                "domain_check_retention must be at least 1".to_string(),
            ));
        }
        if self.website_tick_seconds == 0 {
            return Err(VigilError::Config(
                "website_tick_seconds must be at least 1".to_string(),
            ));
        }
        check_range("expiry_warning_days", self.expiry_warning_days, 0, MAX_DAYS)?;
        check_range("reminder_interval_days", self.reminder_interval_days, 1, MAX_DAYS)?;
        check_range("metadata_refresh_hours", self.metadata_refresh_hours, 1, MAX_DAYS * 24)?;
        self.daily_time()?;
        self.utc_offset()?;
        Ok(())
    }

    pub fn daily_time(&self) -> Result<NaiveTime> {
        NaiveTime::parse_from_str(self.daily_run_at.trim(), "%H:%M").map_err(|_| {
            VigilError::Config(format!(
                "daily_run_at must be HH:MM, got {:?}",
                self.daily_run_at
            ))
        })
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            VigilError::Config(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn ssl_timeout(&self) -> Duration {
        Duration::from_millis(self.ssl_timeout_ms)
    }

    pub fn whois_timeout(&self) -> Duration {
        Duration::from_millis(self.whois_timeout_ms)
    }

    pub fn rdap_timeout(&self) -> Duration {
        Duration::from_millis(self.rdap_timeout_ms)
    }

    pub fn website_tick(&self) -> Duration {
        Duration::from_secs(self.website_tick_seconds)
    }
}
