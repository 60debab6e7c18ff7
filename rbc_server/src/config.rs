//! Environment-driven runtime configuration.

use std::env;
use std::time::Duration;

use thiserror::Error;

use rbc_core::collection_client::{
    DEFAULT_BASE_URL, DEFAULT_SCHEDULE_PATH, DEFAULT_START_HOUR, DEFAULT_TIMEZONE,
};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_USER_AGENT: &str = "redbridge-bin-calendar/1.0";
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const CALENDAR_NAME: &str = "Redbridge Collections";
const CALENDAR_DESCRIPTION: &str = "Household waste & recycling (scraped)";

/// Errors raised while reading the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("{key} is required")]
    Missing {
        /// Variable name.
        key: &'static str,
    },

    /// A numeric variable did not parse.
    #[error("invalid integer for {key}: {value:?}")]
    InvalidInt {
        /// Variable name.
        key: &'static str,
        /// Rejected raw value.
        value: String,
    },

    /// START_HOUR lies outside a day.
    #[error("START_HOUR must be between 0 and 23")]
    StartHourRange,
}

/// Runtime configuration assembled from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: String,
    pub base_url: String,
    pub schedule_path: String,
    pub uprn: String,
    pub address_line: String,
    pub postcode: String,
    pub latitude: String,
    pub longitude: String,
    pub cache_ttl: Duration,
    pub start_hour: u32,
    pub user_agent: String,
    pub request_timeout: Duration,
    pub timezone: String,
    pub calendar_name: String,
    pub calendar_description: String,
}

/// Build the configuration from environment variables, applying defaults.
///
/// # Errors
///
/// Returns a [`ConfigError`] when `UPRN` is missing or a numeric variable
/// is malformed or out of range.
pub fn load() -> Result<Config, ConfigError> {
    let cache_ttl = read_seconds("CACHE_TTL_SECONDS", DEFAULT_CACHE_TTL)?;
    let request_timeout = read_seconds("SCRAPE_TIMEOUT_SECONDS", DEFAULT_REQUEST_TIMEOUT)?;

    let start_hour = read_u32("START_HOUR", DEFAULT_START_HOUR)?;
    if start_hour > 23 {
        return Err(ConfigError::StartHourRange);
    }

    let uprn = env::var("UPRN").unwrap_or_default();
    if uprn.is_empty() {
        return Err(ConfigError::Missing { key: "UPRN" });
    }

    Ok(Config {
        listen_addr: get_env("LISTEN_ADDR", DEFAULT_LISTEN_ADDR),
        base_url: get_env("BASE_URL", DEFAULT_BASE_URL)
            .trim_end_matches('/')
            .to_string(),
        schedule_path: ensure_path(&get_env("SCHEDULE_PATH", DEFAULT_SCHEDULE_PATH)),
        uprn,
        address_line: env::var("ADDRESS_LINE").unwrap_or_default(),
        postcode: env::var("POSTCODE").unwrap_or_default(),
        latitude: env::var("LATITUDE").unwrap_or_default(),
        longitude: env::var("LONGITUDE").unwrap_or_default(),
        cache_ttl,
        start_hour,
        user_agent: get_env("USER_AGENT", DEFAULT_USER_AGENT),
        request_timeout,
        timezone: DEFAULT_TIMEZONE.to_string(),
        calendar_name: CALENDAR_NAME.to_string(),
        calendar_description: CALENDAR_DESCRIPTION.to_string(),
    })
}

fn get_env(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value,
        _ => fallback.to_string(),
    }
}

fn read_seconds(key: &'static str, fallback: Duration) -> Result<Duration, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|_invalid| ConfigError::InvalidInt { key, value }),
        _ => Ok(fallback),
    }
}

fn read_u32(key: &'static str, fallback: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => value
            .parse::<u32>()
            .map_err(|_invalid| ConfigError::InvalidInt { key, value }),
        _ => Ok(fallback),
    }
}

fn ensure_path(path: &str) -> String {
    if path.is_empty() || path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}
