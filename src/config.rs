//! Configuration Module
//!
//! This module reads configuration values from environment variables, provides
//! sensible defaults, and validates the lookup endpoint, timeout and default
//! country.

use crate::countries::CountryTable;
use anyhow::{Context, Result};
use reqwest::Url;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LOOKUP_URL: &str = "https://www.iplocate.io/api/lookup/";
pub const DEFAULT_COUNTRY: &str = "CA";
pub const DEFAULT_TIMEOUT_SECS: u64 = 3;

const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    /// Local IP override used instead of the request's address. Surrounding
    /// whitespace is trimmed and a blank value leaves it unset.
    pub ip_override: Option<String>,
    /// Lookup endpoint; always ends with `/` so the IP can be appended.
    pub lookup_url: String,
    pub lookup_timeout: Duration,
    pub default_country: String,
    pub cookie_path: String,
    pub cookie_domain: Option<String>,
    pub failure_log: Option<PathBuf>,
    pub failure_log_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            ip_override: None,
            lookup_url: DEFAULT_LOOKUP_URL.to_string(),
            lookup_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            default_country: DEFAULT_COUNTRY.to_string(),
            cookie_path: "/".to_string(),
            cookie_domain: None,
            failure_log: None,
            failure_log_interval: Duration::from_secs(60),
        }
    }
}

impl Config {
    /// Creates a new configuration by reading environment variables.
    /// If a variable is missing or empty, a default value is used.
    pub fn new() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Trim every value before checking for emptiness.
        let get = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let lookup_url = match get("VISITOR_COUNTRY_LOOKUP_URL") {
            Some(raw) => {
                // The IP is appended as the last path segment.
                let raw = if raw.ends_with('/') { raw } else { format!("{}/", raw) };
                Url::parse(&raw).context("Invalid lookup URL")?;
                raw
            }
            None => DEFAULT_LOOKUP_URL.to_string(),
        };

        let timeout_secs = get("VISITOR_COUNTRY_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        if timeout_secs == 0 || timeout_secs > MAX_TIMEOUT_SECS {
            return Err(anyhow::anyhow!(
                "Lookup timeout must be between 1 and {} seconds",
                MAX_TIMEOUT_SECS
            ));
        }

        let default_country = match get("VISITOR_COUNTRY_DEFAULT") {
            Some(code) => CountryTable::global()
                .validate(&code)
                .context("Invalid default country")?
                .to_string(),
            None => DEFAULT_COUNTRY.to_string(),
        };

        let failure_log_interval = get("VISITOR_COUNTRY_FAILURE_LOG_INTERVAL_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);

        Ok(Config {
            ip_override: get("VISITOR_COUNTRY_IP_OVERRIDE"),
            lookup_url,
            lookup_timeout: Duration::from_secs(timeout_secs),
            default_country,
            cookie_path: get("VISITOR_COUNTRY_COOKIE_PATH").unwrap_or_else(|| "/".to_string()),
            cookie_domain: get("VISITOR_COUNTRY_COOKIE_DOMAIN"),
            failure_log: get("VISITOR_COUNTRY_FAILURE_LOG").map(PathBuf::from),
            failure_log_interval: Duration::from_secs(failure_log_interval),
        })
    }
}
