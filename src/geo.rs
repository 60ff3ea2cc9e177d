//! Geolocation Module
//!
//! This module looks up the country of an IP address using the IPLocate HTTP
//! API. Lookups are best effort: one attempt with a short timeout, and every
//! failure is reported to the caller as an error so it can fall back to a
//! default country.
use crate::config::Config;
use crate::error::{GeoError, Result};
use crate::failure_log::FailureLog;
use crate::hooks::{Hooks, LookupArgs};
use anyhow::Context;
use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use reqwest::Url;
use serde_json::Value;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Anything that can turn an IP address into a raw country code.
pub trait CountryLookup {
    /// Returns the provider's `country_code` for `ip`, unvalidated.
    fn lookup_country(&self, ip: &str, hooks: &Hooks) -> Result<String>;
}

/// Blocking client for `GET <base_url><ip>`.
#[derive(Debug)]
pub struct IpLocateClient {
    client: Client,
    base_url: String,
    timeout: Duration,
    failure_log: Option<FailureLog>,
}

impl IpLocateClient {
    /// Creates a client for the given endpoint. The IP is appended to
    /// `base_url` as the last path segment.
    pub fn new(base_url: impl AsRef<str>, timeout: Duration) -> anyhow::Result<Self> {
        let mut base_url = base_url.as_ref().trim().to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Url::parse(&base_url).context("Invalid lookup URL")?;
        let client = Client::builder()
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url,
            timeout,
            failure_log: None,
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = Self::new(&config.lookup_url, config.lookup_timeout)?;
        Ok(match &config.failure_log {
            Some(path) => client.with_failure_log(FailureLog::new(path, config.failure_log_interval)),
            None => client,
        })
    }

    pub fn with_failure_log(mut self, log: FailureLog) -> Self {
        self.failure_log = Some(log);
        self
    }

    fn fetch(&self, url: &str, args: LookupArgs) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(args.timeout)
            .headers(args.headers)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeoError::UnresolvedLookup(format!("HTTP {}", status.as_u16())));
        }
        Ok(response.text()?)
    }

    fn report_failure(&self, ip: &str, err: &GeoError) {
        warn!("Geolocation lookup failed for IP {}: {}", ip, err);
        if let Some(log) = &self.failure_log {
            if let Err(e) = log.record(ip, &err.to_string()) {
                warn!("Could not write failure log {}: {}", log.path().display(), e);
            }
        }
    }
}

impl CountryLookup for IpLocateClient {
    fn lookup_country(&self, ip: &str, hooks: &Hooks) -> Result<String> {
        if ip.is_empty() {
            return Err(GeoError::UnresolvedLookup("empty IP address".to_string()));
        }
        if ip.parse::<IpAddr>().is_err() {
            return Err(GeoError::MalformedIp(ip.to_string()));
        }

        let url = format!("{}{}", self.base_url, ip);
        let args = hooks.apply_lookup_request_args(LookupArgs {
            timeout: self.timeout,
            headers: HeaderMap::new(),
        });

        let body = self.fetch(&url, args).inspect_err(|e| self.report_failure(ip, e))?;
        let country_code = match extract_country_code(&body) {
            Ok(Some(code)) => code,
            Ok(None) => {
                // Private and reserved ranges come back with a null country.
                debug!("No country_code in lookup response for IP {}", ip);
                return Err(GeoError::UnresolvedLookup("missing country_code".to_string()));
            }
            Err(e) => {
                self.report_failure(ip, &e);
                return Err(e);
            }
        };

        info!("Successful geolocation lookup for IP: {}", ip);
        Ok(hooks.apply_provider_country_code(country_code, ip))
    }
}

/// Pulls `country_code` out of a lookup response body.
///
/// `Ok(None)` when the field is absent or null. Any other non-string value is
/// returned in its JSON form and left for validation to reject.
fn extract_country_code(body: &str) -> Result<Option<String>> {
    let value: Value = serde_json::from_str(body)?;
    let object = value
        .as_object()
        .ok_or_else(|| GeoError::UnresolvedLookup("response is not a JSON object".to_string()))?;
    Ok(match object.get("country_code") {
        None | Some(Value::Null) => None,
        Some(Value::String(code)) => Some(code.clone()),
        Some(other) => Some(other.to_string()),
    })
}
