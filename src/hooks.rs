//! Extension Hooks Module
//!
//! Callers can adjust the pipeline at five points without touching its code.
//! Every hook is optional and acts as the identity function when unset.
use crate::config::DEFAULT_TIMEOUT_SECS;
use crate::countries::CountryCode;
use reqwest::header::HeaderMap;
use std::fmt;
use std::time::Duration;

/// Where a resolved country came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// `forcecountry` query parameter.
    Forced,
    /// Previously set country cookie.
    Cookie,
    /// Geolocation lookup or the default country.
    Calculated,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Forced => write!(f, "forced"),
            Source::Cookie => write!(f, "cookie"),
            Source::Calculated => write!(f, "calculated"),
        }
    }
}

/// Arguments for the outbound geolocation request.
#[derive(Debug, Clone)]
pub struct LookupArgs {
    pub timeout: Duration,
    pub headers: HeaderMap,
}

impl Default for LookupArgs {
    fn default() -> Self {
        LookupArgs {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            headers: HeaderMap::new(),
        }
    }
}

type ResolvedCountryFn = Box<dyn Fn(CountryCode, Source) -> CountryCode + Send + Sync>;
type CountryFromIpFn = Box<dyn Fn(Option<String>, &str) -> Option<String> + Send + Sync>;
type IpAddressFn = Box<dyn Fn(String) -> String + Send + Sync>;
type LookupArgsFn = Box<dyn Fn(LookupArgs) -> LookupArgs + Send + Sync>;
type ProviderCodeFn = Box<dyn Fn(String, &str) -> String + Send + Sync>;

/// Optional override callbacks, one per extension point.
#[derive(Default)]
pub struct Hooks {
    resolved_country: Option<ResolvedCountryFn>,
    country_from_ip: Option<CountryFromIpFn>,
    ip_address_for_user: Option<IpAddressFn>,
    lookup_request_args: Option<LookupArgsFn>,
    provider_country_code: Option<ProviderCodeFn>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Final say over every resolved country, tagged with its [`Source`].
    pub fn with_resolved_country<F>(mut self, f: F) -> Self
    where
        F: Fn(CountryCode, Source) -> CountryCode + Send + Sync + 'static,
    {
        self.resolved_country = Some(Box::new(f));
        self
    }

    /// Raw (unvalidated) country looked up for an IP; `None` means unresolved.
    pub fn with_country_from_ip<F>(mut self, f: F) -> Self
    where
        F: Fn(Option<String>, &str) -> Option<String> + Send + Sync + 'static,
    {
        self.country_from_ip = Some(Box::new(f));
        self
    }

    pub fn with_ip_address_for_user<F>(mut self, f: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        self.ip_address_for_user = Some(Box::new(f));
        self
    }

    pub fn with_lookup_request_args<F>(mut self, f: F) -> Self
    where
        F: Fn(LookupArgs) -> LookupArgs + Send + Sync + 'static,
    {
        self.lookup_request_args = Some(Box::new(f));
        self
    }

    /// `country_code` exactly as the provider returned it.
    pub fn with_provider_country_code<F>(mut self, f: F) -> Self
    where
        F: Fn(String, &str) -> String + Send + Sync + 'static,
    {
        self.provider_country_code = Some(Box::new(f));
        self
    }

    pub fn apply_resolved_country(&self, code: CountryCode, source: Source) -> CountryCode {
        match &self.resolved_country {
            Some(f) => f(code, source),
            None => code,
        }
    }

    pub fn apply_country_from_ip(&self, country: Option<String>, ip: &str) -> Option<String> {
        match &self.country_from_ip {
            Some(f) => f(country, ip),
            None => country,
        }
    }

    pub fn apply_ip_address_for_user(&self, ip: String) -> String {
        match &self.ip_address_for_user {
            Some(f) => f(ip),
            None => ip,
        }
    }

    pub fn apply_lookup_request_args(&self, args: LookupArgs) -> LookupArgs {
        match &self.lookup_request_args {
            Some(f) => f(args),
            None => args,
        }
    }

    pub fn apply_provider_country_code(&self, code: String, ip: &str) -> String {
        match &self.provider_country_code {
            Some(f) => f(code, ip),
            None => code,
        }
    }
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hooks")
            .field("resolved_country", &self.resolved_country.is_some())
            .field("country_from_ip", &self.country_from_ip.is_some())
            .field("ip_address_for_user", &self.ip_address_for_user.is_some())
            .field("lookup_request_args", &self.lookup_request_args.is_some())
            .field("provider_country_code", &self.provider_country_code.is_some())
            .finish()
    }
}
