//! Resolution Module
//!
//! Decides the visitor's country for one request. The first satisfied source
//! wins:
//!
//! 1. a `forcecountry` query parameter (an invalid value ends resolution),
//! 2. a valid `blm_country_code` cookie from an earlier request,
//! 3. a geolocation lookup of the visitor's IP, falling back to the default
//!    country, after which the cookie is set.
//!
//! At most one lookup happens per call and none when steps 1 or 2 apply.
use crate::config::Config;
use crate::countries::{CountryCode, CountryTable};
use crate::error::Result;
use crate::geo::CountryLookup;
use crate::hooks::{Hooks, Source};
use crate::request::{sanitize_text_field, VisitorRequest};
use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use tracing::{debug, info};

pub const COOKIE_NAME: &str = "blm_country_code";
pub const FORCE_PARAM: &str = "forcecountry";
/// Reported when the visitor's address is unavailable.
pub const UNKNOWN_IP: &str = "0.0.0.0";

/// Borrows everything one resolution needs. Cheap to build per request.
pub struct Resolver<'a> {
    table: &'a CountryTable,
    lookup: &'a dyn CountryLookup,
    config: &'a Config,
    hooks: &'a Hooks,
}

impl<'a> Resolver<'a> {
    pub fn new(
        table: &'a CountryTable,
        lookup: &'a dyn CountryLookup,
        config: &'a Config,
        hooks: &'a Hooks,
    ) -> Self {
        Resolver {
            table,
            lookup,
            config,
            hooks,
        }
    }

    /// True iff the visitor resolves to exactly `target_code`.
    ///
    /// The comparison is case-sensitive and any invalid resolution is `false`.
    pub fn is_visitor_in<R>(&self, request: &mut R, target_code: &str, default_code: &str) -> bool
    where
        R: VisitorRequest + ?Sized,
    {
        match self.resolve_visitor_country(request, default_code) {
            Ok(code) => code.as_str() == target_code,
            Err(_) => false,
        }
    }

    /// [`Resolver::is_visitor_in`] with the configured default country.
    pub fn is_in<R>(&self, request: &mut R, target_code: &str) -> bool
    where
        R: VisitorRequest + ?Sized,
    {
        self.is_visitor_in(request, target_code, &self.config.default_country)
    }

    /// Resolves the visitor's country.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GeoError::InvalidCountryCode`] when a forced country is
    /// invalid, or when neither the lookup result nor `default_code` is a
    /// known code. Lookup failures never surface here.
    pub fn resolve_visitor_country<R>(&self, request: &mut R, default_code: &str) -> Result<CountryCode>
    where
        R: VisitorRequest + ?Sized,
    {
        if let Some(raw) = request.query_param(FORCE_PARAM) {
            let forced = sanitize_text_field(&raw);
            let code = self.table.validate(&forced).inspect_err(|_| {
                info!("Rejecting invalid forced country {:?}", forced);
            })?;
            debug!("Using forced country {}", code);
            return Ok(self.hooks.apply_resolved_country(code, Source::Forced));
        }

        if let Some(cached) = request.cookie(COOKIE_NAME) {
            if let Ok(code) = self.table.validate(&cached) {
                debug!("Using country {} from cookie", code);
                return Ok(self.hooks.apply_resolved_country(code, Source::Cookie));
            }
            debug!("Ignoring invalid country cookie {:?}", cached);
        }

        let country = self
            .country_of_visitor_from_ip(&*request)
            .unwrap_or_else(|| default_code.to_string());
        let code = self.table.validate(&country)?;

        request.set_cookie(self.country_cookie(code));
        debug!("Calculated country {}", code);
        Ok(self.hooks.apply_resolved_country(code, Source::Calculated))
    }

    /// [`Resolver::resolve_visitor_country`] with the configured default country.
    pub fn resolve<R>(&self, request: &mut R) -> Result<CountryCode>
    where
        R: VisitorRequest + ?Sized,
    {
        self.resolve_visitor_country(request, &self.config.default_country)
    }

    /// Looks up the raw country for the visitor's IP. `None` when the lookup
    /// could not resolve it.
    pub fn country_of_visitor_from_ip<R>(&self, request: &R) -> Option<String>
    where
        R: VisitorRequest + ?Sized,
    {
        let ip = self.current_visitor_ip(request);
        let country = self.lookup.lookup_country(&ip, self.hooks).ok();
        self.hooks.apply_country_from_ip(country, &ip)
    }

    /// The configured IP override, else the request's remote address, else
    /// [`UNKNOWN_IP`].
    pub fn current_visitor_ip<R>(&self, request: &R) -> String
    where
        R: VisitorRequest + ?Sized,
    {
        let ip = self
            .config
            .ip_override
            .clone()
            .or_else(|| request.remote_addr())
            .unwrap_or_else(|| UNKNOWN_IP.to_string());
        self.hooks.apply_ip_address_for_user(ip)
    }

    fn country_cookie(&self, code: CountryCode) -> Cookie<'static> {
        let mut cookie = Cookie::new(COOKIE_NAME, code.as_str());
        cookie.set_path(self.config.cookie_path.clone());
        if let Some(domain) = &self.config.cookie_domain {
            cookie.set_domain(domain.clone());
        }
        cookie.set_max_age(Duration::days(1));
        cookie.set_expires(OffsetDateTime::now_utc() + Duration::days(1));
        cookie
    }
}
