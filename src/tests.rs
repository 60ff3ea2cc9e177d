//! Behavioural tests for the resolution pipeline.
//!
//! These run the pipeline against a counting stand-in for the geolocation
//! client, so they can assert exactly when the network would be used.
use crate::config::{Config, DEFAULT_COUNTRY};
use crate::countries::{validate, CountryTable};
use crate::error::{GeoError, Result};
use crate::geo::CountryLookup;
use crate::hooks::{Hooks, Source};
use crate::request::SimpleRequest;
use crate::resolver::{Resolver, COOKIE_NAME, FORCE_PARAM};
use std::cell::Cell;
use std::sync::{Arc, Mutex};

struct CountingLookup {
    answer: Option<&'static str>,
    calls: Cell<usize>,
}

impl CountingLookup {
    fn answering(code: &'static str) -> Self {
        CountingLookup {
            answer: Some(code),
            calls: Cell::new(0),
        }
    }

    fn failing() -> Self {
        CountingLookup {
            answer: None,
            calls: Cell::new(0),
        }
    }
}

impl CountryLookup for CountingLookup {
    fn lookup_country(&self, _ip: &str, _hooks: &Hooks) -> Result<String> {
        self.calls.set(self.calls.get() + 1);
        self.answer
            .map(str::to_string)
            .ok_or_else(|| GeoError::UnresolvedLookup("timeout".to_string()))
    }
}

fn visitor() -> SimpleRequest {
    SimpleRequest::new().with_remote_addr("8.8.8.8")
}

#[test]
fn test_valid_forced_country_takes_precedence() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("US");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor()
        .with_query_param(FORCE_PARAM, " de ")
        .with_cookie(COOKIE_NAME, "FR");
    assert_eq!(resolver.resolve_visitor_country(&mut request, "CA").unwrap(), "DE");
    assert_eq!(lookup.calls.get(), 0);
    assert!(request.set_cookies().is_empty(), "forced values are never cached");
}

#[test]
fn test_invalid_forced_country_short_circuits() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("US");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor()
        .with_query_param(FORCE_PARAM, "zz")
        .with_cookie(COOKIE_NAME, "US");
    let err = resolver.resolve_visitor_country(&mut request, "CA").unwrap_err();
    assert!(matches!(err, GeoError::InvalidCountryCode(ref c) if c == "zz"));
    assert!(!resolver.is_visitor_in(&mut request, "US", "CA"));
    assert_eq!(lookup.calls.get(), 0);
    assert!(request.set_cookies().is_empty());
}

#[test]
fn test_valid_cookie_skips_network() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("US");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor().with_cookie(COOKIE_NAME, "AU");
    assert_eq!(resolver.resolve_visitor_country(&mut request, "CA").unwrap(), "AU");
    assert_eq!(lookup.calls.get(), 0);
    assert!(request.set_cookies().is_empty());
}

#[test]
fn test_failed_lookup_uses_default_and_caches_it() {
    let table = CountryTable::load();
    let lookup = CountingLookup::failing();
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor();
    assert_eq!(resolver.resolve_visitor_country(&mut request, DEFAULT_COUNTRY).unwrap(), "CA");
    assert_eq!(lookup.calls.get(), 1);
    assert_eq!(request.set_cookies().len(), 1);
    assert_eq!(request.set_cookies()[0].value(), "CA");
}

#[test]
fn test_invalid_default_is_rejected() {
    let table = CountryTable::load();
    let lookup = CountingLookup::failing();
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor();
    assert!(resolver.resolve_visitor_country(&mut request, "XX").is_err());
    assert!(request.set_cookies().is_empty());
}

#[test]
fn test_unknown_provider_code_is_invalid() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("EU");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut request = visitor();
    let err = resolver.resolve_visitor_country(&mut request, "CA").unwrap_err();
    assert!(matches!(err, GeoError::InvalidCountryCode(_)));
    assert!(request.set_cookies().is_empty());
}

#[test]
fn test_lookup_result_is_cached_in_cookie() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("us");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut first = visitor();
    assert_eq!(resolver.resolve_visitor_country(&mut first, "CA").unwrap(), "US");
    let header = first.set_cookie_headers().remove(0);
    assert!(header.starts_with("blm_country_code=US"));

    // The browser sends the cookie back on the next page load.
    let mut second = SimpleRequest::from_parts("", Some("blm_country_code=US"), Some("8.8.8.8"));
    assert_eq!(resolver.resolve_visitor_country(&mut second, "CA").unwrap(), "US");
    assert_eq!(lookup.calls.get(), 1);
}

#[test]
fn test_membership_check() {
    let table = CountryTable::load();
    let config = Config::default();
    let hooks = Hooks::new();

    let us = CountingLookup::answering("US");
    let resolver = Resolver::new(&table, &us, &config, &hooks);
    assert!(resolver.is_visitor_in(&mut visitor(), "US", "CA"));
    assert!(!resolver.is_visitor_in(&mut visitor(), "us", "CA"));
    assert!(!resolver.is_visitor_in(&mut visitor(), "CA", "CA"));

    let failing = CountingLookup::failing();
    let resolver = Resolver::new(&table, &failing, &config, &hooks);
    assert!(!resolver.is_visitor_in(&mut visitor(), "US", "CA"));
    assert!(resolver.is_visitor_in(&mut visitor(), "CA", "CA"));
    assert!(resolver.is_in(&mut visitor(), "CA"));
}

#[test]
fn test_resolved_country_hook_sees_source() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("US");
    let config = Config::default();
    let sources = Arc::new(Mutex::new(Vec::new()));
    let seen = sources.clone();
    let hooks = Hooks::new().with_resolved_country(move |code, source| {
        seen.lock().unwrap().push(source);
        if source == Source::Calculated && code == "US" {
            validate("PR").unwrap()
        } else {
            code
        }
    });
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    let mut forced = visitor().with_query_param(FORCE_PARAM, "it");
    let mut cached = visitor().with_cookie(COOKIE_NAME, "IT");
    let mut calculated = visitor();
    assert_eq!(resolver.resolve(&mut forced).unwrap(), "IT");
    assert_eq!(resolver.resolve(&mut cached).unwrap(), "IT");
    assert_eq!(resolver.resolve(&mut calculated).unwrap(), "PR");
    // The cookie holds the value before the hook ran.
    assert_eq!(calculated.set_cookies()[0].value(), "US");

    assert_eq!(
        *sources.lock().unwrap(),
        vec![Source::Forced, Source::Cookie, Source::Calculated]
    );
}

#[test]
fn test_resolved_codes_are_table_keys() {
    let table = CountryTable::load();
    let config = Config::default();
    let hooks = Hooks::new();
    for answer in ["us", "Gb", "nz", "ZA"] {
        let lookup = CountingLookup::answering(answer);
        let resolver = Resolver::new(&table, &lookup, &config, &hooks);
        let code = resolver.resolve(&mut visitor()).unwrap();
        assert!(table.code_to_country().contains_key(&code));
        assert_eq!(code.as_str(), answer.to_uppercase());
    }
}

#[test]
fn test_non_ascii_forced_country_is_rejected() {
    let table = CountryTable::load();
    let lookup = CountingLookup::answering("US");
    let config = Config::default();
    let hooks = Hooks::new();
    let resolver = Resolver::new(&table, &lookup, &config, &hooks);

    // Dotless i and the "fi" ligature would uppercase to IT and FI under
    // full Unicode case mapping.
    for query in ["forcecountry=%C4%B1t", "forcecountry=%EF%AC%81"] {
        let mut request = SimpleRequest::from_parts(query, None, Some("8.8.8.8"));
        let err = resolver.resolve(&mut request).unwrap_err();
        assert!(matches!(err, GeoError::InvalidCountryCode(_)), "{} resolved", query);
        assert!(request.set_cookies().is_empty());
    }
    assert_eq!(lookup.calls.get(), 0);
}
