//! Visitor Country Library
//!
//! This library resolves a website visitor's country from their IP address,
//! caches the answer in a cookie, and answers "is this visitor in country X?".
//! It provides the country table and validator, the geolocation client,
//! configuration, extension hooks and the resolution pipeline.

pub mod config;
pub mod countries;
pub mod error;
pub mod failure_log;
pub mod geo;
pub mod hooks;
pub mod request;
pub mod resolver;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use countries::{validate, CountryCode, CountryTable};
pub use error::{GeoError, Result};
pub use geo::{CountryLookup, IpLocateClient};
pub use hooks::{Hooks, LookupArgs, Source};
pub use request::{SimpleRequest, VisitorRequest};
pub use resolver::{Resolver, COOKIE_NAME, FORCE_PARAM, UNKNOWN_IP};
