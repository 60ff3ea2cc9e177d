//! Error Handling Module
//!
//! This module defines the error type shared by the country table, the
//! geolocation client and the resolution pipeline, using the `thiserror` crate.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("Invalid country code: {0:?}")]
    InvalidCountryCode(String),

    #[error("Malformed IP address: {0:?}")]
    MalformedIp(String),

    #[error("Unresolved lookup: {0}")]
    UnresolvedLookup(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, GeoError>;
