//! Request Module
//!
//! The resolution pipeline never talks to a web framework directly. It reads
//! query parameters, cookies and the remote address through [`VisitorRequest`]
//! and hands back the cookie it wants set. [`SimpleRequest`] is an in-memory
//! implementation built from raw header values.
use cookie::Cookie;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use tracing::debug;

lazy_static! {
    static ref SCRIPT_OR_STYLE: Regex = Regex::new(r"(?is)<(script|style)[^>]*?>.*?</(script|style)>").unwrap();
    static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
    static ref OCTET: Regex = Regex::new(r"%[a-fA-F0-9]{2}").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"[\r\n\t ]+").unwrap();
}

/// The parts of an incoming HTTP request the pipeline needs.
pub trait VisitorRequest {
    fn query_param(&self, name: &str) -> Option<String>;
    fn cookie(&self, name: &str) -> Option<String>;
    /// Transport-layer peer address, if known.
    fn remote_addr(&self) -> Option<String>;
    /// Queues a cookie for the response.
    fn set_cookie(&mut self, cookie: Cookie<'static>);
}

#[derive(Debug, Clone, Default)]
pub struct SimpleRequest {
    query: HashMap<String, String>,
    cookies: HashMap<String, String>,
    remote_addr: Option<String>,
    outgoing: Vec<Cookie<'static>>,
}

impl SimpleRequest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a request from a raw query string, an optional `Cookie` header
    /// and the peer address. Unparseable cookie pairs are skipped.
    pub fn from_parts(query: &str, cookie_header: Option<&str>, remote_addr: Option<&str>) -> Self {
        let query = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let mut cookies = HashMap::new();
        if let Some(header) = cookie_header {
            for parsed in Cookie::split_parse(header) {
                match parsed {
                    Ok(c) => {
                        cookies.insert(c.name().to_string(), c.value().to_string());
                    }
                    Err(e) => debug!("Skipping malformed cookie pair: {}", e),
                }
            }
        }

        SimpleRequest {
            query,
            cookies,
            remote_addr: remote_addr.map(str::to_string),
            outgoing: Vec::new(),
        }
    }

    pub fn with_query_param(mut self, name: &str, value: &str) -> Self {
        self.query.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_cookie(mut self, name: &str, value: &str) -> Self {
        self.cookies.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_remote_addr(mut self, addr: &str) -> Self {
        self.remote_addr = Some(addr.to_string());
        self
    }

    /// Cookies queued by the pipeline, in order.
    pub fn set_cookies(&self) -> &[Cookie<'static>] {
        &self.outgoing
    }

    /// `Set-Cookie` header values for the queued cookies.
    pub fn set_cookie_headers(&self) -> Vec<String> {
        self.outgoing.iter().map(|c| c.to_string()).collect()
    }
}

impl VisitorRequest for SimpleRequest {
    fn query_param(&self, name: &str) -> Option<String> {
        self.query.get(name).cloned()
    }

    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.get(name).cloned()
    }

    fn remote_addr(&self) -> Option<String> {
        self.remote_addr.clone()
    }

    fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.outgoing.push(cookie);
    }
}

/// Reduces user input to a single line of plain text: markup and
/// percent-encoded octets are removed, whitespace runs collapse to one space.
pub fn sanitize_text_field(input: &str) -> String {
    let text = SCRIPT_OR_STYLE.replace_all(input, "");
    let text = TAG.replace_all(&text, "");
    let mut text = text.into_owned();
    while OCTET.is_match(&text) {
        text = OCTET.replace_all(&text, "").into_owned();
    }
    let text: String = text.chars().filter(|c| !c.is_control() || c.is_whitespace()).collect();
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts() {
        let request = SimpleRequest::from_parts(
            "?forcecountry=us&page=2",
            Some("blm_country_code=GB; theme=dark"),
            Some("203.0.113.7"),
        );
        assert_eq!(request.query_param("forcecountry").as_deref(), Some("us"));
        assert_eq!(request.query_param("page").as_deref(), Some("2"));
        assert_eq!(request.query_param("missing"), None);
        assert_eq!(request.cookie("blm_country_code").as_deref(), Some("GB"));
        assert_eq!(request.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(request.remote_addr().as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_from_parts_decodes_query_and_skips_bad_cookies() {
        let request = SimpleRequest::from_parts("forcecountry=c%61&x=a+b", Some("=novalue; ok=1"), None);
        assert_eq!(request.query_param("forcecountry").as_deref(), Some("ca"));
        assert_eq!(request.query_param("x").as_deref(), Some("a b"));
        assert_eq!(request.cookie("ok").as_deref(), Some("1"));
        assert_eq!(request.remote_addr(), None);
    }

    #[test]
    fn test_set_cookie_is_queued() {
        let mut request = SimpleRequest::new().with_cookie("blm_country_code", "US");
        request.set_cookie(Cookie::new("blm_country_code", "CA"));
        // Incoming cookies are unaffected until the next request.
        assert_eq!(request.cookie("blm_country_code").as_deref(), Some("US"));
        assert_eq!(request.set_cookies().len(), 1);
        assert_eq!(request.set_cookie_headers(), vec!["blm_country_code=CA".to_string()]);
    }

    #[test]
    fn test_sanitize_text_field() {
        assert_eq!(sanitize_text_field("  us  "), "us");
        assert_eq!(sanitize_text_field("<b>ca</b>"), "ca");
        assert_eq!(sanitize_text_field("<script>alert(1)</script>de"), "de");
        assert_eq!(sanitize_text_field("fr%%4141"), "fr");
        assert_eq!(sanitize_text_field("a\tb\n\nc"), "a b c");
        assert_eq!(sanitize_text_field("g\u{0}b"), "gb");
        assert_eq!(sanitize_text_field(""), "");
    }
}
