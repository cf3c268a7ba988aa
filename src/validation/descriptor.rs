//! Validation descriptor construction.
//!
//! # Responsibilities
//! - Flatten an inbound request into the ordered field set the decision
//!   service expects
//! - Truncate values to the limits the decision service accepts
//!
//! # Design Decisions
//! - Pure: no I/O, the timestamp is supplied by the caller
//! - Absent values stay absent (`None`) so the encoder can drop them
//! - The client IP is the first `X-Forwarded-For` entry, falling back to
//!   loopback. Behind an untrusted proxy this is whatever the client claims;
//!   it is a hint for scoring, not an authenticated address.

use axum::http::{header, request::Parts, uri::Authority, HeaderMap};
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::config::ValidationConfig;
use crate::validation::encoding::{encode_query, query_mapping};

/// Client IP reported when no forwarding header is present.
pub const FALLBACK_IP: &str = "127.0.0.1";

/// Version reported in every descriptor.
pub const MODULE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum field lengths in characters. Negative limits keep the tail.
const FIELD_LIMITS: &[(&str, isize)] = &[
    ("ServerHostname", 512),
    ("Request", 2048),
    ("HeadersList", 512),
    ("Host", 512),
    ("UserAgent", 768),
    ("Referer", 1024),
    ("Accept", 512),
    ("AcceptEncoding", 128),
    ("AcceptLanguage", 256),
    ("AcceptCharset", 128),
    ("Origin", 512),
    ("XForwardedForIP", -512),
    ("X-Requested-With", 128),
    ("Connection", 128),
    ("Pragma", 128),
    ("CacheControl", 128),
    ("ContentType", 64),
    ("From", 128),
    ("Via", 256),
    ("ClientID", 128),
];

/// A scalar descriptor value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Int(u64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(text) => f.write_str(text),
            FieldValue::Int(n) => write!(f, "{}", n),
        }
    }
}

/// Ordered field name → value record sent to the decision service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationDescriptor {
    fields: Vec<(&'static str, Option<FieldValue>)>,
}

impl ValidationDescriptor {
    /// Append a field, truncating text values to the field's limit.
    pub fn push(&mut self, name: &'static str, value: Option<FieldValue>) {
        let value = value.map(|value| match value {
            FieldValue::Text(text) => FieldValue::Text(truncate_field(name, text)),
            other => other,
        });
        self.fields.push((name, value));
    }

    /// Value of a field, `None` if the field is absent or unknown.
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| *field == name)
            .and_then(|(_, value)| value.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, Option<&FieldValue>)> + '_ {
        self.fields.iter().map(|(name, value)| (*name, value.as_ref()))
    }
}

fn truncate_field(name: &str, text: String) -> String {
    let Some(&(_, limit)) = FIELD_LIMITS.iter().find(|(field, _)| *field == name) else {
        return text;
    };
    let max = limit.unsigned_abs();
    let count = text.chars().count();
    if count <= max {
        return text;
    }
    if limit < 0 {
        text.chars().skip(count - max).collect()
    } else {
        text.chars().take(max).collect()
    }
}

/// Current wall-clock time in milliseconds, scaled to microsecond units.
pub fn time_request_micros() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| (d.as_millis() as u64).saturating_mul(1000))
        .unwrap_or(0)
}

/// Build the descriptor for one inbound request.
pub fn build_descriptor(
    request: &Parts,
    config: &ValidationConfig,
    time_request: u64,
) -> ValidationDescriptor {
    let headers = &request.headers;
    let text = |value: Option<String>| value.map(FieldValue::Text);

    let host = header_text(headers, header::HOST.as_str())
        .or_else(|| request.uri.authority().map(|a| a.to_string()));
    let query = query_mapping(request.uri.query());
    let path_and_query = format!(
        "{}{}",
        request.uri.path(),
        encode_query(query.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    );

    let mut d = ValidationDescriptor::default();
    d.push("Key", Some(FieldValue::Text(config.server_key.clone())));
    d.push("RequestModuleName", Some(FieldValue::Text(config.module_name.clone())));
    d.push("ModuleVersion", Some(FieldValue::Text(MODULE_VERSION.to_string())));
    d.push("ServerName", Some(FieldValue::Text(config.server_name.clone())));
    d.push("APIConnectionState", Some(FieldValue::Text("new_connection".to_string())));
    d.push("IP", Some(FieldValue::Text(client_ip(headers))));
    d.push("TimeRequest", Some(FieldValue::Int(time_request)));
    d.push("Protocol", Some(FieldValue::Text(protocol(request))));
    d.push("Method", Some(FieldValue::Text(request.method.to_string())));
    d.push("ServerHostname", text(host.clone()));
    d.push("Request", Some(FieldValue::Text(path_and_query)));
    d.push("HeadersList", Some(FieldValue::Text(headers_list(headers))));
    d.push("Host", text(host));
    d.push("UserAgent", text(header_text(headers, "user-agent")));
    d.push("Referer", text(header_text(headers, "referer")));
    d.push("Accept", text(header_text(headers, "accept")));
    d.push("AcceptEncoding", text(header_text(headers, "accept-encoding")));
    d.push("AcceptLanguage", text(header_text(headers, "accept-language")));
    d.push("AcceptCharset", text(header_text(headers, "accept-charset")));
    d.push("Origin", text(header_text(headers, "origin")));
    d.push("XForwardedForIP", text(header_text(headers, "x-forwarded-for")));
    d.push("X-Requested-With", text(header_text(headers, "x-requested-with")));
    d.push("Connection", text(header_text(headers, "connection")));
    d.push("Pragma", text(header_text(headers, "pragma")));
    d.push("CacheControl", text(header_text(headers, "cache-control")));
    d.push("ContentType", text(header_text(headers, "content-type")));
    d.push("From", text(header_text(headers, "from")));
    d.push("Via", text(header_text(headers, "via")));
    d.push("CookiesLen", Some(FieldValue::Int(cookies_len(headers))));
    d.push(
        "AuthorizationLen",
        header_text(headers, "authorization").map(|v| FieldValue::Int(v.chars().count() as u64)),
    );
    d.push("PostParamLen", text(header_text(headers, "content-length")));
    d.push("ClientID", text(cookie_value(headers, &config.client_id_cookie)));
    d.push("ServerRegion", text(config.region.clone()));
    d
}

fn header_text(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .map(|value| String::from_utf8_lossy(value.as_bytes()).into_owned())
}

/// First `X-Forwarded-For` entry, or loopback.
pub fn client_ip(headers: &HeaderMap) -> String {
    header_text(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .unwrap_or_else(|| FALLBACK_IP.to_string())
}

fn protocol(request: &Parts) -> String {
    header_text(&request.headers, "x-forwarded-proto")
        .and_then(|value| value.split(',').next().map(|p| p.trim().to_ascii_lowercase()))
        .filter(|p| !p.is_empty())
        .or_else(|| request.uri.scheme_str().map(|s| s.to_string()))
        .unwrap_or_else(|| "http".to_string())
}

fn headers_list(headers: &HeaderMap) -> String {
    headers.keys().map(|name| name.as_str()).collect::<Vec<_>>().join(",")
}

/// Iterate `(name, value)` pairs across every `Cookie` header.
fn cookie_pairs(headers: &HeaderMap) -> impl Iterator<Item = (&str, &str)> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (pair, ""),
        })
}

/// Sum of the lengths of all cookie values; names are not counted.
pub fn cookies_len(headers: &HeaderMap) -> u64 {
    cookie_pairs(headers)
        .map(|(_, value)| value.chars().count() as u64)
        .sum()
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    cookie_pairs(headers)
        .find(|(cookie, _)| *cookie == name)
        .map(|(_, value)| value.to_string())
}

/// Host the client addressed, without port.
pub fn request_host(request: &Parts) -> Option<String> {
    let raw = header_text(&request.headers, header::HOST.as_str())
        .or_else(|| request.uri.authority().map(|a| a.to_string()))?;
    Authority::from_str(raw.trim())
        .ok()
        .map(|authority| authority.host().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    fn config() -> ValidationConfig {
        ValidationConfig {
            server_key: "secret".into(),
            region: Some("eu-west-1".into()),
            ..ValidationConfig::default()
        }
    }

    fn text(d: &ValidationDescriptor, name: &str) -> Option<String> {
        d.get(name).map(|v| v.to_string())
    }

    #[test]
    fn test_cookie_length_sums_values_only() {
        let req = parts(Request::builder().uri("/").header("cookie", "a=xy; b=z"));
        assert_eq!(cookies_len(&req.headers), 3);
    }

    #[test]
    fn test_cookie_length_spans_multiple_headers() {
        let req = parts(
            Request::builder()
                .uri("/")
                .header("cookie", "a=xy")
                .header("cookie", "b=z; flag"),
        );
        assert_eq!(cookies_len(&req.headers), 3);
    }

    #[test]
    fn test_descriptor_core_fields() {
        let req = parts(
            Request::builder()
                .method("POST")
                .uri("/search?q=rust+lang&page=2")
                .header("host", "shop.example.com:8443")
                .header("user-agent", "Mozilla/5.0")
                .header("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")
                .header("x-forwarded-proto", "https")
                .header("content-length", "42")
                .header("cookie", "clientid=abc123; theme=dark"),
        );

        let d = build_descriptor(&req, &config(), 1_700_000_000_000_000);

        assert_eq!(text(&d, "Key").as_deref(), Some("secret"));
        assert_eq!(text(&d, "ModuleVersion").as_deref(), Some(MODULE_VERSION));
        assert_eq!(text(&d, "IP").as_deref(), Some("203.0.113.7"));
        assert_eq!(d.get("TimeRequest"), Some(&FieldValue::Int(1_700_000_000_000_000)));
        assert_eq!(text(&d, "Protocol").as_deref(), Some("https"));
        assert_eq!(text(&d, "Method").as_deref(), Some("POST"));
        assert_eq!(text(&d, "Host").as_deref(), Some("shop.example.com:8443"));
        assert_eq!(text(&d, "Request").as_deref(), Some("/searchq=rust%20lang&page=2"));
        assert_eq!(text(&d, "PostParamLen").as_deref(), Some("42"));
        assert_eq!(text(&d, "ClientID").as_deref(), Some("abc123"));
        assert_eq!(d.get("CookiesLen"), Some(&FieldValue::Int(10)));
        assert_eq!(text(&d, "ServerRegion").as_deref(), Some("eu-west-1"));
        let listed = text(&d, "HeadersList").unwrap();
        let mut names: Vec<&str> = listed.split(',').collect();
        names.sort_unstable();
        assert_eq!(
            names,
            ["content-length", "cookie", "host", "user-agent", "x-forwarded-for", "x-forwarded-proto"]
        );
    }

    #[test]
    fn test_missing_headers_are_absent() {
        let req = parts(Request::builder().uri("/"));
        let mut cfg = config();
        cfg.region = None;

        let d = build_descriptor(&req, &cfg, 0);

        assert_eq!(text(&d, "IP").as_deref(), Some(FALLBACK_IP));
        assert_eq!(text(&d, "Protocol").as_deref(), Some("http"));
        assert_eq!(text(&d, "Request").as_deref(), Some("/"));
        for absent in ["Referer", "UserAgent", "AuthorizationLen", "ClientID", "ServerRegion"] {
            assert!(d.get(absent).is_none(), "{absent} should be absent");
        }
        assert_eq!(d.get("CookiesLen"), Some(&FieldValue::Int(0)));
    }

    #[test]
    fn test_authorization_absent_differs_from_empty() {
        let absent = build_descriptor(&parts(Request::builder().uri("/")), &config(), 0);
        let empty = build_descriptor(
            &parts(Request::builder().uri("/").header("authorization", "")),
            &config(),
            0,
        );
        let bearer = build_descriptor(
            &parts(Request::builder().uri("/").header("authorization", "Bearer abc")),
            &config(),
            0,
        );

        assert!(absent.get("AuthorizationLen").is_none());
        assert_eq!(empty.get("AuthorizationLen"), Some(&FieldValue::Int(0)));
        assert_eq!(bearer.get("AuthorizationLen"), Some(&FieldValue::Int(10)));
    }

    #[test]
    fn test_descriptor_is_deterministic() {
        let build = || {
            let req = parts(
                Request::builder()
                    .uri("/a?x=1")
                    .header("host", "example.com")
                    .header("accept", "*/*"),
            );
            build_descriptor(&req, &config(), 5_000)
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_long_values_are_truncated() {
        let agent = "a".repeat(1000);
        let forwarded = format!("{}, 10.0.0.1", "1".repeat(600));
        let req = parts(
            Request::builder()
                .uri("/")
                .header("user-agent", agent.as_str())
                .header("x-forwarded-for", forwarded.as_str()),
        );

        let d = build_descriptor(&req, &config(), 0);

        assert_eq!(text(&d, "UserAgent").map(|v| v.len()), Some(768));
        let xff = text(&d, "XForwardedForIP").unwrap();
        assert_eq!(xff.len(), 512);
        assert!(xff.ends_with(", 10.0.0.1"));
    }

    #[test]
    fn test_request_host_strips_port() {
        let req = parts(Request::builder().uri("/").header("host", "app.vercel.app:3000"));
        assert_eq!(request_host(&req).as_deref(), Some("app.vercel.app"));

        let bare = parts(Request::builder().uri("/"));
        assert!(request_host(&bare).is_none());
    }
}
