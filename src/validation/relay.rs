//! Header relay from the decision service to the client.
//!
//! The decision service names the headers it wants forwarded in a manifest
//! header: a space-separated list of header names. The manifest is untrusted
//! input; anything that does not parse is skipped.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

use crate::validation::LATENCY_HEADER;

/// Cookie domain correction applied to relayed `Set-Cookie` headers.
#[derive(Debug, Clone, Copy)]
pub struct CookieDomainRewrite<'a> {
    /// Domain attribute value browsers reject for this deployment.
    pub rejected: &'a str,
    /// Host the client addressed; without it no rewrite happens.
    pub host: Option<&'a str>,
}

/// Header names listed in the manifest, in order. Missing or malformed → empty.
pub fn manifest_names(source: &HeaderMap, manifest: &str) -> Vec<HeaderName> {
    source
        .get(manifest)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(' ')
                .filter(|name| !name.is_empty())
                .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
                .collect()
        })
        .unwrap_or_default()
}

/// Collect the headers named by `manifest` from `source`.
pub fn relay_headers(
    source: &HeaderMap,
    manifest: &str,
    cookie_rewrite: CookieDomainRewrite<'_>,
) -> HeaderMap {
    let mut relayed = HeaderMap::new();

    for name in manifest_names(source, manifest) {
        if relayed.contains_key(&name) {
            continue;
        }
        for value in source.get_all(&name) {
            let value = if name == header::SET_COOKIE {
                rewrite_set_cookie(value, cookie_rewrite)
            } else {
                value.clone()
            };
            relayed.append(name.clone(), value);
        }
    }

    relayed
}

fn rewrite_set_cookie(value: &HeaderValue, rewrite: CookieDomainRewrite<'_>) -> HeaderValue {
    let (Some(host), Ok(cookie)) = (rewrite.host, value.to_str()) else {
        return value.clone();
    };
    rewrite_cookie_domain(cookie, rewrite.rejected, host)
        .and_then(|rewritten| HeaderValue::from_str(&rewritten).ok())
        .unwrap_or_else(|| value.clone())
}

/// Replace a `Domain` attribute equal to `rejected` with `host`.
///
/// Returns `None` when the cookie has no such attribute.
pub fn rewrite_cookie_domain(cookie: &str, rejected: &str, host: &str) -> Option<String> {
    let mut rewritten = false;
    let segments: Vec<String> = cookie
        .split(';')
        .enumerate()
        .map(|(index, segment)| {
            if index > 0 {
                if let Some((name, value)) = segment.split_once('=') {
                    if name.trim().eq_ignore_ascii_case("domain")
                        && value.trim().eq_ignore_ascii_case(rejected)
                    {
                        rewritten = true;
                        return format!("{}={}", name, host);
                    }
                }
            }
            segment.to_string()
        })
        .collect();

    rewritten.then(|| segments.join(";"))
}

/// Copy relayed headers onto `target`.
///
/// `Set-Cookie` values are appended; any other relayed header replaces the
/// existing value.
pub fn merge_headers(target: &mut HeaderMap, relayed: &HeaderMap) {
    for name in relayed.keys() {
        if *name != header::SET_COOKIE {
            target.remove(name);
        }
        for value in relayed.get_all(name) {
            target.append(name.clone(), value.clone());
        }
    }
}

/// Record how long the decision call took, in whole milliseconds.
pub fn stamp_latency(target: &mut HeaderMap, elapsed: Duration) {
    target.insert(
        HeaderName::from_static(LATENCY_HEADER),
        HeaderValue::from(elapsed.as_millis() as u64),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::RESPONSE_MANIFEST_HEADER;

    const REJECTED: &str = ".vercel.app";

    fn rewrite(host: &str) -> CookieDomainRewrite<'_> {
        CookieDomainRewrite {
            rejected: REJECTED,
            host: Some(host),
        }
    }

    fn source(manifest: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(RESPONSE_MANIFEST_HEADER, HeaderValue::from_str(manifest).unwrap());
        headers
    }

    #[test]
    fn test_manifest_lists_headers_in_order() {
        let mut headers = source("X-Token  set-cookie x-trace");
        headers.insert("x-token", HeaderValue::from_static("t"));
        headers.insert("x-trace", HeaderValue::from_static("r"));

        let names = manifest_names(&headers, RESPONSE_MANIFEST_HEADER);
        assert_eq!(names, vec!["x-token", "set-cookie", "x-trace"]);

        let relayed = relay_headers(&headers, RESPONSE_MANIFEST_HEADER, rewrite("shop.example.com"));
        assert_eq!(relayed.get("x-token").unwrap(), "t");
        assert_eq!(relayed.get("x-trace").unwrap(), "r");
        assert!(relayed.get("set-cookie").is_none());
    }

    #[test]
    fn test_missing_or_malformed_manifest_relays_nothing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-token", HeaderValue::from_static("t"));
        assert!(relay_headers(&headers, RESPONSE_MANIFEST_HEADER, rewrite("h")).is_empty());

        headers.insert(
            RESPONSE_MANIFEST_HEADER,
            HeaderValue::from_bytes(b"\xffbad").unwrap(),
        );
        assert!(relay_headers(&headers, RESPONSE_MANIFEST_HEADER, rewrite("h")).is_empty());

        let headers = source("bad{name} x-token");
        assert!(relay_headers(&headers, RESPONSE_MANIFEST_HEADER, rewrite("h")).is_empty());
    }

    #[test]
    fn test_rejected_cookie_domain_is_rewritten_to_host() {
        let mut headers = source("set-cookie");
        headers.append(
            "set-cookie",
            HeaderValue::from_static("clientid=abc; Max-Age=31536000; DOMAIN=.Vercel.App; Path=/"),
        );
        headers.append(
            "set-cookie",
            HeaderValue::from_static("other=1; Domain=.example.com; Path=/"),
        );

        let relayed = relay_headers(&headers, RESPONSE_MANIFEST_HEADER, rewrite("my-app.vercel.app"));
        let cookies: Vec<_> = relayed
            .get_all("set-cookie")
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();

        assert_eq!(
            cookies,
            vec![
                "clientid=abc; Max-Age=31536000; DOMAIN=my-app.vercel.app; Path=/",
                "other=1; Domain=.example.com; Path=/",
            ]
        );
    }

    #[test]
    fn test_cookie_without_host_is_untouched() {
        let mut headers = source("set-cookie");
        headers.insert("set-cookie", HeaderValue::from_static("a=1; Domain=.vercel.app"));

        let relayed = relay_headers(
            &headers,
            RESPONSE_MANIFEST_HEADER,
            CookieDomainRewrite {
                rejected: REJECTED,
                host: None,
            },
        );
        assert_eq!(relayed.get("set-cookie").unwrap(), "a=1; Domain=.vercel.app");
    }

    #[test]
    fn test_cookie_value_is_not_mistaken_for_domain() {
        assert_eq!(rewrite_cookie_domain("domain=.vercel.app; Path=/", REJECTED, "h"), None);
    }

    #[test]
    fn test_merge_appends_cookies_and_replaces_others() {
        let mut target = HeaderMap::new();
        target.insert("set-cookie", HeaderValue::from_static("session=1"));
        target.insert("x-token", HeaderValue::from_static("old"));

        let mut relayed = HeaderMap::new();
        relayed.insert("set-cookie", HeaderValue::from_static("clientid=2"));
        relayed.insert("x-token", HeaderValue::from_static("new"));

        merge_headers(&mut target, &relayed);

        assert_eq!(target.get_all("set-cookie").iter().count(), 2);
        assert_eq!(target.get("x-token").unwrap(), "new");
    }

    #[test]
    fn test_latency_is_whole_milliseconds() {
        let mut target = HeaderMap::new();
        stamp_latency(&mut target, Duration::from_micros(12_900));
        assert_eq!(target.get(LATENCY_HEADER).unwrap(), "12");
    }
}
