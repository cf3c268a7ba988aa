//! Wire encoding for the validation call.
//!
//! Values are encoded with the URI component rules: unreserved characters
//! `A-Z a-z 0-9 - _ . ! ~ * ' ( )` pass through, everything else is
//! percent-encoded as UTF-8 (space becomes `%20`, not `+`).

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::form_urlencoded;

use crate::validation::descriptor::ValidationDescriptor;

const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode a single key or value.
pub fn url_encode(input: &str) -> String {
    utf8_percent_encode(input, COMPONENT).to_string()
}

/// Serialize a descriptor as an `application/x-www-form-urlencoded` body.
///
/// Absent fields are skipped entirely; empty strings are emitted as `key=`.
pub fn encode_form(descriptor: &ValidationDescriptor) -> String {
    descriptor
        .iter()
        .filter_map(|(key, value)| {
            value.map(|value| format!("{}={}", url_encode(key), url_encode(&value.to_string())))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Encode query parameters as `k=v&k2=v2`, with no leading `?`.
pub fn encode_query<'a, I>(params: I) -> String
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", url_encode(key), url_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Decode a raw query string into a string-keyed mapping.
///
/// Keys keep the position of their first occurrence; a repeated key takes
/// the last value given.
pub fn query_mapping(query: Option<&str>) -> Vec<(String, String)> {
    let mut mapping: Vec<(String, String)> = Vec::new();
    let Some(query) = query else {
        return mapping;
    };

    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match mapping.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = value.into_owned(),
            None => mapping.push((key.into_owned(), value.into_owned())),
        }
    }
    mapping
}
