//! Return-destination encoding for the sign-in redirect.

use crate::constants::{AUTH_ROUTE, RETURN_PARAM};

/// Percent-encodes a path and query for use as a query parameter value.
pub fn encode_return_path(path_and_query: &str) -> String {
    urlencoding::encode(path_and_query).into_owned()
}

/// Reverses [`encode_return_path`]. Returns `None` when the value does not
/// decode to UTF-8.
pub fn decode_return_path(encoded: &str) -> Option<String> {
    urlencoding::decode(encoded).ok().map(|decoded| decoded.into_owned())
}

/// Sign-in route carrying `path_and_query` as its return destination.
pub fn auth_redirect(path_and_query: &str) -> String {
    format!(
        "{}?{}={}",
        AUTH_ROUTE,
        RETURN_PARAM,
        encode_return_path(path_and_query)
    )
}

/// Where to go after a successful sign-in, read from the auth route's query
/// string. Anything that is not a local absolute path falls back to `/`.
pub fn return_destination(query: &str) -> String {
    let query = query.split_once('?').map_or(query, |(_, q)| q);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == RETURN_PARAM)
        .and_then(|(_, value)| decode_return_path(value))
        .filter(|destination| is_local_path(destination))
        .unwrap_or_else(|| "/".to_string())
}

fn is_local_path(destination: &str) -> bool {
    destination.starts_with('/')
        && !destination.starts_with("//")
        && !destination.starts_with("/\\")
        && !destination.chars().any(char::is_control)
}
