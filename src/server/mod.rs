//! Protocol-server adapter.

pub mod http;

pub use http::{run, AppState};

/// Cache key for one request, derived from scheme, authority and relative
/// URI. The engine treats the result as opaque.
pub fn cache_key(scheme: &str, host: &str, uri_relative: &str) -> String {
    format!("hearth:entity:{scheme}:{host}:{uri_relative}")
}

/// Split an absolute URI into `(host, uri_relative)`.
pub fn split_uri(uri_full: &str) -> Option<(String, String)> {
    let after_scheme = uri_full.split_once("://")?.1;
    match after_scheme.find('/') {
        Some(idx) => Some((
            after_scheme[..idx].to_string(),
            after_scheme[idx..].to_string(),
        )),
        None => Some((after_scheme.to_string(), "/".to_string())),
    }
}
