//! Cacheability rules for requests and responses.
//!
//! Both predicates match literal whole-header values: a directive carrying
//! parameters (`max-age=600`) does not equal `no-cache` and leaves the
//! response cacheable. TTL derivation separately yields 0 for anything that
//! must not be stored.

use crate::http::{HeaderMap, Method, Request, Response};

fn header_equals(headers: &HeaderMap, name: &str, token: &str) -> bool {
    headers
        .get(name)
        .map(|v| v.eq_ignore_ascii_case(token))
        .unwrap_or(false)
}

/// True when the client allows this request to be answered from cache:
/// a GET without an explicit `no-cache` marker.
pub fn request_accepts_cache(req: &Request) -> bool {
    req.method == Method::Get
        && !header_equals(&req.headers, "Pragma", "no-cache")
        && !header_equals(&req.headers, "Cache-Control", "no-cache")
}

/// True unless the response carries a blocking directive as the entire
/// header value.
pub fn response_is_cacheable(res: &Response) -> bool {
    const BLOCKED: [&str; 4] = ["no-cache", "must-revalidate", "no-store", "private"];

    if header_equals(&res.headers, "Pragma", "no-cache") {
        return false;
    }
    if let Some(cc) = res.headers.get("Cache-Control") {
        if BLOCKED.iter().any(|token| cc.eq_ignore_ascii_case(token)) {
            return false;
        }
    }
    true
}
