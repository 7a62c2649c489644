//! Storage TTL derivation from response headers.
//!
//! Precedence: `Cache-Control: s-maxage` beats `max-age`, which beats
//! `Expires`; with none of the three the TTL is 0 and the entry is never
//! stored. All arithmetic is on whole-second epochs.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::http::HeaderMap;

/// Derived freshness lifetime for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// Seconds the entry counts as fresh.
    pub ttl: u64,
    /// Seconds to keep the entry in the store: `ttl` plus the stale-serving
    /// grace. The grace widens the store window only; it never moves
    /// `expires_at`.
    pub store_ttl: u64,
    /// Absolute expiry in epoch seconds (`now + ttl`).
    pub expires_at: u64,
}

pub fn freshness(headers: &HeaderMap, grace: u64) -> Freshness {
    freshness_at(headers, grace, epoch_now())
}

pub fn freshness_at(headers: &HeaderMap, grace: u64, now: u64) -> Freshness {
    let ttl = storage_ttl(headers, now);
    Freshness {
        ttl,
        store_ttl: ttl.saturating_add(grace),
        expires_at: now + ttl,
    }
}

fn storage_ttl(headers: &HeaderMap, now: u64) -> u64 {
    if let Some(cc) = headers.get("Cache-Control") {
        if let Some(n) = directive_value(cc, "s-maxage") {
            return n;
        }
        if let Some(n) = directive_value(cc, "max-age") {
            return n;
        }
    }
    if let Some(expires) = headers.get("Expires") {
        if let Ok(when) = httpdate::parse_http_date(expires) {
            let expires_epoch = when
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            return expires_epoch.saturating_sub(now);
        }
        // Unparseable dates degrade to "do not store".
    }
    0
}

/// Extract `name=N` from a comma-separated directive list, case-insensitively.
fn directive_value(value: &str, name: &str) -> Option<u64> {
    value.split(',').find_map(|directive| {
        let (key, val) = directive.trim().split_once('=')?;
        if key.trim().eq_ignore_ascii_case(name) {
            val.trim().parse().ok()
        } else {
            None
        }
    })
}

fn epoch_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
