//! Cache states for one request's interaction with the cache.

use std::fmt;

/// How the cache participated in serving a request.
///
/// The ordering is load-bearing: `Warm` and above count as a cache HIT for
/// the `X-Cache` header, anything colder as a MISS. `Cold` and `Warm` are
/// reserved for the stale-while-revalidate path; no transition in the core
/// sets them yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CacheState {
    /// Nothing usable was stored; the response came straight from the origin.
    Subzero = 1,
    /// An entry exists but is too stale to serve.
    Cold = 2,
    /// Served stale while a background refresh runs.
    Warm = 3,
    /// Served fresh from the store.
    Hot = 4,
}

impl CacheState {
    pub fn name(&self) -> &'static str {
        match self {
            CacheState::Subzero => "SUBZERO",
            CacheState::Cold => "COLD",
            CacheState::Warm => "WARM",
            CacheState::Hot => "HOT",
        }
    }

    /// HOT and WARM count as a cache hit, SUBZERO and COLD as a miss.
    pub fn is_hit(&self) -> bool {
        *self >= CacheState::Warm
    }
}

impl fmt::Display for CacheState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
