//! Per-request cache engine.
//!
//! One `handle` call runs a full transaction: classify the request, read
//! through the store, fall back to the origin fetcher, and decorate the
//! response with the `Via` / `X-Cache` / `X-Cache-State` diagnostics. The
//! `response_ready` event fires exactly once per request, except when a 5xx
//! or transport failure passes through untouched.

use std::sync::Arc;

use tracing::debug;

use crate::cache::store::{Storage, REVALIDATE_CHANNEL};
use crate::cache::{policy, CacheState};
use crate::events::{EventBus, CACHE_ACCESSED, RESPONSE_READY};
use crate::http::{Request, Response};
use crate::types::Result;
use crate::upstream::{FetchOutcome, Origin, OriginFetcher};

pub struct CacheProxy<O> {
    fetcher: OriginFetcher<O>,
    events: Arc<EventBus>,
    visible_hostname: String,
}

impl<O: Origin> CacheProxy<O> {
    pub fn new(
        origin: O,
        events: Arc<EventBus>,
        visible_hostname: String,
        serve_when_stale: u64,
    ) -> Self {
        Self {
            fetcher: OriginFetcher::new(origin, Arc::clone(&events), serve_when_stale),
            events,
            visible_hostname,
        }
    }

    /// Run one transaction against an acquired store connection.
    pub async fn handle<S: Storage>(
        &self,
        store: &mut S,
        cache_key: &str,
        req: &mut Request,
    ) -> Result<Response> {
        let mut res = Response::new();

        if !policy::request_accepts_cache(req) {
            debug!(uri = %req.uri_full, "request bypasses cache, fetching");
            return match self.fetcher.fetch(store, cache_key, req, &mut res).await? {
                FetchOutcome::Passthrough => Ok(res),
                FetchOutcome::Fetched => {
                    self.events.emit(RESPONSE_READY, req, &mut res)?;
                    Ok(res)
                }
            };
        }

        if let Some(mut cached) = store.read(cache_key).await? {
            debug!(uri = %req.uri_full, "serving from cache");
            cached.state = Some(CacheState::Hot);
            self.events.emit(CACHE_ACCESSED, req, &mut cached)?;
            self.set_headers(&mut cached);
            self.events.emit(RESPONSE_READY, req, &mut cached)?;
            return Ok(cached);
        }

        debug!(uri = %req.uri_full, "cache miss, fetching");
        match self.fetcher.fetch(store, cache_key, req, &mut res).await? {
            FetchOutcome::Passthrough => Ok(res),
            FetchOutcome::Fetched => {
                res.state = Some(CacheState::Subzero);
                self.set_headers(&mut res);
                self.events.emit(RESPONSE_READY, req, &mut res)?;
                Ok(res)
            }
        }
    }

    /// Schedule a background refresh for a URI: the out-of-process worker
    /// consuming the `revalidate` channel re-runs the pipeline. Publisher
    /// half of the stale-while-revalidate extension; nothing in the core
    /// calls it yet.
    pub async fn revalidate<S: Storage>(&self, store: &mut S, uri_full: &str) -> Result<()> {
        store.publish(REVALIDATE_CHANNEL, uri_full).await
    }

    fn set_headers(&self, res: &mut Response) {
        let Some(state) = res.state else { return };

        let via = match res.headers.get("Via") {
            Some(existing) => format!("1.1 {}, {}", self.visible_hostname, existing),
            None => format!("1.1 {}", self.visible_hostname),
        };
        res.headers.set("Via", via);
        res.headers
            .set("X-Cache", if state.is_hit() { "HIT" } else { "MISS" });
        res.headers.set("X-Cache-State", state.name());
    }
}
