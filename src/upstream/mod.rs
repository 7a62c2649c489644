//! Origin fetch path.
//!
//! `HttpOrigin` is the transport: it forwards the inbound method, headers
//! and body to `proxy_location + uri_relative` on the configured upstream.
//! `OriginFetcher` wraps the transport with the lifecycle events and
//! storage: seed headers survive (origin headers merge over them), the
//! response is stored when cacheable with a live TTL, and 5xx or transport
//! failures pass through without further events or storage.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::cache::store::Storage;
use crate::cache::{policy, ttl};
use crate::events::{EventBus, ORIGIN_FETCHED, ORIGIN_REQUIRED};
use crate::http::{Request, Response};
use crate::types::{HearthError, Result};

const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Raw upstream response before it is merged into the transaction response.
pub struct OriginResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

/// Upstream transport.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn call(&self, req: &Request) -> Result<OriginResponse>;
}

/// Plain HTTP transport to the configured upstream.
pub struct HttpOrigin {
    client: reqwest::Client,
    base: String,
}

impl HttpOrigin {
    /// `base` is `http://upstream_host:upstream_port` plus the location
    /// prefix.
    pub fn new(base: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(UPSTREAM_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base: base.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn call(&self, req: &Request) -> Result<OriginResponse> {
        let url = format!("{}{}", self.base, req.uri_relative);
        let method = reqwest::Method::from_bytes(req.method.as_str().as_bytes())
            .map_err(|e| HearthError::Internal(format!("invalid method: {e}")))?;

        let mut call = self.client.request(method, &url);
        for (name, value) in req.headers.iter() {
            // Host and framing headers are derived from the outbound request.
            if is_hop_header(name) {
                continue;
            }
            call = call.header(name, value);
        }
        if let Some(body) = &req.body {
            call = call.body(body.clone());
        }

        debug!(url = %url, method = %req.method, "proxying to origin");
        let upstream = call.send().await?;

        let status = upstream.status().as_u16();
        let headers = upstream
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = upstream.bytes().await?;

        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}

fn is_hop_header(name: &str) -> bool {
    name.eq_ignore_ascii_case("host")
        || name.eq_ignore_ascii_case("connection")
        || name.eq_ignore_ascii_case("content-length")
        || name.eq_ignore_ascii_case("transfer-encoding")
}

/// Whether a fetch produced a response the pipeline continues with, or a
/// passthrough the engine must send as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    Passthrough,
}

/// Proxies one request to the origin and lands the result in the cache.
pub struct OriginFetcher<O> {
    origin: O,
    events: Arc<EventBus>,
    serve_when_stale: u64,
}

impl<O: Origin> OriginFetcher<O> {
    pub fn new(origin: O, events: Arc<EventBus>, serve_when_stale: u64) -> Self {
        Self {
            origin,
            events,
            serve_when_stale,
        }
    }

    /// Fetch from the origin into `res`, firing `origin_required` and
    /// (unless passing through) `origin_fetched`, then store the response
    /// when it is cacheable with a non-zero TTL.
    pub async fn fetch<S: Storage>(
        &self,
        store: &mut S,
        cache_key: &str,
        req: &mut Request,
        res: &mut Response,
    ) -> Result<FetchOutcome> {
        self.events.emit(ORIGIN_REQUIRED, req, res)?;

        let upstream = match self.origin.call(req).await {
            Ok(upstream) => upstream,
            Err(e) => {
                warn!(error = %e, uri = %req.uri_relative, "origin unreachable");
                res.status = 502;
                res.headers.set("Content-Type", "application/json");
                res.body = Bytes::from(
                    serde_json::json!({
                        "error": format!("upstream unreachable: {e}")
                    })
                    .to_string(),
                );
                return Ok(FetchOutcome::Passthrough);
            }
        };

        if upstream.status >= 500 {
            warn!(
                status = upstream.status,
                uri = %req.uri_relative,
                "origin error, passing through"
            );
            res.status = upstream.status;
            for (name, value) in &upstream.headers {
                res.headers.set(name, value.clone());
            }
            res.body = upstream.body;
            return Ok(FetchOutcome::Passthrough);
        }

        res.status = upstream.status;
        for (name, value) in &upstream.headers {
            res.headers.set(name, value.clone());
        }
        res.body = upstream.body;

        self.events.emit(ORIGIN_FETCHED, req, res)?;

        if policy::response_is_cacheable(res) {
            let fresh = ttl::freshness(&res.headers, self.serve_when_stale);
            res.ttl = Some(fresh.ttl);
            if fresh.ttl > 0 {
                store
                    .write(cache_key, req, res, fresh.store_ttl, fresh.expires_at)
                    .await?;
            }
        }

        Ok(FetchOutcome::Fetched)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;

    use super::*;
    use crate::http::{HeaderMap, Method};

    fn request_to(uri_relative: &str, method: Method) -> Request {
        Request {
            method,
            uri_full: format!("http://origin.test{uri_relative}"),
            uri_relative: uri_relative.to_string(),
            host: "origin.test".to_string(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    #[tokio::test]
    async fn test_http_origin_proxies_get() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/widgets/1").header("x-forward", "yes");
                then.status(200).header("X-Test", "1").body("widget");
            })
            .await;

        let origin = HttpOrigin::new(server.base_url()).unwrap();
        let mut req = request_to("/widgets/1", Method::Get);
        req.headers.set("X-Forward", "yes");

        let out = origin.call(&req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(out.status, 200);
        assert_eq!(out.body, Bytes::from("widget"));
        assert!(out
            .headers
            .iter()
            .any(|(n, v)| n.eq_ignore_ascii_case("x-test") && v == "1"));
    }

    #[tokio::test]
    async fn test_http_origin_prefixes_location() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/app/widgets/1");
                then.status(204);
            })
            .await;

        let origin = HttpOrigin::new(format!("{}/app", server.base_url())).unwrap();
        let req = request_to("/widgets/1", Method::Get);

        let out = origin.call(&req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(out.status, 204);
    }

    #[tokio::test]
    async fn test_http_origin_forwards_method_and_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/submit").body("payload");
                then.status(201);
            })
            .await;

        let origin = HttpOrigin::new(server.base_url()).unwrap();
        let mut req = request_to("/submit", Method::Post);
        req.body = Some(Bytes::from("payload"));

        let out = origin.call(&req).await.unwrap();

        mock.assert_async().await;
        assert_eq!(out.status, 201);
    }
}
