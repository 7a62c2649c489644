//! HTTP listener.
//!
//! hyper http1 with TokioIo, one task per connection. The adapter derives
//! the cache key, converts between the wire types and the engine's model,
//! and maps faults to a JSON 500. A connection task runs to completion even
//! if the client goes away, so an in-flight store write is never abandoned.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::StatusCode;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cache::store::RedisStore;
use crate::config::Args;
use crate::engine::CacheProxy;
use crate::events::EventBus;
use crate::http::{HeaderMap, Method, Request};
use crate::server::cache_key;
use crate::types::Result;
use crate::upstream::HttpOrigin;

/// Shared application state.
pub struct AppState {
    pub args: Args,
    pub store: RedisStore,
    pub proxy: CacheProxy<HttpOrigin>,
}

impl AppState {
    pub fn new(args: Args, events: Arc<EventBus>) -> Result<Self> {
        let store = RedisStore::connect(&args)?;
        let origin = HttpOrigin::new(args.upstream_base())?;
        let proxy = CacheProxy::new(
            origin,
            events,
            args.visible_hostname.clone(),
            args.serve_when_stale,
        );
        Ok(Self { args, store, proxy })
    }
}

/// Start the HTTP server.
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!("hearth listening on {}", state.args.listen);

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("error accepting connection: {:?}", e);
            }
        }
    }
}

/// Run one inbound request through the engine.
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: hyper::Request<Incoming>,
) -> std::result::Result<hyper::Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();

    let Some(method) = Method::parse(parts.method.as_str()) else {
        return Ok(error_response(
            StatusCode::NOT_IMPLEMENTED,
            &format!("method {} not supported", parts.method),
        ));
    };

    let host = parts
        .headers
        .get(hyper::header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or(&state.args.visible_hostname)
        .to_string();
    let uri_relative = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/")
        .to_string();
    let uri_full = format!("http://{host}{uri_relative}");

    info!("[{}] {} {}", addr, parts.method, uri_relative);

    let mut headers = HeaderMap::new();
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            headers.set(name.as_str(), value);
        }
    }

    let body = body.collect().await?.to_bytes();
    let mut request = Request {
        method,
        uri_full: uri_full.clone(),
        uri_relative: uri_relative.clone(),
        host: host.clone(),
        headers,
        body: if body.is_empty() { None } else { Some(body) },
    };

    let key = cache_key("http", &host, &uri_relative);

    // The engine runs on its own task: if the client disconnects mid-request
    // the service future is dropped, but an in-flight store write still
    // completes and the connection still returns to the pool.
    let engine_state = Arc::clone(&state);
    let outcome = tokio::spawn(async move {
        let mut conn = engine_state.store.acquire().await?;
        engine_state.proxy.handle(&mut conn, &key, &mut request).await
    });

    match outcome.await {
        Ok(Ok(response)) => {
            let mut builder = hyper::Response::builder()
                .status(StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY));
            for (name, value) in response.headers.iter() {
                builder = builder.header(name, value);
            }
            Ok(builder.body(Full::new(response.body)).unwrap_or_else(|e| {
                warn!(error = %e, "response assembly failed");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "response assembly failed",
                )
            }))
        }
        Ok(Err(e)) => {
            error!(error = %e, uri = %uri_full, "request failed");
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal cache fault",
            ))
        }
        Err(e) => {
            error!(error = %e, uri = %uri_full, "engine task failed");
            Ok(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal cache fault",
            ))
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> hyper::Response<Full<Bytes>> {
    let body = serde_json::json!({ "error": message });

    hyper::Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
