//! Background revalidation worker.
//!
//! Subscribes to the `revalidate` channel and re-runs the full pipeline for
//! each published URI. The refresh request carries `Cache-Control: no-cache`
//! so the cache read is bypassed and the stored entry replaced. Concurrency
//! is bounded by a semaphore; the subscription reconnects with capped
//! backoff.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::cache::store::{RedisStore, REVALIDATE_CHANNEL};
use crate::config::Args;
use crate::engine::CacheProxy;
use crate::events::EventBus;
use crate::http::{HeaderMap, Method, Request};
use crate::server::{cache_key, split_uri};
use crate::types::{HearthError, Result};
use crate::upstream::HttpOrigin;

const BASE_RETRY_DELAY: Duration = Duration::from_secs(1);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Consumes the `revalidate` channel and refreshes entries out of band.
pub struct Revalidator {
    proxy: Arc<CacheProxy<HttpOrigin>>,
    store: Arc<RedisStore>,
    subscriber: redis::Client,
    limiter: Arc<Semaphore>,
}

impl Revalidator {
    pub fn new(args: &Args, events: Arc<EventBus>) -> Result<Self> {
        let store = Arc::new(RedisStore::connect(args)?);
        let origin = HttpOrigin::new(args.upstream_base())?;
        let proxy = Arc::new(CacheProxy::new(
            origin,
            events,
            args.visible_hostname.clone(),
            args.serve_when_stale,
        ));
        // Pub/sub needs its own connection on its own database; it cannot
        // share a pooled command connection.
        let subscriber = redis::Client::open(args.redis_url(args.redis_qless_database))?;

        Ok(Self {
            proxy,
            store,
            subscriber,
            limiter: Arc::new(Semaphore::new(args.max_concurrent)),
        })
    }

    /// Consume the channel until the process is stopped.
    pub async fn run(&self) -> Result<()> {
        let mut attempt: u32 = 0;
        loop {
            let mut pubsub = match self.subscriber.get_async_pubsub().await {
                Ok(pubsub) => pubsub,
                Err(e) => {
                    attempt += 1;
                    let delay = retry_delay(attempt);
                    warn!(error = %e, attempt, "pub/sub connect failed, retrying in {:?}", delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };
            if let Err(e) = pubsub.subscribe(REVALIDATE_CHANNEL).await {
                attempt += 1;
                let delay = retry_delay(attempt);
                warn!(error = %e, attempt, "subscribe failed, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                continue;
            }
            attempt = 0;
            info!("subscribed to '{}'", REVALIDATE_CHANNEL);

            let mut messages = pubsub.on_message();
            while let Some(message) = messages.next().await {
                let uri: String = match message.get_payload() {
                    Ok(uri) => uri,
                    Err(e) => {
                        warn!(error = %e, "undecodable revalidation payload");
                        continue;
                    }
                };

                let permit = match Arc::clone(&self.limiter).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                };
                let proxy = Arc::clone(&self.proxy);
                let store = Arc::clone(&self.store);
                tokio::spawn(async move {
                    let _permit = permit;
                    if let Err(e) = refresh(&proxy, &store, &uri).await {
                        error!(error = %e, uri = %uri, "revalidation failed");
                    }
                });
            }
            warn!("pub/sub stream ended, reconnecting");
        }
    }
}

/// Re-run the pipeline for one URI, bypassing the cache read.
async fn refresh(
    proxy: &CacheProxy<HttpOrigin>,
    store: &RedisStore,
    uri_full: &str,
) -> Result<()> {
    let (host, uri_relative) = split_uri(uri_full)
        .ok_or_else(|| HearthError::Internal(format!("unparseable URI on channel: {uri_full}")))?;

    let mut headers = HeaderMap::new();
    headers.set("Cache-Control", "no-cache");
    let mut request = Request {
        method: Method::Get,
        uri_full: uri_full.to_string(),
        uri_relative: uri_relative.clone(),
        host: host.clone(),
        headers,
        body: None,
    };

    let key = cache_key("http", &host, &uri_relative);
    let mut conn = store.acquire().await?;
    let response = proxy.handle(&mut conn, &key, &mut request).await?;
    debug!(
        uri = %uri_full,
        status = response.status,
        ttl = ?response.ttl(),
        "entry refreshed"
    );
    Ok(())
}

fn retry_delay(attempt: u32) -> Duration {
    let exp = BASE_RETRY_DELAY.as_millis() as u64 * 2u64.saturating_pow(attempt.min(16));
    Duration::from_millis(exp.min(MAX_RETRY_DELAY.as_millis() as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles_and_caps() {
        assert_eq!(retry_delay(1), Duration::from_secs(2));
        assert_eq!(retry_delay(2), Duration::from_secs(4));
        for attempt in 5..40 {
            assert!(retry_delay(attempt) <= MAX_RETRY_DELAY);
        }
    }
}
