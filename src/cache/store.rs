//! Shared cache store adapter.
//!
//! Entries live in Redis as one hash per cache key: the structural fields
//! `status`, `uri` and `body` plus one `h:<Name>` field per response header,
//! with the entry lifetime carried by the key's own TTL. Every write also
//! lands the URI in the `ledge:uris_by_expiry` sorted set (scored by
//! absolute expiry) used by external priming and analysis tooling. The index
//! key and the `revalidate` channel name are part of the external contract.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;
use tracing::debug;

use crate::config::Args;
use crate::http::{HeaderMap, Request, Response};
use crate::types::{HearthError, Result};

/// Sorted set mapping each cached URI to its absolute expiry epoch.
pub const EXPIRY_INDEX_KEY: &str = "ledge:uris_by_expiry";

/// Pub/sub channel carrying URIs scheduled for background revalidation.
pub const REVALIDATE_CHANNEL: &str = "revalidate";

const FIELD_STATUS: &str = "status";
const FIELD_URI: &str = "uri";
const FIELD_BODY: &str = "body";
const HEADER_FIELD_PREFIX: &str = "h:";

/// Cache entry persistence, one connection per request.
#[async_trait]
pub trait Storage: Send {
    /// Batched entry read. `None` on a miss (no key, or no remaining TTL).
    async fn read(&mut self, cache_key: &str) -> Result<Option<Response>>;

    /// Atomically replace the entry, set its TTL and update the expiry
    /// index. The caller guarantees the response passed the cacheability
    /// check.
    async fn write(
        &mut self,
        cache_key: &str,
        req: &Request,
        res: &Response,
        ttl: u64,
        expires_at: u64,
    ) -> Result<()>;

    /// Fire-and-forget publish on the store's pub/sub facility.
    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()>;
}

/// Pooled Redis store. `acquire` checks one connection out for the lifetime
/// of a request; dropping it returns it to the pool on every exit path.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn connect(args: &Args) -> Result<Self> {
        let timeout = Duration::from_millis(args.redis_timeout_ms);
        let idle = Duration::from_millis(args.redis_max_idle_timeout_ms);
        let pool = deadpool_redis::Config::from_url(args.redis_url(args.redis_database))
            .builder()
            .map_err(|e| HearthError::Config(format!("redis pool: {e}")))?
            .max_size(args.redis_pool_size)
            .wait_timeout(Some(timeout))
            .create_timeout(Some(timeout))
            .recycle_timeout(Some(idle))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| HearthError::Config(format!("redis pool: {e}")))?;
        Ok(Self { pool })
    }

    pub async fn acquire(&self) -> Result<StoreConnection> {
        let conn = self
            .pool
            .get()
            .await
            .map_err(|e| HearthError::Pool(e.to_string()))?;
        Ok(StoreConnection { conn })
    }
}

/// One pooled connection, held for a single request.
pub struct StoreConnection {
    conn: deadpool_redis::Connection,
}

#[async_trait]
impl Storage for StoreConnection {
    async fn read(&mut self, cache_key: &str) -> Result<Option<Response>> {
        let (fields, remaining): (HashMap<String, Vec<u8>>, i64) = redis::pipe()
            .hgetall(cache_key)
            .ttl(cache_key)
            .query_async(&mut self.conn)
            .await?;

        if remaining < 0 {
            return Ok(None);
        }
        let res = entry_from_fields(fields, remaining as u64)?;
        debug!(key = cache_key, ttl = remaining, "cache entry read");
        Ok(Some(res))
    }

    async fn write(
        &mut self,
        cache_key: &str,
        req: &Request,
        res: &Response,
        ttl: u64,
        expires_at: u64,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(cache_key).ignore();
        for (field, value) in entry_fields(req, res) {
            pipe.hset(cache_key, field, value).ignore();
        }
        pipe.expire(cache_key, ttl as i64).ignore();
        pipe.zadd(EXPIRY_INDEX_KEY, req.uri_full.as_str(), expires_at as i64)
            .ignore();

        let _: () = pipe.query_async(&mut self.conn).await?;
        debug!(key = cache_key, ttl, expires_at, "cache entry written");
        Ok(())
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()> {
        let _receivers: i64 = self.conn.publish(channel, payload).await?;
        Ok(())
    }
}

/// Flatten an entry into hash fields: the structural fields, then one
/// `h:`-prefixed field per header in insertion order.
fn entry_fields(req: &Request, res: &Response) -> Vec<(String, Vec<u8>)> {
    let mut fields = vec![
        (FIELD_STATUS.to_string(), res.status.to_string().into_bytes()),
        (FIELD_URI.to_string(), req.uri_full.clone().into_bytes()),
        (FIELD_BODY.to_string(), res.body.to_vec()),
    ];
    for (name, value) in res.headers.iter() {
        fields.push((
            format!("{HEADER_FIELD_PREFIX}{name}"),
            value.as_bytes().to_vec(),
        ));
    }
    fields
}

/// Rebuild a response from hash fields. A live TTL alongside a missing or
/// malformed structural field is a store fault, never a miss.
fn entry_from_fields(fields: HashMap<String, Vec<u8>>, remaining_ttl: u64) -> Result<Response> {
    if fields.is_empty() {
        return Err(HearthError::Store("live TTL but empty entry hash".into()));
    }
    let status = fields
        .get(FIELD_STATUS)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|raw| raw.parse::<u16>().ok())
        .ok_or_else(|| HearthError::Store("entry missing status field".into()))?;
    let body = fields
        .get(FIELD_BODY)
        .ok_or_else(|| HearthError::Store("entry missing body field".into()))?;

    let mut headers = HeaderMap::new();
    for (field, value) in &fields {
        if let Some(name) = field.strip_prefix(HEADER_FIELD_PREFIX) {
            headers.set(name, String::from_utf8_lossy(value).into_owned());
        }
    }

    let mut res = Response::new();
    res.status = status;
    res.headers = headers;
    res.body = Bytes::from(body.clone());
    res.ttl = Some(remaining_ttl);
    Ok(res)
}
