//! Shared test doubles: an in-memory store and scripted origins.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::cache::store::Storage;
use crate::http::{HeaderMap, Method, Request, Response};
use crate::types::{HearthError, Result};
use crate::upstream::{Origin, OriginResponse};

/// HashMap-backed `Storage` recording writes and publishes.
#[derive(Default)]
pub struct MemoryStore {
    pub entries: HashMap<String, StoredEntry>,
    pub index: Vec<(String, u64)>,
    pub published: Vec<(String, String)>,
    pub fail_reads: bool,
}

#[derive(Clone)]
pub struct StoredEntry {
    pub status: u16,
    pub body: Bytes,
    pub uri: String,
    pub headers: Vec<(String, String)>,
    pub ttl: u64,
}

#[async_trait]
impl Storage for MemoryStore {
    async fn read(&mut self, cache_key: &str) -> Result<Option<Response>> {
        if self.fail_reads {
            return Err(HearthError::Store("simulated read fault".to_string()));
        }
        let Some(entry) = self.entries.get(cache_key) else {
            return Ok(None);
        };
        let mut res = Response::new();
        res.status = entry.status;
        res.body = entry.body.clone();
        for (name, value) in &entry.headers {
            res.headers.set(name, value.clone());
        }
        res.ttl = Some(entry.ttl);
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
        self.entries.insert(
            cache_key.to_string(),
            StoredEntry {
                status: res.status,
                body: res.body.clone(),
                uri: req.uri_full.clone(),
                headers: res
                    .headers
                    .iter()
                    .map(|(n, v)| (n.to_string(), v.to_string()))
                    .collect(),
                ttl,
            },
        );
        self.index.push((req.uri_full.clone(), expires_at));
        Ok(())
    }

    async fn publish(&mut self, channel: &str, payload: &str) -> Result<()> {
        self.published
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}

/// Origin returning one scripted response, counting calls.
pub struct StubOrigin {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub call_count: Arc<AtomicUsize>,
}

impl StubOrigin {
    pub fn new(status: u16, headers: &[(&str, &str)], body: &str) -> Self {
        Self {
            status,
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            body: Bytes::from(body.to_string()),
            call_count: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Origin for StubOrigin {
    async fn call(&self, _req: &Request) -> Result<OriginResponse> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        Ok(OriginResponse {
            status: self.status,
            headers: self.headers.clone(),
            body: self.body.clone(),
        })
    }
}

/// Origin whose transport always fails.
pub struct DownOrigin;

#[async_trait]
impl Origin for DownOrigin {
    async fn call(&self, _req: &Request) -> Result<OriginResponse> {
        Err(HearthError::Internal("connection refused".to_string()))
    }
}

pub fn get_request(uri_relative: &str) -> Request {
    Request {
        method: Method::Get,
        uri_full: format!("http://origin.test{uri_relative}"),
        uri_relative: uri_relative.to_string(),
        host: "origin.test".to_string(),
        headers: HeaderMap::new(),
        body: None,
    }
}
