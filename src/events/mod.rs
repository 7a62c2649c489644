//! Lifecycle event bus.
//!
//! Policy plugins register handlers against the four fixed event names at
//! startup; dispatch is synchronous and in registration order, and handlers
//! mutate the request/response pair through the references they are handed.
//! A handler error aborts the request. Registration happens before the
//! server starts; afterwards the bus is shared behind `Arc` and only read.

use std::collections::HashMap;

use crate::http::{Request, Response};
use crate::types::{HearthError, Result};

/// Fired after a cache hit is read, before diagnostic headers are set.
pub const CACHE_ACCESSED: &str = "cache_accessed";
/// Fired before the upstream request is issued.
pub const ORIGIN_REQUIRED: &str = "origin_required";
/// Fired once the origin response is merged, before storage.
pub const ORIGIN_FETCHED: &str = "origin_fetched";
/// Fired exactly once per request, just before the response is sent.
pub const RESPONSE_READY: &str = "response_ready";

pub type EventHandler = Box<dyn Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync>;

/// Registry mapping event name to its ordered handler chain.
#[derive(Default)]
pub struct EventBus {
    handlers: HashMap<String, Vec<EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler; handlers run in registration order.
    pub fn on<F>(&mut self, event: &str, handler: F)
    where
        F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .entry(event.to_string())
            .or_default()
            .push(Box::new(handler));
    }

    /// Dispatch an event synchronously. The first handler error aborts the
    /// chain and fails the request.
    pub fn emit(&self, event: &str, req: &mut Request, res: &mut Response) -> Result<()> {
        let Some(chain) = self.handlers.get(event) else {
            return Ok(());
        };
        for handler in chain {
            handler(req, res).map_err(|e| HearthError::Event {
                event: event.to_string(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }
}
