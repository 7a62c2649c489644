//! hearth - caching HTTP reverse proxy
//!
//! hearth sits in front of an origin server, serves cacheable responses
//! from a shared Redis store and refreshes entries through a background
//! revalidation channel. Clients see normal HTTP responses augmented with
//! the `Via`, `X-Cache` and `X-Cache-State` diagnostic headers.
//!
//! ## Services
//!
//! - **Engine**: per-request state machine (serve from cache, fetch, refresh)
//! - **Store**: atomic cache entry persistence with a shared expiry index
//! - **Events**: named lifecycle hooks for policy plugins
//! - **Upstream**: origin fetch path
//! - **Worker**: out-of-process revalidation consumer

pub mod cache;
pub mod config;
pub mod engine;
pub mod events;
pub mod http;
pub mod server;
pub mod types;
pub mod upstream;
pub mod worker;

#[cfg(test)]
mod test_support;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{HearthError, Result};
