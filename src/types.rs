//! Error types shared across hearth.

use thiserror::Error;

/// Errors surfaced by the cache engine and its adapters.
#[derive(Debug, Error)]
pub enum HearthError {
    /// The store returned an error or violated the entry shape contract.
    #[error("store protocol fault: {0}")]
    Store(String),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Could not check a connection out of the store pool.
    #[error("store pool error: {0}")]
    Pool(String),

    /// Upstream transport failure. Surfaced to clients as a 502 passthrough,
    /// never as an engine fault.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// An event handler aborted the request.
    #[error("event handler for '{event}' failed: {message}")]
    Event { event: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HearthError>;
