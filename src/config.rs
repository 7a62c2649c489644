//! Configuration for hearth
//!
//! CLI arguments and environment variable handling using clap. Every value
//! is read once at startup and treated as read-only afterwards.

use clap::Parser;
use std::net::SocketAddr;

/// hearth - caching HTTP reverse proxy
#[derive(Parser, Debug, Clone)]
#[command(name = "hearth")]
#[command(about = "Caching HTTP reverse proxy in front of an origin server")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Redis host for the shared cache store
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value = "6379")]
    pub redis_port: u16,

    /// Redis unix socket path (takes precedence over host/port)
    #[arg(long, env = "REDIS_SOCKET")]
    pub redis_socket: Option<String>,

    /// Redis operation timeout in milliseconds
    #[arg(long, env = "REDIS_TIMEOUT", default_value = "1000")]
    pub redis_timeout_ms: u64,

    /// Maximum idle time before a pooled connection is recycled (ms)
    #[arg(long, env = "REDIS_KEEPALIVE_MAX_IDLE_TIMEOUT", default_value = "60000")]
    pub redis_max_idle_timeout_ms: u64,

    /// Store connection pool size per process
    #[arg(long, env = "REDIS_KEEPALIVE_POOL_SIZE", default_value = "100")]
    pub redis_pool_size: usize,

    /// Redis database holding cache entries
    #[arg(long, env = "REDIS_DATABASE", default_value = "0")]
    pub redis_database: i64,

    /// Redis database used by the background revalidation worker
    #[arg(long, env = "REDIS_QLESS_DATABASE", default_value = "1")]
    pub redis_qless_database: i64,

    /// Origin server host
    #[arg(long, env = "UPSTREAM_HOST", default_value = "127.0.0.1")]
    pub upstream_host: String,

    /// Origin server port
    #[arg(long, env = "UPSTREAM_PORT", default_value = "8081")]
    pub upstream_port: u16,

    /// Path prefix prepended to the relative URI on every origin request
    #[arg(long, env = "PROXY_LOCATION", default_value = "")]
    pub proxy_location: String,

    /// Hostname advertised in the Via header
    #[arg(long, env = "VISIBLE_HOSTNAME", default_value = "localhost")]
    pub visible_hostname: String,

    /// Extra seconds a stale entry is kept in the store beyond its expiry
    #[arg(long, env = "SERVE_WHEN_STALE", default_value = "0")]
    pub serve_when_stale: u64,

    /// Maximum concurrent background refreshes (worker only)
    #[arg(long, env = "MAX_CONCURRENT", default_value = "10")]
    pub max_concurrent: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// Connection URL for the given Redis database.
    pub fn redis_url(&self, database: i64) -> String {
        match &self.redis_socket {
            Some(socket) => format!("unix://{}?db={}", socket, database),
            None => format!(
                "redis://{}:{}/{}",
                self.redis_host, self.redis_port, database
            ),
        }
    }

    /// Base URL for origin requests: host, port and the location prefix.
    pub fn upstream_base(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.upstream_host, self.upstream_port, self.proxy_location
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.redis_pool_size == 0 {
            return Err("REDIS_KEEPALIVE_POOL_SIZE must be at least 1".to_string());
        }
        if !self.proxy_location.is_empty() && !self.proxy_location.starts_with('/') {
            return Err("PROXY_LOCATION must start with '/'".to_string());
        }
        if self.max_concurrent == 0 {
            return Err("MAX_CONCURRENT must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_args() -> Args {
        Args::try_parse_from(["hearth"]).expect("defaults parse")
    }

    #[test]
    fn test_redis_url_tcp() {
        let args = default_args();
        assert_eq!(args.redis_url(0), "redis://127.0.0.1:6379/0");
        assert_eq!(args.redis_url(3), "redis://127.0.0.1:6379/3");
    }

    #[test]
    fn test_redis_url_socket_takes_precedence() {
        let mut args = default_args();
        args.redis_socket = Some("/var/run/redis.sock".to_string());
        assert_eq!(args.redis_url(1), "unix:///var/run/redis.sock?db=1");
    }

    #[test]
    fn test_upstream_base_includes_location() {
        let mut args = default_args();
        args.upstream_host = "origin.internal".to_string();
        args.upstream_port = 9000;
        args.proxy_location = "/app".to_string();
        assert_eq!(args.upstream_base(), "http://origin.internal:9000/app");
    }

    #[test]
    fn test_validate_rejects_empty_pool() {
        let mut args = default_args();
        args.redis_pool_size = 0;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_relative_proxy_location() {
        let mut args = default_args();
        args.proxy_location = "app".to_string();
        assert!(args.validate().is_err());
        args.proxy_location = "/app".to_string();
        assert!(args.validate().is_ok());
    }
}
