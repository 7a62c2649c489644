//! hearth-worker - background revalidation daemon
//!
//! Run alongside the proxy to consume the `revalidate` channel and refresh
//! cache entries out of band.
//!
//! Usage:
//!   hearth-worker --redis-host 127.0.0.1 --upstream-host 127.0.0.1
//!
//! All configuration flags and environment variables are shared with the
//! proxy binary; the worker additionally honours MAX_CONCURRENT and uses
//! REDIS_QLESS_DATABASE for its subscription connection.

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hearth::config::Args;
use hearth::events::EventBus;
use hearth::worker::Revalidator;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("hearth={},info", args.log_level))),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("configuration error: {}", e);
        std::process::exit(1);
    }

    info!(
        "starting hearth-worker (redis: {}, upstream: {}, max {} concurrent refreshes)",
        args.redis_url(args.redis_qless_database),
        args.upstream_base(),
        args.max_concurrent
    );

    // Policy plugins for the background pipeline register here.
    let events = Arc::new(EventBus::new());

    let revalidator = match Revalidator::new(&args, events) {
        Ok(revalidator) => revalidator,
        Err(e) => {
            error!("failed to start revalidator: {}", e);
            std::process::exit(1);
        }
    };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
        }
        result = revalidator.run() => {
            if let Err(e) = result {
                error!("revalidator error: {}", e);
                std::process::exit(1);
            }
        }
    }

    info!("worker shutting down");
}
