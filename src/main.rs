//! hearth - caching HTTP reverse proxy

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hearth::config::Args;
use hearth::events::EventBus;
use hearth::server::{self, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hearth={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  hearth - caching reverse proxy");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Redis: {}", args.redis_url(args.redis_database));
    info!("Upstream: {}", args.upstream_base());
    info!("Via host: {}", args.visible_hostname);
    info!("Stale grace: {}s", args.serve_when_stale);
    info!("Pool size: {}", args.redis_pool_size);
    info!("======================================");

    // Policy plugins register their event handlers here, before the bus is
    // shared and the server starts.
    let events = Arc::new(EventBus::new());

    let state = match AppState::new(args, events) {
        Ok(state) => Arc::new(state),
        Err(e) => {
            error!("startup failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = server::run(state).await {
        error!("server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
