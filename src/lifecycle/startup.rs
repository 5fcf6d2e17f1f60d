//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize process diagnostics (tracing subscriber)
//! - Turn the Redis section of the config into a managed connection
//! - Initialize the HTTP server and begin accepting traffic
//!
//! # Design Decisions
//! - Fail fast: any startup error is returned to the caller
//! - Listeners start last (traffic only when sinks are open)

use axum::Router;
use redis::{aio::ConnectionManager, RedisResult};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppConfig, RedisConfig};
use crate::http::{HttpServer, ServerError};

/// Default diagnostic filter when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "trellis=debug,tower_http=debug";

/// Install the global tracing subscriber. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

/// Open a managed Redis connection when a host is configured.
///
/// Completes `config` in place. Returns `None` when no host is set.
pub async fn redis_connection(config: &mut RedisConfig) -> RedisResult<Option<ConnectionManager>> {
    if config.host.is_empty() {
        return Ok(None);
    }

    let options = config.options();
    tracing::info!(
        addr = %options.addr,
        pool_size = options.pool_size,
        max_retries = options.max_retries,
        idle_timeout = ?options.idle_timeout,
        default = config.default,
        "Connecting to Redis"
    );
    let connection = options.connect().await?;
    Ok(Some(connection))
}

/// Initialize a server around `routes` and serve until shutdown.
pub async fn run(config: AppConfig, routes: Router) -> Result<(), ServerError> {
    let mut server = HttpServer::new(config.server).routes(routes);
    server.init()?;
    server.start().await
}
