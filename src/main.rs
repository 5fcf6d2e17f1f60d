//! trellis service binary.
//!
//! Loads a TOML config, opens the log sinks, connects to Redis when one is
//! configured and serves a small health API behind the request logger.

use std::path::PathBuf;
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use clap::Parser;
use redis::aio::ConnectionManager;
use serde_json::{json, Value};

use trellis::config::{load_config, AppConfig};
use trellis::lifecycle::startup;
use trellis::observability::current_trace_id;

const REDIS_PING_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Parser)]
#[command(name = "trellis")]
#[command(about = "HTTP service scaffold with request logging", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    address: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    startup::init_tracing();

    tracing::info!("trellis v0.1.0 starting");

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(address) = cli.address {
        config.server.address = address;
    }

    tracing::info!(
        address = %config.server.address,
        log_path = %config.server.log_path,
        system_name = %config.server.system_name,
        "Configuration loaded"
    );

    let redis = startup::redis_connection(&mut config.redis).await?;

    let routes = Router::new()
        .route("/health", get(health))
        .with_state(redis);

    startup::run(config, routes).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Reports process liveness and, when configured, whether Redis answers PING.
async fn health(State(redis): State<Option<ConnectionManager>>) -> Json<Value> {
    let redis = match redis {
        Some(mut conn) => {
            let cmd = redis::cmd("PING");
            let ping = cmd.query_async::<String>(&mut conn);
            match tokio::time::timeout(REDIS_PING_TIMEOUT, ping).await {
                Ok(Ok(_)) => json!("ok"),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Redis health check failed");
                    json!("unavailable")
                }
                Err(_) => json!("timeout"),
            }
        }
        None => Value::Null,
    };

    Json(json!({
        "status": "ok",
        "redis": redis,
        "trace_id": current_trace_id().map(|id| id.to_string()),
    }))
}
