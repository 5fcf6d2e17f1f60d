//! Scaffolding for axum services.
//!
//! - `config`: TOML configuration, including Redis connection options with
//!   default completion
//! - `http`: server bootstrap and the request logging middleware
//! - `observability`: file-backed log sinks and per-request trace ids
//! - `lifecycle`: startup, signals and graceful shutdown

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::{AppConfig, RedisConfig, RedisOptions, ServerConfig};
pub use http::{HttpServer, ServerError};
pub use lifecycle::Shutdown;
pub use observability::{LogContext, LogManager, LogSink, TraceId};
