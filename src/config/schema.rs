//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::config::redis::RedisConfig;

/// Root application configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP server settings.
    pub server: ServerConfig,

    /// Redis connection settings. Zero values are completed at use.
    pub redis: RedisConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    pub address: String,

    /// Root directory for log files. Empty selects the default.
    pub log_path: String,

    /// System name, used as log subdirectory and file name. Empty selects the default.
    pub system_name: String,

    /// Elevate the application log to debug level.
    pub debug: bool,

    /// Maximum number of response body bytes written to the request log.
    pub max_response_log_size: usize,

    /// Request bodies declaring a larger Content-Length are not captured.
    pub max_request_log_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
            log_path: String::new(),
            system_name: String::new(),
            debug: false,
            max_response_log_size: 2000,
            max_request_log_size: 2 * 1024 * 1024, // 2MB
        }
    }
}
