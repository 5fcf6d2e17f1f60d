//! Redis connection configuration.
//!
//! `RedisConfig` is what callers write in config files; every numeric field
//! may be left at zero and gets filled in by [`RedisConfig::complete`].
//! [`RedisConfig::options`] turns a completed config into the immutable
//! [`RedisOptions`] handed to the client constructor.
//!
//! The client multiplexes requests over one managed connection, so
//! `pool_size` is advisory: it is validated and logged but has no
//! counterpart in the connection manager. `max_retries` bounds reconnect
//! attempts and `idle_timeout` becomes the per-command response timeout.

use std::time::Duration;

use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use serde::{Deserialize, Serialize};

/// Default Redis port.
pub const DEFAULT_PORT: u16 = 6379;

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 100;

/// Default maximum retry count.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default idle connection timeout.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// User-supplied Redis connection parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RedisConfig {
    /// Server host name or IP literal.
    pub host: String,

    /// Server port (0 = default).
    pub port: u16,

    /// Password, empty for none.
    pub auth: String,

    /// Connection pool size (0 = default).
    pub pool_size: u32,

    /// Maximum retries handed to the client (0 = default).
    pub max_retries: u32,

    /// Whether this is the default connection of the application.
    pub default: bool,

    /// Idle connection timeout, in whole seconds on disk (0 = default).
    #[serde(with = "duration_secs")]
    pub idle_timeout: Duration,
}

/// Immutable options consumed by a Redis client constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisOptions {
    /// `host:port` address.
    pub addr: String,
    pub password: String,
    pub pool_size: u32,
    pub max_retries: u32,
    pub idle_timeout: Duration,
}

impl RedisConfig {
    /// Fill every zero-valued field with its default, in place.
    pub fn complete(&mut self) {
        if self.port == 0 {
            self.port = DEFAULT_PORT;
        }
        if self.pool_size == 0 {
            self.pool_size = DEFAULT_POOL_SIZE;
        }
        if self.max_retries == 0 {
            self.max_retries = DEFAULT_MAX_RETRIES;
        }
        if self.idle_timeout.is_zero() {
            self.idle_timeout = DEFAULT_IDLE_TIMEOUT;
        }
    }

    /// Complete the config and convert it into client options.
    pub fn options(&mut self) -> RedisOptions {
        self.complete();

        RedisOptions {
            addr: join_host_port(&self.host, self.port),
            password: self.auth.clone(),
            pool_size: self.pool_size,
            max_retries: self.max_retries,
            idle_timeout: self.idle_timeout,
        }
    }
}

impl RedisOptions {
    /// Render the options as a `redis://` connection URL.
    pub fn connection_url(&self) -> Result<url::Url, url::ParseError> {
        let mut url = url::Url::parse(&format!("redis://{}/", self.addr))?;
        if !self.password.is_empty() {
            // Only fails for URLs without a host, which the parse above rules out.
            let _ = url.set_password(Some(&self.password));
        }
        Ok(url)
    }

    /// Build a client from these options. No connection is opened.
    pub fn open_client(&self) -> redis::RedisResult<redis::Client> {
        let url = self.connection_url().map_err(|e| {
            redis::RedisError::from((
                redis::ErrorKind::InvalidClientConfig,
                "Invalid Redis address",
                e.to_string(),
            ))
        })?;

        tracing::debug!(addr = %self.addr, pool_size = self.pool_size, "Creating Redis client");
        redis::Client::open(url.as_str())
    }

    /// Reconnect and timeout settings for a managed connection.
    pub fn manager_config(&self) -> ConnectionManagerConfig {
        ConnectionManagerConfig::new()
            .set_number_of_retries(self.max_retries as usize)
            .set_response_timeout(self.idle_timeout)
    }

    /// Open a managed connection. Reconnects use `max_retries` attempts.
    pub async fn connect(&self) -> redis::RedisResult<ConnectionManager> {
        let client = self.open_client()?;
        client.get_connection_manager_with_config(self.manager_config()).await
    }
}

/// Join host and port, bracketing IPv6 literals.
fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}
