//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated)
//!     → ServerConfig handed to HttpServer
//!     → RedisConfig completed into RedisOptions on demand
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Redis fields default to zero; completion happens at use, not at load
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod redis;
pub mod schema;
pub mod validation;

pub use self::loader::{load_config, ConfigError};
pub use self::redis::{RedisConfig, RedisOptions};
pub use self::schema::{AppConfig, ServerConfig};
