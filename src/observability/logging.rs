//! Structured file logging.
//!
//! # Responsibilities
//! - Define the `LogSink` seam used by the request logger and the server
//! - Append JSON lines to per-purpose log files
//! - Hold the three named sinks (application, system, request) in one
//!   explicitly passed `LogManager`
//!
//! # Design Decisions
//! - Process diagnostics go through `tracing`; these sinks carry the
//!   application's own records, one JSON object per line
//! - Level thresholds reuse `tracing`'s `Level`/`LevelFilter`
//! - Sinks are opened once at bootstrap and only read afterwards

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::level_filters::LevelFilter;
use tracing::Level;

/// Log root used when none is configured.
pub const DEFAULT_LOG_PATH: &str = "/tmp/logs";

/// System name used when none is configured.
pub const DEFAULT_SYSTEM_NAME: &str = "app";

pub const APP_LOG_PREFIX: &str = "app_";
pub const SYSTEM_LOG_PREFIX: &str = "system_";
pub const REQUEST_LOG_PREFIX: &str = "request_";
pub const LOG_SUFFIX: &str = ".log";

/// Ordered set of named fields attached to a log record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LogContext(Map<String, Value>);

impl LogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a field, replacing any previous value under the same key.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Field names in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

/// Error raised by a sink while writing a record.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("failed to write log record: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode log record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("log sink lock poisoned")]
    Poisoned,
}

/// Destination for structured log records.
pub trait LogSink: Send + Sync {
    /// Write one record. Records below the sink's threshold are dropped silently.
    fn log(&self, level: Level, message: &str, context: &LogContext) -> Result<(), SinkError>;

    fn info(&self, message: &str, context: &LogContext) -> Result<(), SinkError> {
        self.log(Level::INFO, message, context)
    }

    fn error(&self, message: &str, context: &LogContext) -> Result<(), SinkError> {
        self.log(Level::ERROR, message, context)
    }
}

#[derive(Serialize)]
struct Record<'a> {
    time: String,
    level: &'static str,
    message: &'a str,
    context: &'a LogContext,
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::TRACE => "trace",
        Level::DEBUG => "debug",
        Level::INFO => "info",
        Level::WARN => "warn",
        Level::ERROR => "error",
    }
}

/// Sink appending JSON lines to a single file.
#[derive(Debug)]
pub struct FileLogger {
    path: PathBuf,
    file: Mutex<File>,
    level: LevelFilter,
}

impl FileLogger {
    /// Open (creating parent directories as needed) a file for appending.
    /// The threshold starts at INFO.
    pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
            level: LevelFilter::INFO,
        })
    }

    pub fn with_level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    pub fn level(&self) -> LevelFilter {
        self.level
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for FileLogger {
    fn log(&self, level: Level, message: &str, context: &LogContext) -> Result<(), SinkError> {
        if level > self.level {
            return Ok(());
        }

        let record = Record {
            time: chrono::Local::now().to_rfc3339(),
            level: level_name(level),
            message,
            context,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self.file.lock().map_err(|_| SinkError::Poisoned)?;
        file.write_all(&line)?;
        Ok(())
    }
}

/// File locations of the three named sinks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogPaths {
    pub app: PathBuf,
    pub system: PathBuf,
    pub request: PathBuf,
}

impl LogPaths {
    /// Compose `<log_path>/<system_name>/<prefix><system_name><suffix>` for
    /// each sink, substituting defaults for empty inputs.
    pub fn resolve(log_path: &str, system_name: &str) -> Self {
        let log_path = if log_path.is_empty() { DEFAULT_LOG_PATH } else { log_path };
        let system_name = if system_name.is_empty() { DEFAULT_SYSTEM_NAME } else { system_name };
        let dir = Path::new(log_path).join(system_name);
        let file = |prefix: &str| dir.join(format!("{}{}{}", prefix, system_name, LOG_SUFFIX));

        Self {
            app: file(APP_LOG_PREFIX),
            system: file(SYSTEM_LOG_PREFIX),
            request: file(REQUEST_LOG_PREFIX),
        }
    }
}

/// The application, system and request sinks.
#[derive(Clone)]
pub struct LogManager {
    app: Arc<dyn LogSink>,
    system: Arc<dyn LogSink>,
    request: Arc<dyn LogSink>,
}

impl LogManager {
    pub fn new(app: Arc<dyn LogSink>, system: Arc<dyn LogSink>, request: Arc<dyn LogSink>) -> Self {
        Self { app, system, request }
    }

    /// Open the three file sinks. `app_debug` lowers the application threshold to DEBUG.
    pub fn open(paths: &LogPaths, app_debug: bool) -> std::io::Result<Self> {
        let mut app = FileLogger::open(&paths.app)?;
        if app_debug {
            app = app.with_level(LevelFilter::DEBUG);
        }
        let system = FileLogger::open(&paths.system)?;
        let request = FileLogger::open(&paths.request)?;

        tracing::info!(
            app = %paths.app.display(),
            system = %paths.system.display(),
            request = %paths.request.display(),
            debug = app_debug,
            "Log sinks opened"
        );

        Ok(Self::new(Arc::new(app), Arc::new(system), Arc::new(request)))
    }

    pub fn app(&self) -> &Arc<dyn LogSink> {
        &self.app
    }

    pub fn system(&self) -> &Arc<dyn LogSink> {
        &self.system
    }

    pub fn request(&self) -> &Arc<dyn LogSink> {
        &self.request
    }
}

impl std::fmt::Debug for LogManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogManager").finish_non_exhaustive()
    }
}
