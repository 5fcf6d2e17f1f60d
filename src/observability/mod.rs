//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request logger / server bootstrap produce:
//!     → logging.rs (structured records to app/system/request files)
//!     → trace.rs (per-request trace id, task-local)
//!
//! Process diagnostics:
//!     → tracing macros → tracing-subscriber (stdout)
//! ```
//!
//! # Design Decisions
//! - Trace id flows through every record of a request
//! - Sinks are passed explicitly, never read from globals
//! - Request records are written off the response path

pub mod logging;
pub mod trace;

pub use logging::{FileLogger, LogContext, LogManager, LogPaths, LogSink, SinkError};
pub use trace::{current_trace_id, TraceId, TRACE_HEADER};
