//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, tracing layer)
//!     → middleware/request_log.rs (trace id, request body capture)
//!     → catch-panic layer (handlers.rs recovery)
//!     → application route, or handlers.rs not-found
//!     → body.rs (response body forwarded and captured)
//!     → request record written to the request sink
//! ```

pub mod body;
pub mod handlers;
pub mod middleware;
pub mod server;

pub use server::{HttpServer, ServerError};
