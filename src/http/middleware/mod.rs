//! HTTP middleware installed by the server bootstrap.

pub mod request_log;

pub use request_log::{request_log, RequestLogState, REQUEST_LOG_MESSAGE};
