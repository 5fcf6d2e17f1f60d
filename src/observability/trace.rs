//! Per-request trace identifiers.
//!
//! The identifier is taken from the `gateway-trace` request header or
//! generated, and is visible to everything running inside the request's
//! task-local scope. Leaving the scope (normally or by unwinding) releases it.

use std::fmt;
use std::future::Future;

use axum::http::HeaderMap;

/// Header carrying an upstream trace identifier.
pub const TRACE_HEADER: &str = "gateway-trace";

tokio::task_local! {
    static CURRENT_TRACE_ID: TraceId;
}

/// Correlation identifier tying together all log lines of one request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// Generate a fresh identifier.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Reuse the `gateway-trace` header verbatim when present and non-blank,
    /// otherwise generate.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(TRACE_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.trim().is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_else(Self::generate)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Run `fut` with `id` as the current trace identifier.
pub async fn scope<F: Future>(id: TraceId, fut: F) -> F::Output {
    CURRENT_TRACE_ID.scope(id, fut).await
}

/// Trace identifier of the request being handled, if any.
pub fn current_trace_id() -> Option<TraceId> {
    CURRENT_TRACE_ID.try_with(Clone::clone).ok()
}
