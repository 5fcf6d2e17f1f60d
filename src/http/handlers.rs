//! Default not-found and panic recovery handlers.

use std::any::Any;
use std::sync::Arc;

use axum::{
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::observability::logging::{LogContext, LogSink};
use crate::observability::trace::current_trace_id;

/// Converts a caught panic payload into a response.
pub type RecoverHandler = Arc<dyn Fn(Box<dyn Any + Send + 'static>) -> Response + Send + Sync>;

/// Responds 404 for unmatched routes and unmatched methods.
pub async fn not_found(uri: Uri) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "code": StatusCode::NOT_FOUND.as_u16(),
            "message": format!("no route for {}", uri.path()),
        })),
    )
        .into_response()
}

/// Recovery handler writing the panic to `system` before answering 500.
pub fn default_recover(system: Arc<dyn LogSink>) -> RecoverHandler {
    Arc::new(move |payload: Box<dyn Any + Send + 'static>| {
        let message = panic_message(payload.as_ref());
        let trace_id = current_trace_id();
        tracing::error!(panic = %message, trace_id = ?trace_id, "Handler panicked");

        let mut context = LogContext::new();
        context
            .insert("trace_id", trace_id.map(|id| id.to_string()).unwrap_or_default())
            .insert("panic", message);
        if let Err(e) = system.error("PANIC RECOVERED", &context) {
            tracing::debug!(error = %e, "System log write failed");
        }

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "code": StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
                "message": "internal server error",
            })),
        )
            .into_response()
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned boom"));
        assert_eq!(panic_message(payload.as_ref()), "owned boom");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }

    #[tokio::test]
    async fn test_not_found_body() {
        let response = not_found(Uri::from_static("/missing")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["code"], 404);
        assert_eq!(body["message"], "no route for /missing");
    }
}
