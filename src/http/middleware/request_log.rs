//! Request logging middleware.
//!
//! Records one structured entry per request on the request log sink: trace
//! id, request line, caller details, the request body, timestamps, latency,
//! headers and a size-capped prefix of the response body.
//!
//! The entry is built once the response body has been fully sent (or
//! dropped) and written from a detached blocking task, so neither the
//! response nor the client ever waits on log I/O.

use std::future::poll_fn;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};
use bytes::BytesMut;
use chrono::{DateTime, Utc};
use http_body::Body as _;
use serde_json::{Map, Value};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::http::body::{CaptureBody, Captured, ReplayBody};
use crate::observability::logging::{LogContext, LogSink};
use crate::observability::trace::{self, TraceId};

/// Message attached to every request record.
pub const REQUEST_LOG_MESSAGE: &str = "REQUEST LOG";

/// Shared state of the request logger.
#[derive(Clone)]
pub struct RequestLogState {
    sink: Arc<dyn LogSink>,
    max_response_log_size: usize,
    max_request_log_size: usize,
}

impl RequestLogState {
    pub fn new(sink: Arc<dyn LogSink>, config: &ServerConfig) -> Self {
        Self {
            sink,
            max_response_log_size: config.max_response_log_size,
            max_request_log_size: config.max_request_log_size,
        }
    }
}

/// Request metadata captured before the handler runs.
struct PendingRecord {
    sink: Arc<dyn LogSink>,
    start: Instant,
    trace_id: TraceId,
    request_uri: String,
    method: Method,
    referer: String,
    client_ip: String,
    request_body: Value,
    request_time: String,
    headers: Value,
    status: StatusCode,
    max_response_log_size: usize,
}

/// Axum middleware logging each request/response pair.
pub async fn request_log(
    State(state): State<RequestLogState>,
    mut req: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_time = timestamp_float(Utc::now());

    let trace_id = TraceId::from_headers(req.headers());
    req.extensions_mut().insert(trace_id.clone());

    let request_uri = req
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| req.uri().path().to_string());
    let method = req.method().clone();
    let referer = header_str(req.headers(), header::REFERER.as_str()).unwrap_or_default();
    let client_ip = client_ip(&req);
    let headers = headers_value(req.headers());

    let (req, request_body) = extract_request_body(req, state.max_request_log_size).await;

    let span = tracing::debug_span!("request", trace_id = %trace_id, method = %method, uri = %request_uri);
    let response = trace::scope(trace_id.clone(), next.run(req))
        .instrument(span)
        .await;

    let pending = PendingRecord {
        sink: state.sink,
        start,
        trace_id,
        request_uri,
        method,
        referer,
        client_ip,
        request_body,
        request_time,
        headers,
        status: response.status(),
        max_response_log_size: state.max_response_log_size,
    };

    let limit = state.max_response_log_size;
    let (parts, body) = response.into_parts();
    let body = CaptureBody::new(body, limit, move |captured| pending.emit(captured));
    Response::from_parts(parts, Body::new(body))
}

impl PendingRecord {
    fn emit(self, captured: Captured) {
        let latency = self.start.elapsed();
        let context = self.build_context(&captured, latency);
        let sink = self.sink;

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                // Fire and forget.
                let _ = handle.spawn_blocking(move || write_record(sink.as_ref(), &context));
            }
            Err(_) => write_record(sink.as_ref(), &context),
        }
    }

    fn build_context(&self, captured: &Captured, latency: Duration) -> LogContext {
        let bound = truncation_bound(captured.total_len, self.max_response_log_size)
            .min(captured.bytes.len());
        let response_body = String::from_utf8_lossy(&captured.bytes[..bound]).into_owned();

        let mut context = LogContext::new();
        context
            .insert("trace_id", self.trace_id.as_str())
            .insert("request_uri", self.request_uri.as_str())
            .insert("request_method", self.method.as_str())
            .insert("refer_service_name", self.referer.as_str())
            .insert("refer_request_host", self.client_ip.as_str())
            .insert("request_body", self.request_body.clone())
            .insert("request_time", self.request_time.as_str())
            .insert("response_time", timestamp_float(Utc::now()))
            .insert("response_body", response_body)
            .insert("status_code", self.status.as_u16())
            .insert("time_used", format!("{:?}", latency))
            .insert("header", self.headers.clone());
        context
    }
}

fn write_record(sink: &dyn LogSink, context: &LogContext) {
    if let Err(e) = sink.info(REQUEST_LOG_MESSAGE, context) {
        tracing::debug!(error = %e, "Request log write failed");
    }
}

/// Number of response body bytes to log: one less than the body length,
/// capped at `max`, and zero for an empty body.
pub fn truncation_bound(body_len: usize, max: usize) -> usize {
    body_len.saturating_sub(1).min(max)
}

/// Unix time in seconds with a microsecond fraction.
pub fn timestamp_float(now: DateTime<Utc>) -> String {
    format!("{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Caller address: first `X-Forwarded-For` hop, then `X-Real-IP`, then the peer.
fn client_ip(req: &Request) -> String {
    let headers = req.headers();
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty()) {
            return first.to_string();
        }
    }
    if let Some(real_ip) = header_str(headers, "x-real-ip") {
        return real_ip;
    }

    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_default()
}

/// Header name → list of values, in arrival order.
fn headers_value(headers: &HeaderMap) -> Value {
    let mut map = Map::new();
    for name in headers.keys() {
        let values = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        map.insert(name.as_str().to_string(), Value::Array(values));
    }
    Value::Object(map)
}

/// Query string as a JSON object. A repeated key becomes an array.
pub fn query_value(query: Option<&str>) -> Value {
    let mut map = Map::new();
    for (key, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        let value = Value::String(value.into_owned());
        match map.get_mut(key.as_ref()) {
            None => {
                map.insert(key.into_owned(), value);
            }
            Some(Value::Array(values)) => values.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
        }
    }
    Value::Object(map)
}

/// Capture the request body for logging, handing back an equivalent request.
async fn extract_request_body(req: Request, max_size: usize) -> (Request, Value) {
    match *req.method() {
        Method::GET => {
            let value = query_value(req.uri().query());
            (req, value)
        }
        Method::POST | Method::PUT | Method::PATCH => buffer_json_body(req, max_size).await,
        _ => (req, Value::Null),
    }
}

async fn buffer_json_body(req: Request, max_size: usize) -> (Request, Value) {
    let declared = req
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > max_size) {
        tracing::debug!(content_length = declared, max_size, "Request body too large to log");
        return (req, Value::Null);
    }

    let (parts, mut body) = req.into_parts();
    let mut buffer = BytesMut::new();
    let mut trailers = None;
    let mut overflow = false;

    // Bodies without a declared length are read at most one frame past `max_size`.
    while let Some(frame) = poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return (Request::from_parts(parts, Body::empty()), Value::Null);
            }
        };
        match frame.into_data() {
            Ok(data) => {
                buffer.extend_from_slice(&data);
                if buffer.len() > max_size {
                    overflow = true;
                    break;
                }
            }
            Err(frame) => {
                trailers = frame.into_trailers().ok();
                break;
            }
        }
    }
    let bytes = buffer.freeze();

    let value = if overflow {
        tracing::debug!(read = bytes.len(), max_size, "Streamed request body too large to log");
        Value::Null
    } else if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Request body is not valid JSON");
                Value::Null
            }
        }
    };

    let body = Body::new(ReplayBody::new(bytes, body, trailers));
    (Request::from_parts(parts, body), value)
}
