//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::mpsc;
use tracing::Level;

use trellis::config::ServerConfig;
use trellis::observability::{LogContext, LogManager, LogSink, SinkError};
use trellis::HttpServer;

/// A record captured by [`ChannelSink`].
#[derive(Debug, Clone)]
pub struct Record {
    pub level: Level,
    pub message: String,
    pub context: LogContext,
}

/// In-memory sink forwarding every record over a channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Record>,
}

impl LogSink for ChannelSink {
    fn log(&self, level: Level, message: &str, context: &LogContext) -> Result<(), SinkError> {
        let _ = self.tx.send(Record {
            level,
            message: message.to_string(),
            context: context.clone(),
        });
        Ok(())
    }
}

/// Receivers for the three sinks of a test [`LogManager`].
pub struct Sinks {
    pub app: mpsc::UnboundedReceiver<Record>,
    pub system: mpsc::UnboundedReceiver<Record>,
    pub request: mpsc::UnboundedReceiver<Record>,
}

pub fn channel_loggers() -> (LogManager, Sinks) {
    let (app_tx, app) = mpsc::unbounded_channel();
    let (system_tx, system) = mpsc::unbounded_channel();
    let (request_tx, request) = mpsc::unbounded_channel();

    let manager = LogManager::new(
        Arc::new(ChannelSink { tx: app_tx }),
        Arc::new(ChannelSink { tx: system_tx }),
        Arc::new(ChannelSink { tx: request_tx }),
    );
    (manager, Sinks { app, system, request })
}

/// Wait for the next record, failing the test after a few seconds.
pub async fn next_record(rx: &mut mpsc::UnboundedReceiver<Record>) -> Record {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for log record")
        .expect("log channel closed")
}

/// Assert no further record arrives within a short window.
pub async fn assert_no_record(rx: &mut mpsc::UnboundedReceiver<Record>) {
    let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(result.is_err(), "unexpected log record: {:?}", result);
}

/// An initialized server over `routes`, logging into channels.
pub fn channel_server(config: ServerConfig, routes: Router) -> (HttpServer, Sinks) {
    let (loggers, sinks) = channel_loggers();
    let mut server = HttpServer::new(config).routes(routes);
    server.init_with_loggers(loggers).unwrap();
    (server, sinks)
}
