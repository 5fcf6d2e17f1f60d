//! HTTP server bootstrap.
//!
//! # Responsibilities
//! - Collect caller routes and optional handler overrides
//! - Open the application, system and request log sinks
//! - Wire up middleware (request log, panic recovery, tracing) and the
//!   not-found fallback
//! - Bind the configured address and serve until shutdown
//!
//! # Lifecycle
//! ```text
//! new() ──init()──▶ initialized ──start()/serve()──▶ running
//!          │
//!          └─ second init() → AlreadyInitialized
//! start() before init() → NotInitialized (nothing is bound)
//! ```

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    handler::Handler,
    middleware,
    response::Response,
    routing::{any, MethodRouter},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::http::handlers::{self, RecoverHandler};
use crate::http::middleware::{request_log, RequestLogState};
use crate::lifecycle::{signals, Shutdown};
use crate::observability::logging::{LogManager, LogPaths};

/// Errors raised by the server lifecycle.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("HTTP server is already initialized")]
    AlreadyInitialized,

    #[error("HTTP server must be initialized before it is started")]
    NotInitialized,

    #[error("failed to open log sinks: {0}")]
    Logger(#[source] std::io::Error),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server wiring routes, logging and recovery together.
pub struct HttpServer {
    config: ServerConfig,
    routes: Router,
    not_found: Option<MethodRouter>,
    recover: Option<RecoverHandler>,
    router: Option<Router>,
    loggers: Option<LogManager>,
    shutdown: Shutdown,
}

impl HttpServer {
    /// Create an uninitialized server with no routes.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            routes: Router::new(),
            not_found: None,
            recover: None,
            router: None,
            loggers: None,
            shutdown: Shutdown::new(),
        }
    }

    /// Merge application routes. Must be called before `init`.
    pub fn routes(mut self, routes: Router) -> Self {
        self.routes = self.routes.merge(routes);
        self
    }

    /// Replace the handler used for unmatched routes and unmatched methods.
    pub fn not_found_handler<H, T>(mut self, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.not_found = Some(any(handler));
        self
    }

    /// Replace the handler turning a caught panic into a response.
    pub fn recover_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(Box<dyn Any + Send + 'static>) -> Response + Send + Sync + 'static,
    {
        self.recover = Some(Arc::new(handler));
        self
    }

    /// Open the file-backed log sinks and wire the router.
    pub fn init(&mut self) -> Result<(), ServerError> {
        if self.is_initialized() {
            return Err(ServerError::AlreadyInitialized);
        }

        let paths = LogPaths::resolve(&self.config.log_path, &self.config.system_name);
        let loggers = LogManager::open(&paths, self.config.debug).map_err(ServerError::Logger)?;
        self.init_with_loggers(loggers)
    }

    /// Wire the router around already opened sinks.
    pub fn init_with_loggers(&mut self, loggers: LogManager) -> Result<(), ServerError> {
        if self.is_initialized() {
            return Err(ServerError::AlreadyInitialized);
        }

        let not_found = self
            .not_found
            .clone()
            .unwrap_or_else(|| any(handlers::not_found));
        let recover = self
            .recover
            .clone()
            .unwrap_or_else(|| handlers::default_recover(loggers.system().clone()));
        let log_state = RequestLogState::new(loggers.request().clone(), &self.config);

        // Later layers wrap earlier ones: request log is outermost.
        let router = self
            .routes
            .clone()
            .fallback(not_found.clone())
            .method_not_allowed_fallback(not_found)
            .layer(CatchPanicLayer::custom(
                move |payload: Box<dyn Any + Send + 'static>| recover(payload),
            ))
            .layer(middleware::from_fn_with_state(log_state, request_log))
            .layer(TraceLayer::new_for_http());

        self.router = Some(router);
        self.loggers = Some(loggers);

        tracing::info!(
            address = %self.config.address,
            debug = self.config.debug,
            "HTTP server initialized"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.router.is_some()
    }

    /// The fully wired router, once initialized.
    pub fn router(&self) -> Option<Router> {
        self.router.clone()
    }

    /// The log sinks opened by `init`.
    pub fn loggers(&self) -> Option<&LogManager> {
        self.loggers.as_ref()
    }

    /// Handle that stops a running server when triggered.
    pub fn shutdown(&self) -> &Shutdown {
        &self.shutdown
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        if !self.is_initialized() {
            return Err(ServerError::NotInitialized);
        }

        let listener = TcpListener::bind(&self.config.address)
            .await
            .map_err(|source| ServerError::Bind {
                address: self.config.address.clone(),
                source,
            })?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until shutdown.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let router = self.router.clone().ok_or(ServerError::NotInitialized)?;
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let shutdown = self.shutdown.clone();
        let app = router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                tokio::select! {
                    _ = signals::wait_for_signal() => {},
                    _ = shutdown.wait() => {},
                }
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
