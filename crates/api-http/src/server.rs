//! HTTP Server
//!
//! Builds the axum router with its middleware stack and serves it until the
//! shutdown token fires.

use crate::handler::{self, HttpState};
use axum::http::{HeaderName, StatusCode};
use axum::routing::get;
use axum::Router;
use bgsync_core::application::ShutdownToken;
use bgsync_core::error::{AppError, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
const DEFAULT_HTTP_PORT: u16 = 8000;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP Server Configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HTTP_HOST.to_string(),
            port: DEFAULT_HTTP_PORT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Build the application router with all middleware layers.
///
/// Layers apply bottom-up: request id assignment, request tracing, request id
/// propagation to the response, timeout, panic recovery.
pub fn build_router(state: HttpState, config: &HttpServerConfig) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/start-sync", get(handler::start_sync))
        .route("/jobs/{id}", get(handler::job_status))
        .route("/health", get(handler::health))
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            config.request_timeout,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}

/// Running server: its bound address and the serve task
pub struct HttpServerHandle {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl HttpServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wait for the server to finish draining after shutdown
    pub async fn stopped(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "HTTP server task ended abnormally");
        }
    }
}

/// HTTP Server
pub struct HttpServer {
    config: HttpServerConfig,
    state: HttpState,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, state: HttpState) -> Self {
        Self { config, state }
    }

    /// Bind and start serving in a background task
    ///
    /// Port 0 binds an ephemeral port; the handle reports the actual address.
    pub async fn start(self, mut shutdown: ShutdownToken) -> Result<HttpServerHandle> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| AppError::Config(format!("Failed to bind HTTP server on {}: {}", addr, e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| AppError::Internal(format!("Failed to read bound address: {}", e)))?;

        let router = build_router(self.state, &self.config);
        info!(addr = %local_addr, "HTTP server listening");

        let task = tokio::spawn(async move {
            let result = axum::serve(listener, router)
                .with_graceful_shutdown(async move { shutdown.wait().await })
                .await;
            match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => error!(error = %e, "HTTP server error"),
            }
        });

        Ok(HttpServerHandle { local_addr, task })
    }
}
