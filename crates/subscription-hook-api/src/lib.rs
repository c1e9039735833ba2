//! # Subscription-Hook HTTP Service
//!
//! HTTP surface for receiving payment provider webhooks.
//!
//! This service provides:
//! - The webhook endpoint (`POST` only) with raw-body signature verification
//! - A liveness endpoint
//! - Request logging with correlation IDs

pub mod config;
pub mod errors;
pub mod extract;

pub use config::{
    ConfigSources, LoggingConfig, ServerConfig, ServiceConfig, StoreConfig, StripeConfig,
    WebhookConfig,
};
pub use errors::{ConfigError, ServiceError, WebhookHandlerError};
pub use extract::RawWebhookRequest;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::Method,
    middleware,
    response::{Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;
use subscription_hook_core::{Acknowledgement, Timestamp, WebhookError, WebhookProcessor};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

// ============================================================================
// Application State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configuration for the service
    pub config: Arc<ServiceConfig>,

    /// Verifies and dispatches webhook deliveries
    pub webhook_processor: Arc<dyn WebhookProcessor>,
}

impl AppState {
    /// Create new application state
    pub fn new(config: ServiceConfig, webhook_processor: Arc<dyn WebhookProcessor>) -> Self {
        Self {
            config: Arc::new(config),
            webhook_processor,
        }
    }
}

// ============================================================================
// HTTP Server
// ============================================================================

/// Create HTTP router with all endpoints
pub fn create_router(state: AppState) -> Router {
    let webhook_route = post(handle_webhook).fallback(handle_method_not_allowed);

    Router::new()
        .route(&state.config.server.endpoint_path, webhook_route)
        .route("/health", get(handle_health_check))
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(request_logging_middleware))
                .into_inner(),
        )
        .with_state(state)
}

/// Start HTTP server
///
/// Serves until SIGINT or SIGTERM, then lets in-flight requests finish.
pub async fn start_server(
    config: ServiceConfig,
    webhook_processor: Arc<dyn WebhookProcessor>,
) -> Result<(), ServiceError> {
    let address = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config, webhook_processor);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .map_err(|e| ServiceError::BindFailed {
            address: address.clone(),
            message: e.to_string(),
        })?;

    info!("Starting HTTP server on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ServiceError::ServerFailed {
            message: e.to_string(),
        })?;

    info!("HTTP server shutdown complete");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
///
/// A handler that cannot be installed never resolves, leaving the other
/// signal in charge.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        },
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

// ============================================================================
// Webhook Handlers
// ============================================================================

/// Handle a provider webhook delivery
///
/// The body arrives as raw bytes and is handed to the processor untouched.
/// The response is only sent after every store write for the event has
/// completed, so a `200` means the delivery was fully applied.
#[instrument(skip(state, request))]
pub async fn handle_webhook(
    State(state): State<AppState>,
    RawWebhookRequest(request): RawWebhookRequest,
) -> Result<Json<Acknowledgement>, WebhookHandlerError> {
    info!(body_len = request.body.len(), "Received webhook request");

    let acknowledgement = state.webhook_processor.process_webhook(request).await?;

    info!(
        event_type = %acknowledgement.event_type,
        "Successfully processed webhook"
    );

    Ok(Json(acknowledgement))
}

/// Reject any method other than `POST` on the webhook path
///
/// Runs before any body is read.
async fn handle_method_not_allowed(method: Method) -> WebhookHandlerError {
    warn!(method = %method, "Method not allowed on webhook endpoint");
    WebhookHandlerError::ProcessingFailed(WebhookError::MethodNotAllowed {
        method: method.to_string(),
    })
}

// ============================================================================
// Health Check Handlers
// ============================================================================

/// Liveness check
async fn handle_health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Timestamp::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============================================================================
// Middleware
// ============================================================================

/// Request logging middleware with correlation ID tracking
///
/// Extracts or generates an `x-correlation-id`, logs request start and
/// completion, and echoes the id on the response.
#[instrument(skip(request, next), fields(
    method = %request.method(),
    uri = %request.uri(),
    correlation_id
))]
async fn request_logging_middleware(
    mut request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    let correlation_id = request
        .headers()
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    tracing::Span::current().record("correlation_id", correlation_id.as_str());

    request.extensions_mut().insert(correlation_id.clone());

    info!(
        correlation_id = %correlation_id,
        method = %method,
        uri = %uri,
        "Request started"
    );

    let mut response = next.run(request).await;
    let duration = start.elapsed();

    if let Ok(header_value) = correlation_id.parse() {
        response
            .headers_mut()
            .insert("x-correlation-id", header_value);
    }

    let status = response.status();

    if status.is_server_error() {
        error!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        warn!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        info!(
            correlation_id = %correlation_id,
            status = %status,
            duration_ms = %duration.as_millis(),
            "Request completed successfully"
        );
    }

    response
}

// ============================================================================
// Response Types
// ============================================================================

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: Timestamp,
    pub version: String,
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
