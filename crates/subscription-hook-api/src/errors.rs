//! Error types for the HTTP service

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use subscription_hook_core::WebhookError;
use tracing::{error, warn};

/// Delay suggested to the provider before it re-delivers after a transient failure
const RETRY_AFTER_SECONDS: u64 = 60;

/// Webhook handler errors with HTTP status code mapping
///
/// - `400 Bad Request`: signature failures and malformed payloads; the
///   provider should not retry
/// - `405 Method Not Allowed`: anything other than `POST` on the webhook path
/// - `413 Payload Too Large`: body exceeds `server.max_body_size`
/// - `500 Internal Server Error`: store or provider lookup failures; the
///   delivery is not acknowledged so the provider retries it
///
/// Messages for server-side failures are sanitised; details go to the log.
#[derive(Debug, thiserror::Error)]
pub enum WebhookHandlerError {
    #[error(transparent)]
    ProcessingFailed(#[from] WebhookError),

    #[error("Payload too large (max: {max_size} bytes)")]
    PayloadTooLarge { max_size: usize },

    /// Body could not be read from the connection
    #[error("Failed to read request body: {message}")]
    BodyUnreadable { message: String },
}

impl WebhookHandlerError {
    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ProcessingFailed(e) => match e {
                WebhookError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
                WebhookError::SignatureInvalid(_) | WebhookError::MalformedPayload { .. } => {
                    StatusCode::BAD_REQUEST
                }
                WebhookError::Store(_) | WebhookError::ProviderLookup(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::BodyUnreadable { .. } => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for WebhookHandlerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let (message, retry_after) = match &self {
            Self::ProcessingFailed(WebhookError::MethodNotAllowed { method }) => {
                let body = serde_json::json!({
                    "error": "Method not allowed",
                    "method": method,
                    "status": status.as_u16(),
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                });
                let mut response = (status, Json(body)).into_response();
                response
                    .headers_mut()
                    .insert(header::ALLOW, HeaderValue::from_static("POST"));
                return response;
            }
            Self::ProcessingFailed(e) if status.is_server_error() => {
                error!(error = %e, transient = e.is_transient(), "Webhook handler failed");
                let retry = e.is_transient().then_some(RETRY_AFTER_SECONDS);
                ("Webhook handler failed".to_string(), retry)
            }
            Self::ProcessingFailed(e) => {
                warn!(error = %e, "Rejected webhook delivery");
                (e.to_string(), None)
            }
            Self::PayloadTooLarge { max_size } => {
                warn!(max_size = *max_size, "Payload too large");
                (self.to_string(), None)
            }
            Self::BodyUnreadable { message } => {
                warn!(error = %message, "Failed to read request body");
                (self.to_string(), None)
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });

        let mut response = (status, Json(body)).into_response();

        if let Some(retry_seconds) = retry_after {
            if let Ok(header_value) = retry_seconds.to_string().parse() {
                response.headers_mut().insert(header::RETRY_AFTER, header_value);
            }
        }

        response
    }
}

/// Service-level errors
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Failed to bind to address {address}: {message}")]
    BindFailed { address: String, message: String },

    #[error("Server failed: {message}")]
    ServerFailed { message: String },
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration loading failed: {0}")]
    Loading(#[from] config::ConfigError),
}
