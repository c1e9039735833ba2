//! # Webhook Processing
//!
//! Request model, error taxonomy and the processing pipeline that ties
//! signature verification to event dispatch.
//!
//! The pipeline is:
//!
//! 1. Verify the signature header against the raw bytes
//! 2. Decode the verified bytes into an [`InboundEvent`](crate::InboundEvent)
//! 3. Dispatch the event to its handler
//! 4. Return an [`Acknowledgement`] naming the event type
//!
//! Verification failures stop the pipeline before any handler runs.

use crate::dispatch::EventDispatcher;
use crate::provider::ProviderError;
use crate::signature::{SignatureError, SignatureVerifier};
use crate::store::StoreError;
use crate::Timestamp;
use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::{info, instrument, warn};

// ============================================================================
// Request and response
// ============================================================================

/// Raw webhook delivery as captured by the HTTP layer
///
/// `body` holds the exact bytes received; nothing upstream may parse or
/// re-encode them before verification.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub body: Bytes,
    /// Value of the signature header, if present
    pub signature: Option<String>,
    pub received_at: Timestamp,
}

impl WebhookRequest {
    /// Create new webhook request
    pub fn new(body: Bytes, signature: Option<String>) -> Self {
        Self {
            body,
            signature,
            received_at: Timestamp::now(),
        }
    }
}

/// Successful processing result returned to the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Acknowledgement {
    pub received: bool,
    pub event_type: String,
}

impl Acknowledgement {
    pub fn received(event_type: impl Into<String>) -> Self {
        Self {
            received: true,
            event_type: event_type.into(),
        }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that can occur while processing a delivery
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Method not allowed: {method}")]
    MethodNotAllowed { method: String },

    #[error("Webhook signature verification failed: {0}")]
    SignatureInvalid(#[from] SignatureError),

    #[error("Malformed payload: {message}")]
    MalformedPayload { message: String },

    #[error("Record store operation failed: {0}")]
    Store(#[from] StoreError),

    #[error("Provider lookup failed: {0}")]
    ProviderLookup(#[from] ProviderError),
}

impl WebhookError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MethodNotAllowed { .. } => false,
            Self::SignatureInvalid(_) => false,
            Self::MalformedPayload { .. } => false,
            Self::Store(store_error) => store_error.is_transient(),
            Self::ProviderLookup(provider_error) => provider_error.is_transient(),
        }
    }

    /// Whether the failure is caused by the request rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MethodNotAllowed { .. }
                | Self::SignatureInvalid(_)
                | Self::MalformedPayload { .. }
        )
    }
}

// ============================================================================
// Processor
// ============================================================================

/// Interface for processing webhook deliveries
#[async_trait]
pub trait WebhookProcessor: Send + Sync {
    /// Verify, decode and dispatch one delivery
    async fn process_webhook(&self, request: WebhookRequest)
        -> Result<Acknowledgement, WebhookError>;
}

/// Default processor composing a [`SignatureVerifier`] and an [`EventDispatcher`]
#[derive(Debug)]
pub struct WebhookProcessorImpl {
    verifier: SignatureVerifier,
    dispatcher: EventDispatcher,
}

impl WebhookProcessorImpl {
    pub fn new(verifier: SignatureVerifier, dispatcher: EventDispatcher) -> Self {
        Self {
            verifier,
            dispatcher,
        }
    }
}

#[async_trait]
impl WebhookProcessor for WebhookProcessorImpl {
    #[instrument(skip(self, request), fields(body_len = request.body.len()))]
    async fn process_webhook(
        &self,
        request: WebhookRequest,
    ) -> Result<Acknowledgement, WebhookError> {
        let event = self
            .verifier
            .construct_event(&request.body, request.signature.as_deref())
            .map_err(|e| {
                warn!(error = %e, "Rejected webhook delivery");
                e
            })?;

        info!(
            event_id = %event.id,
            event_type = %event.event_type,
            livemode = event.livemode,
            "Verified webhook event"
        );

        self.dispatcher.dispatch(&event).await
    }
}

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;
