//! Raw body capture for the webhook route.

use crate::{errors::WebhookHandlerError, AppState};
use axum::{
    extract::{FromRequest, Request},
    http::StatusCode,
};
use bytes::Bytes;
use subscription_hook_core::WebhookRequest;
use tracing::debug;

/// Extracts the exact request bytes and the configured signature header
///
/// This is the only body extractor on the webhook route, so no JSON parsing
/// or re-encoding can happen before the signature is checked.
#[derive(Debug)]
pub struct RawWebhookRequest(pub WebhookRequest);

impl FromRequest<AppState> for RawWebhookRequest {
    type Rejection = WebhookHandlerError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let signature = req
            .headers()
            .get(state.config.webhook.signature_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);

        let body = Bytes::from_request(req, state).await.map_err(|rejection| {
            if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                WebhookHandlerError::PayloadTooLarge {
                    max_size: state.config.server.max_body_size,
                }
            } else {
                WebhookHandlerError::BodyUnreadable {
                    message: rejection.body_text(),
                }
            }
        })?;

        debug!(
            body_len = body.len(),
            has_signature = signature.is_some(),
            "Captured raw webhook body"
        );

        Ok(Self(WebhookRequest::new(body, signature)))
    }
}
