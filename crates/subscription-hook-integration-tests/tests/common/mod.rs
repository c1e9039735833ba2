//! Common test utilities for subscription-hook integration tests
//!
//! This module provides:
//! - A harness wiring the real processor to an in-memory record store
//! - Signed request builders
//! - Provider event fixtures

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, Response},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use subscription_hook_api::{create_router, AppState, ServiceConfig};
use subscription_hook_core::{
    adapters::{InMemorySubscriberStore, StripeClient, StripeClientConfig},
    EventDispatcher, SecretString, SignatureVerifier, UnknownCustomerPolicy, WebhookProcessorImpl,
};
use url::Url;
use wiremock::MockServer;

pub const WEBHOOK_SECRET: &str = "whsec_integration_secret";
pub const WEBHOOK_PATH: &str = "/api/webhook";

// ============================================================================
// Harness
// ============================================================================

/// Router backed by the real processor and an in-memory store
pub struct TestHarness {
    pub router: Router,
    pub store: InMemorySubscriberStore,
}

impl TestHarness {
    /// Harness whose provider client points at `stripe`
    pub fn new(stripe: &MockServer, policy: UnknownCustomerPolicy) -> Self {
        Self::with_store(stripe, policy, InMemorySubscriberStore::new())
    }

    pub fn with_store(
        stripe: &MockServer,
        policy: UnknownCustomerPolicy,
        store: InMemorySubscriberStore,
    ) -> Self {
        let provider = StripeClient::new(StripeClientConfig::new(
            Url::parse(&stripe.uri()).unwrap(),
            SecretString::new("sk_test_integration"),
        ))
        .unwrap();

        let dispatcher = EventDispatcher::new(Arc::new(store.clone()), Arc::new(provider))
            .with_unknown_customer_policy(policy);
        let processor = WebhookProcessorImpl::new(signer(), dispatcher);

        let router = create_router(AppState::new(test_config(), Arc::new(processor)));

        Self { router, store }
    }
}

pub fn test_config() -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.stripe.webhook_secret = SecretString::new(WEBHOOK_SECRET);
    config.stripe.secret_key = SecretString::new("sk_test_integration");
    config.store.url = "http://localhost:54321".to_string();
    config.store.service_key = SecretString::new("service-key");
    config
}

// ============================================================================
// Requests
// ============================================================================

pub fn signer() -> SignatureVerifier {
    SignatureVerifier::new(SecretString::new(WEBHOOK_SECRET))
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// POST `body` to the webhook path with a valid signature for the current time
pub fn signed_post(body: &[u8]) -> Request<Body> {
    signed_post_at(body, now())
}

/// POST `body` signed as if sent at `timestamp`
pub fn signed_post_at(body: &[u8], timestamp: i64) -> Request<Body> {
    let header = signer().sign(body, timestamp).unwrap();
    post_with_signature(body.to_vec(), Some(&header))
}

pub fn post_with_signature(body: Vec<u8>, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(WEBHOOK_PATH)
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header("stripe-signature", signature);
    }
    builder.body(Body::from(body)).unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// ============================================================================
// Event fixtures
// ============================================================================

fn event(event_type: &str, object: Value) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "id": format!("evt_{}", event_type.replace('.', "_")),
        "object": "event",
        "api_version": "2024-06-20",
        "type": event_type,
        "created": now(),
        "livemode": false,
        "data": { "object": object }
    }))
    .unwrap()
}

pub fn checkout_completed(
    client_reference_id: Option<&str>,
    customer: &str,
    subscription: &str,
) -> Vec<u8> {
    event(
        "checkout.session.completed",
        json!({
            "id": "cs_test_a1",
            "object": "checkout.session",
            "client_reference_id": client_reference_id,
            "customer": customer,
            "subscription": subscription,
            "mode": "subscription",
            "payment_status": "paid"
        }),
    )
}

pub fn subscription_event(event_type: &str, id: &str, customer: &str, status: &str) -> Vec<u8> {
    event(
        event_type,
        json!({
            "id": id,
            "object": "subscription",
            "customer": customer,
            "status": status,
            "cancel_at_period_end": false
        }),
    )
}

pub fn invoice_event(event_type: &str, customer: &str, subscription: Option<&str>) -> Vec<u8> {
    event(
        event_type,
        json!({
            "id": "in_test_1",
            "object": "invoice",
            "customer": customer,
            "subscription": subscription,
            "amount_paid": 900
        }),
    )
}

pub fn unrecognized_event(event_type: &str) -> Vec<u8> {
    event(event_type, json!({ "id": "obj_1", "object": "price" }))
}

/// Provider API body for a retrieved subscription
pub fn stripe_subscription(id: &str, customer: &str, status: &str) -> Value {
    json!({
        "id": id,
        "object": "subscription",
        "customer": customer,
        "status": status
    })
}
