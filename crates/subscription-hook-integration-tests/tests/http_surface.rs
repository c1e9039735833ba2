//! HTTP surface behaviour with the real processor wired in.

mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use subscription_hook_core::UnknownCustomerPolicy;
use tower::ServiceExt;
use wiremock::MockServer;

#[tokio::test]
async fn test_get_on_webhook_path_is_405() {
    let stripe = MockServer::start().await;
    let harness = TestHarness::new(&stripe, UnknownCustomerPolicy::default());

    let request = Request::builder()
        .method("GET")
        .uri(WEBHOOK_PATH)
        .body(Body::empty())
        .unwrap();
    let response = harness.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let body = json_body(response).await;
    assert_eq!(body["error"], "Method not allowed");
    assert_eq!(harness.store.operation_count(), 0);
}

#[tokio::test]
async fn test_signed_put_is_still_405() {
    let stripe = MockServer::start().await;
    let harness = TestHarness::new(&stripe, UnknownCustomerPolicy::default());

    let body = checkout_completed(Some("cust_42"), "cus_ABC", "sub_1");
    let header = signer().sign(&body, now()).unwrap();
    let request = Request::builder()
        .method("PUT")
        .uri(WEBHOOK_PATH)
        .header("stripe-signature", header)
        .body(Body::from(body))
        .unwrap();
    let response = harness.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn test_body_over_limit_is_413() {
    let stripe = MockServer::start().await;
    let harness = TestHarness::new(&stripe, UnknownCustomerPolicy::default());

    let oversized = vec![b' '; test_config().server.max_body_size + 1];
    let response = harness
        .router
        .oneshot(signed_post(&oversized))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(harness.store.operation_count(), 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let stripe = MockServer::start().await;
    let harness = TestHarness::new(&stripe, UnknownCustomerPolicy::default());

    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();
    let response = harness.router.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["status"], "healthy");
}
