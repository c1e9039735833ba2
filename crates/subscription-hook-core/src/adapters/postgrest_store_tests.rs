//! Tests for the PostgREST subscriber store

use super::*;
use crate::events::SubscriptionStatus;
use crate::Timestamp;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, headers, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SERVICE_KEY: &str = "service-role-key";

fn store_for(server: &MockServer) -> PostgrestSubscriberStore {
    let url = Url::parse(&server.uri()).unwrap();
    PostgrestSubscriberStore::new(PostgrestConfig::new(url, SecretString::new(SERVICE_KEY)))
        .unwrap()
}

fn record() -> SubscriberRecord {
    SubscriberRecord::activated(
        "cust_42",
        Some("cus_ABC".to_string()),
        Some("sub_1".to_string()),
        Timestamp::from_unix_seconds(1_700_000_000).unwrap(),
    )
}

#[test]
fn test_table_url_appends_rest_path() {
    let config = PostgrestConfig::new(
        Url::parse("https://project.supabase.co/").unwrap(),
        SecretString::new(SERVICE_KEY),
    )
    .with_table("subscribers");
    let store = PostgrestSubscriberStore::new(config).unwrap();

    assert_eq!(
        store.table_url().as_str(),
        "https://project.supabase.co/rest/v1/subscribers"
    );
}

#[test]
fn test_debug_output_hides_service_key() {
    let config = PostgrestConfig::new(
        Url::parse("https://project.supabase.co").unwrap(),
        SecretString::new(SERVICE_KEY),
    );
    let store = PostgrestSubscriberStore::new(config).unwrap();

    assert!(!format!("{:?}", store).contains(SERVICE_KEY));
}

#[tokio::test]
async fn test_upsert_posts_record_with_conflict_resolution() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/premium_users"))
        .and(query_param("on_conflict", "customer_id"))
        .and(header("apikey", SERVICE_KEY))
        .and(header("authorization", "Bearer service-role-key"))
        .and(headers("prefer", vec!["resolution=merge-duplicates", "return=minimal"]))
        .and(body_partial_json(json!({
            "customer_id": "cust_42",
            "stripe_customer_id": "cus_ABC",
            "subscription_id": "sub_1",
            "status": "active",
            "updated_at": "2023-11-14T22:13:20Z"
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    store_for(&server).upsert(&record()).await.unwrap();
}

#[tokio::test]
async fn test_find_customer_id_selects_only_the_key() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/premium_users"))
        .and(query_param("stripe_customer_id", "eq.cus_ABC"))
        .and(query_param("select", "customer_id"))
        .and(query_param("limit", "1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "customer_id": "cust_42" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let found = store_for(&server).find_customer_id("cus_ABC").await.unwrap();

    assert_eq!(found.as_deref(), Some("cust_42"));
}

#[tokio::test]
async fn test_find_customer_id_ignores_columns_outside_the_record_shape() {
    let server = MockServer::start().await;

    // Offset-less timestamp, legacy status and an extra column
    Mock::given(method("GET"))
        .and(path("/rest/v1/premium_users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "customer_id": "cust_1",
            "stripe_customer_id": "cus_1",
            "subscription_id": "sub_1",
            "status": "premium",
            "updated_at": "2024-01-01T00:00:00.123456",
            "id": 7
        }])))
        .mount(&server)
        .await;

    let found = store_for(&server).find_customer_id("cus_1").await.unwrap();

    assert_eq!(found.as_deref(), Some("cust_1"));
}

#[tokio::test]
async fn test_find_customer_id_with_no_rows() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/premium_users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let found = store_for(&server)
        .find_customer_id("cus_missing")
        .await
        .unwrap();

    assert!(found.is_none());
}

#[tokio::test]
async fn test_update_status_patches_by_customer_id() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/premium_users"))
        .and(query_param("customer_id", "eq.cust_42"))
        .and(body_partial_json(json!({
            "status": "canceled",
            "subscription_id": "sub_1"
        })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "customer_id": "cust_42" }])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let update = StatusUpdate {
        status: SubscriptionStatus::Canceled,
        subscription_id: "sub_1".to_string(),
        updated_at: Timestamp::now(),
    };

    let changed = store_for(&server)
        .update_status("cust_42", &update)
        .await
        .unwrap();

    assert_eq!(changed, 1);
}

#[tokio::test]
async fn test_server_error_maps_to_unavailable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = store_for(&server).upsert(&record()).await.unwrap_err();

    assert!(matches!(err, StoreError::Unavailable { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_client_error_maps_to_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .find_customer_id("cus_ABC")
        .await
        .unwrap_err();

    match err {
        StoreError::Rejected { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "invalid api key");
        }
        other => panic!("expected rejected error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_undecodable_rows_map_to_decode_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = store_for(&server)
        .find_customer_id("cus_ABC")
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Decode { .. }));
}
