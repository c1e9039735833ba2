//! Tests for the in-memory subscriber store

use super::*;
use crate::events::SubscriptionStatus;
use crate::Timestamp;

fn record(customer_id: &str, stripe_customer_id: &str) -> SubscriberRecord {
    SubscriberRecord::activated(
        customer_id,
        Some(stripe_customer_id.to_string()),
        Some("sub_1".to_string()),
        Timestamp::from_unix_seconds(1_700_000_000).unwrap(),
    )
}

#[tokio::test]
async fn test_upsert_inserts_then_replaces_by_customer_id() {
    let store = InMemorySubscriberStore::new();
    assert!(store.is_empty());

    store.upsert(&record("cust_42", "cus_ABC")).await.unwrap();
    assert_eq!(store.len(), 1);

    let mut replacement = record("cust_42", "cus_NEW");
    replacement.subscription_id = None;
    store.upsert(&replacement).await.unwrap();

    assert_eq!(store.len(), 1);
    let stored = store.get("cust_42").unwrap();
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_NEW"));
    assert_eq!(stored.subscription_id, None);
}

#[tokio::test]
async fn test_repeated_upsert_is_idempotent() {
    let store = InMemorySubscriberStore::new();
    let rec = record("cust_1", "cus_1");

    store.upsert(&rec).await.unwrap();
    store.upsert(&rec).await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.get("cust_1"), Some(rec));
}

#[tokio::test]
async fn test_find_customer_id() {
    let store =
        InMemorySubscriberStore::with_records([record("cust_1", "cus_1"), record("cust_2", "cus_2")]);

    let found = store.find_customer_id("cus_2").await.unwrap();
    assert_eq!(found, Some("cust_2".to_string()));

    assert!(store
        .find_customer_id("cus_missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_update_status_changes_only_target_fields() {
    let store = InMemorySubscriberStore::with_records([record("cust_1", "cus_1")]);
    let update = StatusUpdate {
        status: SubscriptionStatus::PastDue,
        subscription_id: "sub_2".to_string(),
        updated_at: Timestamp::from_unix_seconds(1_700_000_500).unwrap(),
    };

    let changed = store.update_status("cust_1", &update).await.unwrap();

    assert_eq!(changed, 1);
    let stored = store.get("cust_1").unwrap();
    assert_eq!(stored.status, SubscriptionStatus::PastDue);
    assert_eq!(stored.subscription_id.as_deref(), Some("sub_2"));
    assert_eq!(stored.stripe_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(stored.updated_at.unix_seconds(), 1_700_000_500);
}

#[tokio::test]
async fn test_update_status_for_missing_customer_changes_nothing() {
    let store = InMemorySubscriberStore::new();
    let update = StatusUpdate {
        status: SubscriptionStatus::Canceled,
        subscription_id: "sub_1".to_string(),
        updated_at: Timestamp::now(),
    };

    assert_eq!(store.update_status("nobody", &update).await.unwrap(), 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_unavailable_store_fails_every_operation() {
    let store = InMemorySubscriberStore::with_records([record("cust_1", "cus_1")]);
    store.set_unavailable(true);

    let err = store.upsert(&record("cust_2", "cus_2")).await.unwrap_err();
    assert!(err.is_transient());
    assert!(store.find_customer_id("cus_1").await.is_err());
    assert_eq!(store.operation_count(), 2);
    assert_eq!(store.len(), 1);

    store.set_unavailable(false);
    assert!(store.find_customer_id("cus_1").await.is_ok());
}

#[tokio::test]
async fn test_clones_share_records() {
    let store = InMemorySubscriberStore::new();
    let handle = store.clone();

    store.upsert(&record("cust_1", "cus_1")).await.unwrap();

    assert!(handle.get("cust_1").is_some());
    assert_eq!(handle.operation_count(), 1);
}
