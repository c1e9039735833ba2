//! In-memory subscriber store for development and testing.

use crate::store::{StatusUpdate, StoreError, SubscriberRecord, SubscriberStore};
use async_trait::async_trait;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, RwLock,
    },
};

/// Subscriber store backed by a `HashMap` keyed by `customer_id`
///
/// Clones share the same underlying map, so a test can keep a handle while
/// the processor owns another. `set_unavailable(true)` makes every operation
/// fail with [`StoreError::Unavailable`].
#[derive(Debug, Clone, Default)]
pub struct InMemorySubscriberStore {
    records: Arc<RwLock<HashMap<String, SubscriberRecord>>>,
    unavailable: Arc<AtomicBool>,
    operations: Arc<AtomicUsize>,
}

impl InMemorySubscriberStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with records
    pub fn with_records(records: impl IntoIterator<Item = SubscriberRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|record| (record.customer_id.clone(), record))
            .collect();

        Self {
            records: Arc::new(RwLock::new(map)),
            ..Self::default()
        }
    }

    /// Simulate an outage of the backing store
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Snapshot of the record for `customer_id`
    pub fn get(&self, customer_id: &str) -> Option<SubscriberRecord> {
        self.records
            .read()
            .ok()
            .and_then(|records| records.get(customer_id).cloned())
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of store operations attempted, including failed ones
    pub fn operation_count(&self) -> usize {
        self.operations.load(Ordering::SeqCst)
    }

    fn begin_operation(&self) -> Result<(), StoreError> {
        self.operations.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                message: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Unavailable {
        message: "in-memory store lock poisoned".to_string(),
    }
}

#[async_trait]
impl SubscriberStore for InMemorySubscriberStore {
    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), StoreError> {
        self.begin_operation()?;
        let mut records = self.records.write().map_err(poisoned)?;
        records.insert(record.customer_id.clone(), record.clone());
        Ok(())
    }

    async fn find_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<String>, StoreError> {
        self.begin_operation()?;
        let records = self.records.read().map_err(poisoned)?;

        // Lowest customer_id wins so lookups are deterministic when several
        // rows share a provider customer.
        Ok(records
            .values()
            .filter(|r| r.stripe_customer_id.as_deref() == Some(stripe_customer_id))
            .map(|r| r.customer_id.clone())
            .min())
    }

    async fn update_status(
        &self,
        customer_id: &str,
        update: &StatusUpdate,
    ) -> Result<u64, StoreError> {
        self.begin_operation()?;
        let mut records = self.records.write().map_err(poisoned)?;

        match records.get_mut(customer_id) {
            Some(record) => {
                record.status = update.status;
                record.subscription_id = Some(update.subscription_id.clone());
                record.updated_at = update.updated_at;
                Ok(1)
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
#[path = "memory_store_tests.rs"]
mod tests;
