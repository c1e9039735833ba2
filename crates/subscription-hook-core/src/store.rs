//! # Subscriber Record Store
//!
//! Abstraction over the external table holding one row per paying customer.
//! Implementations live in [`crate::adapters`].

use crate::events::SubscriptionStatus;
use crate::Timestamp;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One row in the subscriber table, keyed by `customer_id`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberRecord {
    /// Application customer identifier; unique key
    pub customer_id: String,
    /// Provider customer identifier (`cus_...`)
    pub stripe_customer_id: Option<String>,
    /// Provider subscription identifier (`sub_...`)
    pub subscription_id: Option<String>,
    pub status: SubscriptionStatus,
    pub updated_at: Timestamp,
}

impl SubscriberRecord {
    /// Record for a freshly completed checkout
    pub fn activated(
        customer_id: impl Into<String>,
        stripe_customer_id: Option<String>,
        subscription_id: Option<String>,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            stripe_customer_id,
            subscription_id,
            status: SubscriptionStatus::Active,
            updated_at,
        }
    }
}

/// Partial update applied to an existing record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub status: SubscriptionStatus,
    pub subscription_id: String,
    pub updated_at: Timestamp,
}

/// Errors returned by record store implementations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Record store unavailable: {message}")]
    Unavailable { message: String },

    #[error("Record store rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Failed to decode record store response: {message}")]
    Decode { message: String },
}

impl StoreError {
    /// Check if error is transient and the delivery should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Unavailable { .. } => true,
            Self::Rejected { status, .. } => *status == 429,
            Self::Decode { .. } => false,
        }
    }
}

/// Persistence operations used by the event handlers
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Insert the record, or overwrite every column of the row with the same
    /// `customer_id`
    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), StoreError>;

    /// Key of the record whose `stripe_customer_id` matches
    ///
    /// Only `customer_id` is read, so other columns of the row never have to
    /// match [`SubscriberRecord`].
    async fn find_customer_id(&self, stripe_customer_id: &str)
        -> Result<Option<String>, StoreError>;

    /// Apply a status change to the row with the given `customer_id`
    ///
    /// Returns the number of rows changed; zero when no row matched.
    async fn update_status(
        &self,
        customer_id: &str,
        update: &StatusUpdate,
    ) -> Result<u64, StoreError>;
}
