//! # Payment Provider API
//!
//! Lookups against the provider's REST API used when a webhook payload does
//! not carry everything a handler needs.

use crate::events::SubscriptionStatus;
use async_trait::async_trait;
use serde::Deserialize;

/// Subscription as returned by the provider API
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderSubscription {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionStatus,
}

/// Errors from provider API calls
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request failed: {message}")]
    Request { message: String },

    #[error("Provider returned status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode provider response: {message}")]
    Decode { message: String },
}

impl ProviderError {
    /// Check if error is transient
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Request { .. } => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Decode { .. } => false,
        }
    }
}

/// Read access to provider objects
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Retrieve a subscription by id to resolve its owning customer
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError>;
}
