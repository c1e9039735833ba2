//! # Subscription-Hook Core
//!
//! Core business logic for the subscription webhook receiver.
//!
//! This crate verifies payment-provider webhook signatures over the raw
//! request bytes, decodes verified payloads into typed events, and dispatches
//! those events to handlers that update subscriber records in an external
//! store.
//!
//! ## Architecture
//!
//! - Business logic depends only on trait abstractions ([`SubscriberStore`],
//!   [`PaymentProvider`], [`WebhookProcessor`])
//! - Infrastructure implementations live in [`adapters`] and are injected at
//!   startup
//! - Configuration values (shared secret, store credentials) are passed in
//!   explicitly; nothing is read from ambient globals
//!
//! ## Usage
//!
//! ```rust
//! use subscription_hook_core::{SecretString, SignatureVerifier};
//!
//! let verifier = SignatureVerifier::new(SecretString::new("whsec_test"));
//! let header = verifier.sign(b"{}", 1_700_000_000).unwrap();
//! assert!(verifier.verify_at(b"{}", Some(&header), 1_700_000_000).is_ok());
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use zeroize::Zeroizing;

// ============================================================================
// Timestamp
// ============================================================================

/// UTC timestamp used for record mutation times
///
/// Serializes as an RFC3339 string, which is what the record store expects
/// for `updated_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current moment
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from Unix seconds
    ///
    /// Returns `None` when the value is out of chrono's representable range.
    pub fn from_unix_seconds(seconds: i64) -> Option<Self> {
        Utc.timestamp_opt(seconds, 0).single().map(Self)
    }

    /// Unix seconds for this timestamp
    pub fn unix_seconds(&self) -> i64 {
        self.0.timestamp()
    }

    /// Convert to RFC3339 string
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

// ============================================================================
// Secrets
// ============================================================================

/// Secret string that is zeroed on drop and never printed
///
/// Holds the webhook signing secret, the provider API key and the store
/// service key. `Debug` output only reveals the length.
#[derive(Clone)]
pub struct SecretString(Zeroizing<String>);

impl SecretString {
    /// Wrap a secret value
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    /// Get secret as string (only for immediate use)
    pub fn expose_secret(&self) -> &str {
        self.0.as_str()
    }

    /// Check if secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get secret length without exposing content
    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl Default for SecretString {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretString")
            .field("length", &self.len())
            .field("value", &"[REDACTED]")
            .finish()
    }
}

impl<'de> Deserialize<'de> for SecretString {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Self::new)
    }
}

// ============================================================================
// Module declarations
// ============================================================================

/// Provider-issued event model
pub mod events;

/// Signature verification over raw request bytes
pub mod signature;

/// Subscriber record store abstraction
pub mod store;

/// Payment provider API abstraction
pub mod provider;

/// Event routing to subscription handlers
pub mod dispatch;

/// Webhook request model and processing pipeline
pub mod webhook;

/// Infrastructure implementations of the store and provider traits
pub mod adapters;

// Re-export key types for convenience
pub use dispatch::{EventDispatcher, UnknownCustomerPolicy};
pub use events::{
    CheckoutSession, EventKind, EventPayload, InboundEvent, InvoiceObject, SubscriptionObject,
    SubscriptionRef, SubscriptionStatus,
};
pub use provider::{PaymentProvider, ProviderError, ProviderSubscription};
pub use signature::{SignatureError, SignatureVerifier};
pub use store::{StatusUpdate, StoreError, SubscriberRecord, SubscriberStore};
pub use webhook::{
    Acknowledgement, WebhookError, WebhookProcessor, WebhookProcessorImpl, WebhookRequest,
};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
