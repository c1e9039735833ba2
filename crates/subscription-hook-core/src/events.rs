//! # Provider Event Model
//!
//! Typed representation of the payment provider's webhook events.
//!
//! An [`InboundEvent`] can only be produced by
//! [`SignatureVerifier::construct_event`](crate::SignatureVerifier::construct_event),
//! which decodes the raw bytes after the signature has been checked. The
//! payload is a tagged union over [`EventKind`]; each variant carries only the
//! fields its handler needs.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Event kinds
// ============================================================================

/// Discriminant of a provider event
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// `checkout.session.completed`
    CheckoutCompleted,
    /// `customer.subscription.created`
    SubscriptionCreated,
    /// `customer.subscription.updated`
    SubscriptionUpdated,
    /// `customer.subscription.deleted`
    SubscriptionDeleted,
    /// `invoice.payment_succeeded` or `invoice.paid`
    PaymentSucceeded,
    /// `invoice.payment_failed`
    PaymentFailed,
    /// Any other event type; acknowledged without side effects
    Unrecognized(String),
}

impl EventKind {
    /// Map the provider's `type` field to an event kind
    pub fn from_wire(event_type: &str) -> Self {
        match event_type {
            "checkout.session.completed" => Self::CheckoutCompleted,
            "customer.subscription.created" => Self::SubscriptionCreated,
            "customer.subscription.updated" => Self::SubscriptionUpdated,
            "customer.subscription.deleted" => Self::SubscriptionDeleted,
            "invoice.payment_succeeded" | "invoice.paid" => Self::PaymentSucceeded,
            "invoice.payment_failed" => Self::PaymentFailed,
            other => Self::Unrecognized(other.to_string()),
        }
    }

    /// Canonical wire name for this kind
    pub fn as_str(&self) -> &str {
        match self {
            Self::CheckoutCompleted => "checkout.session.completed",
            Self::SubscriptionCreated => "customer.subscription.created",
            Self::SubscriptionUpdated => "customer.subscription.updated",
            Self::SubscriptionDeleted => "customer.subscription.deleted",
            Self::PaymentSucceeded => "invoice.payment_succeeded",
            Self::PaymentFailed => "invoice.payment_failed",
            Self::Unrecognized(event_type) => event_type,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Subscription status
// ============================================================================

/// Subscription state as reported by the provider
///
/// Only `active`, `past_due` and `canceled` are written by the fixed handler
/// paths; the remaining states can arrive through subscription-created and
/// subscription-updated events, which copy the reported status verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Trialing,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::PastDue => "past_due",
            Self::Canceled => "canceled",
            Self::Trialing => "trialing",
            Self::Incomplete => "incomplete",
            Self::IncompleteExpired => "incomplete_expired",
            Self::Unpaid => "unpaid",
            Self::Paused => "paused",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Payload objects
// ============================================================================

/// Checkout session fields needed to create a subscriber
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    /// Application-defined customer reference passed when the session was created
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub subscription: Option<String>,
}

impl CheckoutSession {
    /// Application customer id, falling back to the provider customer id
    pub fn subscriber_key(&self) -> Option<&str> {
        self.client_reference_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .or(self.customer.as_deref())
    }
}

/// Subscription fields needed for status changes
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub customer: String,
    pub status: SubscriptionStatus,
}

/// Identifiers of a deleted subscription
///
/// Deletion always means `canceled`, so the reported status is not read and
/// may be absent or unknown.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubscriptionRef {
    pub id: String,
    pub customer: String,
}

/// Invoice fields needed to locate the paid subscription
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    parent: Option<InvoiceParent>,
}

impl InvoiceObject {
    /// Subscription referenced by this invoice, if any
    ///
    /// Newer API versions move the reference under
    /// `parent.subscription_details.subscription`; both locations are read.
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct InvoiceParent {
    #[serde(default)]
    subscription_details: Option<SubscriptionDetails>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct SubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

// ============================================================================
// Inbound event
// ============================================================================

/// Kind-specific event payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    CheckoutCompleted(CheckoutSession),
    SubscriptionCreated(SubscriptionObject),
    SubscriptionUpdated(SubscriptionObject),
    SubscriptionDeleted(SubscriptionRef),
    PaymentSucceeded(InvoiceObject),
    PaymentFailed(InvoiceObject),
    Unrecognized,
}

/// A verified provider event
///
/// Marked `non_exhaustive` so that code outside this crate cannot build one
/// by hand; the only public constructor path runs through signature
/// verification.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct InboundEvent {
    /// Provider event id (`evt_...`)
    pub id: String,
    /// The provider's `type` field exactly as delivered
    pub event_type: String,
    /// Creation time in Unix seconds
    pub created: i64,
    pub livemode: bool,
    pub payload: EventPayload,
}

impl InboundEvent {
    /// Event kind derived from the delivered type
    pub fn kind(&self) -> EventKind {
        EventKind::from_wire(&self.event_type)
    }

    /// Decode a JSON event body
    ///
    /// Callers must only pass bytes whose signature has already been checked.
    pub(crate) fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let raw: RawEvent = serde_json::from_slice(body)?;
        let object = raw.data.object;

        let payload = match EventKind::from_wire(&raw.event_type) {
            EventKind::CheckoutCompleted => {
                EventPayload::CheckoutCompleted(serde_json::from_value(object)?)
            }
            EventKind::SubscriptionCreated => {
                EventPayload::SubscriptionCreated(serde_json::from_value(object)?)
            }
            EventKind::SubscriptionUpdated => {
                EventPayload::SubscriptionUpdated(serde_json::from_value(object)?)
            }
            EventKind::SubscriptionDeleted => {
                EventPayload::SubscriptionDeleted(serde_json::from_value(object)?)
            }
            EventKind::PaymentSucceeded => {
                EventPayload::PaymentSucceeded(serde_json::from_value(object)?)
            }
            EventKind::PaymentFailed => EventPayload::PaymentFailed(serde_json::from_value(object)?),
            EventKind::Unrecognized(_) => EventPayload::Unrecognized,
        };

        Ok(Self {
            id: raw.id,
            event_type: raw.event_type,
            created: raw.created,
            livemode: raw.livemode,
            payload,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    livemode: bool,
    data: RawEventData,
}

#[derive(Debug, Deserialize)]
struct RawEventData {
    object: serde_json::Value,
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
