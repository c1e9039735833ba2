//! # Event Dispatch
//!
//! Routes verified events to the handler for their kind. Handlers translate
//! provider events into subscriber record mutations:
//!
//! | kind                    | effect                                            |
//! |-------------------------|---------------------------------------------------|
//! | checkout completed      | upsert record, `status = active`                  |
//! | subscription created    | set reported status and subscription id           |
//! | subscription updated    | set reported status and subscription id           |
//! | subscription deleted    | `status = canceled`                               |
//! | payment succeeded       | look up subscription, `status = active`           |
//! | payment failed          | look up subscription, `status = past_due`         |
//! | anything else           | nothing                                           |
//!
//! Every write assigns absolute values, so re-delivery of the same event
//! leaves the record in the same state.

use crate::events::{
    CheckoutSession, EventPayload, InboundEvent, InvoiceObject, SubscriptionObject,
    SubscriptionStatus,
};
use crate::provider::PaymentProvider;
use crate::store::{StatusUpdate, SubscriberRecord, SubscriberStore};
use crate::webhook::{Acknowledgement, WebhookError};
use crate::Timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// What to do when a status event names a customer with no record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCustomerPolicy {
    /// Create a record keyed by the provider customer id
    #[default]
    InsertFallback,
    /// Acknowledge the event without writing anything
    Ignore,
}

/// Routes verified events to subscription handlers
pub struct EventDispatcher {
    store: Arc<dyn SubscriberStore>,
    provider: Arc<dyn PaymentProvider>,
    unknown_customer_policy: UnknownCustomerPolicy,
}

impl EventDispatcher {
    /// Create a dispatcher with the default unknown-customer policy
    pub fn new(store: Arc<dyn SubscriberStore>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self {
            store,
            provider,
            unknown_customer_policy: UnknownCustomerPolicy::default(),
        }
    }

    pub fn with_unknown_customer_policy(mut self, policy: UnknownCustomerPolicy) -> Self {
        self.unknown_customer_policy = policy;
        self
    }

    pub fn unknown_customer_policy(&self) -> UnknownCustomerPolicy {
        self.unknown_customer_policy
    }

    /// Run the handler for `event`
    ///
    /// Returns an acknowledgement carrying the delivered event type. Any
    /// store or provider failure aborts the dispatch so the caller does not
    /// acknowledge the delivery.
    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    pub async fn dispatch(&self, event: &InboundEvent) -> Result<Acknowledgement, WebhookError> {
        match &event.payload {
            EventPayload::CheckoutCompleted(session) => self.handle_checkout(session).await?,
            EventPayload::SubscriptionCreated(subscription)
            | EventPayload::SubscriptionUpdated(subscription) => {
                self.handle_subscription_change(subscription, subscription.status)
                    .await?
            }
            EventPayload::SubscriptionDeleted(subscription) => {
                self.apply_status(
                    &subscription.customer,
                    &subscription.id,
                    SubscriptionStatus::Canceled,
                )
                .await?
            }
            EventPayload::PaymentSucceeded(invoice) => {
                self.handle_invoice(invoice, SubscriptionStatus::Active)
                    .await?
            }
            EventPayload::PaymentFailed(invoice) => {
                self.handle_invoice(invoice, SubscriptionStatus::PastDue)
                    .await?
            }
            EventPayload::Unrecognized => {
                info!("Unhandled event type, acknowledging without changes");
            }
        }

        Ok(Acknowledgement::received(&event.event_type))
    }

    async fn handle_checkout(&self, session: &CheckoutSession) -> Result<(), WebhookError> {
        let customer_id =
            session
                .subscriber_key()
                .ok_or_else(|| WebhookError::MalformedPayload {
                    message: format!(
                        "checkout session {} has neither client_reference_id nor customer",
                        session.id
                    ),
                })?;

        let record = SubscriberRecord::activated(
            customer_id,
            session.customer.clone(),
            session.subscription.clone(),
            Timestamp::now(),
        );

        self.store.upsert(&record).await?;

        info!(
            customer_id = %record.customer_id,
            subscription_id = ?record.subscription_id,
            "Activated subscriber from completed checkout"
        );
        Ok(())
    }

    async fn handle_subscription_change(
        &self,
        subscription: &SubscriptionObject,
        status: SubscriptionStatus,
    ) -> Result<(), WebhookError> {
        self.apply_status(&subscription.customer, &subscription.id, status)
            .await
    }

    async fn handle_invoice(
        &self,
        invoice: &InvoiceObject,
        status: SubscriptionStatus,
    ) -> Result<(), WebhookError> {
        let Some(subscription_id) = invoice.subscription_id() else {
            debug!(invoice_id = %invoice.id, "Invoice has no subscription, nothing to update");
            return Ok(());
        };

        let subscription = self.provider.retrieve_subscription(subscription_id).await?;

        self.apply_status(&subscription.customer, &subscription.id, status)
            .await
    }

    /// Set status and subscription id on the record owned by a provider customer
    async fn apply_status(
        &self,
        stripe_customer_id: &str,
        subscription_id: &str,
        status: SubscriptionStatus,
    ) -> Result<(), WebhookError> {
        let now = Timestamp::now();

        match self.store.find_customer_id(stripe_customer_id).await? {
            Some(customer_id) => {
                let update = StatusUpdate {
                    status,
                    subscription_id: subscription_id.to_string(),
                    updated_at: now,
                };
                let changed = self
                    .store
                    .update_status(&customer_id, &update)
                    .await?;

                info!(
                    customer_id = %customer_id,
                    status = %status,
                    rows = changed,
                    "Updated subscriber status"
                );
            }
            None => match self.unknown_customer_policy {
                UnknownCustomerPolicy::InsertFallback => {
                    let record = SubscriberRecord {
                        customer_id: stripe_customer_id.to_string(),
                        stripe_customer_id: Some(stripe_customer_id.to_string()),
                        subscription_id: Some(subscription_id.to_string()),
                        status,
                        updated_at: now,
                    };
                    self.store.upsert(&record).await?;

                    warn!(
                        stripe_customer_id = %stripe_customer_id,
                        status = %status,
                        "No subscriber for provider customer, inserted fallback record"
                    );
                }
                UnknownCustomerPolicy::Ignore => {
                    warn!(
                        stripe_customer_id = %stripe_customer_id,
                        "No subscriber for provider customer, ignoring status change"
                    );
                }
            },
        }

        Ok(())
    }
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("unknown_customer_policy", &self.unknown_customer_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
