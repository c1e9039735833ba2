//! # Infrastructure Adapters
//!
//! Infrastructure implementations of the record store and payment provider
//! interfaces.

pub mod memory_store;
pub mod postgrest_store;
pub mod stripe_client;

pub use memory_store::InMemorySubscriberStore;
pub use postgrest_store::{PostgrestConfig, PostgrestSubscriberStore};
pub use stripe_client::{StripeClient, StripeClientConfig};
