//! Stripe REST API client used to resolve invoice subscriptions.

use crate::provider::{PaymentProvider, ProviderError, ProviderSubscription};
use crate::SecretString;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};
use url::Url;

/// Public Stripe API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Settings for [`StripeClient`]
#[derive(Debug, Clone)]
pub struct StripeClientConfig {
    pub api_base: Url,
    pub secret_key: SecretString,
    pub timeout: Duration,
}

impl StripeClientConfig {
    pub fn new(api_base: Url, secret_key: SecretString) -> Self {
        Self {
            api_base,
            secret_key,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`PaymentProvider`] talking to the Stripe API
#[derive(Debug, Clone)]
pub struct StripeClient {
    client: Client,
    config: StripeClientConfig,
}

impl StripeClient {
    pub fn new(config: StripeClientConfig) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ProviderError::Request {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client, config })
    }

    fn subscription_url(&self, subscription_id: &str) -> Result<Url, ProviderError> {
        let mut url = self.config.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderError::Request {
                message: format!("API base cannot be a base URL: {}", self.config.api_base),
            })?
            .pop_if_empty()
            .extend(["v1", "subscriptions", subscription_id]);
        Ok(url)
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    #[instrument(skip(self))]
    async fn retrieve_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<ProviderSubscription, ProviderError> {
        let url = self.subscription_url(subscription_id)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(self.config.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::Request {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Subscription lookup failed");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let subscription: ProviderSubscription =
            response.json().await.map_err(|e| ProviderError::Decode {
                message: e.to_string(),
            })?;

        debug!(customer = %subscription.customer, status = %subscription.status, "Retrieved subscription");
        Ok(subscription)
    }
}

#[cfg(test)]
#[path = "stripe_client_tests.rs"]
mod tests;
