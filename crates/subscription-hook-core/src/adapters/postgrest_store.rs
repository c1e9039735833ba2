//! # PostgREST Subscriber Store
//!
//! Stores subscriber records in a PostgREST-fronted table (as exposed by
//! Supabase) over HTTPS.
//!
//! | operation                 | request                                                          |
//! |---------------------------|------------------------------------------------------------------|
//! | `upsert`                  | `POST /rest/v1/{table}?on_conflict=customer_id`                  |
//! | `find_customer_id`        | `GET /rest/v1/{table}?stripe_customer_id=eq.{id}&select=customer_id&limit=1` |
//! | `update_status`           | `PATCH /rest/v1/{table}?customer_id=eq.{id}`                     |
//!
//! Every request carries the service key in both the `apikey` and the
//! `Authorization: Bearer` headers.

use crate::store::{StatusUpdate, StoreError, SubscriberRecord, SubscriberStore};
use crate::SecretString;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

/// Default table holding subscriber records
pub const DEFAULT_TABLE: &str = "premium_users";

/// Connection settings for the PostgREST endpoint
#[derive(Debug, Clone)]
pub struct PostgrestConfig {
    /// Project base URL, e.g. `https://abc.supabase.co`
    pub url: Url,
    pub service_key: SecretString,
    pub table: String,
    pub timeout: Duration,
}

impl PostgrestConfig {
    pub fn new(url: Url, service_key: SecretString) -> Self {
        Self {
            url,
            service_key,
            table: DEFAULT_TABLE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// [`SubscriberStore`] backed by a PostgREST table
#[derive(Debug, Clone)]
pub struct PostgrestSubscriberStore {
    client: Client,
    table_url: Url,
    service_key: SecretString,
}

impl PostgrestSubscriberStore {
    /// Build the store and its HTTP client
    pub fn new(config: PostgrestConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Unavailable {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        let mut table_url = config.url.clone();
        table_url
            .path_segments_mut()
            .map_err(|_| StoreError::Unavailable {
                message: format!("Store URL cannot be a base: {}", config.url),
            })?
            .pop_if_empty()
            .extend(["rest", "v1", config.table.as_str()]);

        Ok(Self {
            client,
            table_url,
            service_key: config.service_key,
        })
    }

    /// Table endpoint requests are sent to
    pub fn table_url(&self) -> &Url {
        &self.table_url
    }

    fn url_with_query(&self, pairs: &[(&str, &str)]) -> Url {
        let mut url = self.table_url.clone();
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        let key = self.service_key.expose_secret();
        builder
            .header("apikey", key)
            .bearer_auth(key)
            .header("Content-Type", "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, StoreError> {
        let response = self
            .authorized(builder)
            .send()
            .await
            .map_err(|e| StoreError::Unavailable {
                message: format!("Request to record store failed: {}", e),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        error!(status = status.as_u16(), "Record store returned error status");

        if status.is_server_error() {
            Err(StoreError::Unavailable {
                message: format!("status {}: {}", status.as_u16(), body),
            })
        } else {
            Err(StoreError::Rejected {
                status: status.as_u16(),
                message: body,
            })
        }
    }
}

/// Projection returned by the lookup query
#[derive(Debug, Deserialize)]
struct CustomerIdRow {
    customer_id: String,
}

#[async_trait]
impl SubscriberStore for PostgrestSubscriberStore {
    #[instrument(skip(self, record), fields(customer_id = %record.customer_id))]
    async fn upsert(&self, record: &SubscriberRecord) -> Result<(), StoreError> {
        let url = self.url_with_query(&[("on_conflict", "customer_id")]);

        self.send(
            self.client
                .post(url)
                .header("Prefer", "resolution=merge-duplicates,return=minimal")
                .json(record),
        )
        .await?;

        debug!("Upserted subscriber record");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_customer_id(
        &self,
        stripe_customer_id: &str,
    ) -> Result<Option<String>, StoreError> {
        let filter = format!("eq.{}", stripe_customer_id);
        let url = self.url_with_query(&[
            ("stripe_customer_id", filter.as_str()),
            ("select", "customer_id"),
            ("limit", "1"),
        ]);

        let response = self.send(self.client.get(url)).await?;
        let rows: Vec<CustomerIdRow> =
            response.json().await.map_err(|e| StoreError::Decode {
                message: e.to_string(),
            })?;

        Ok(rows.into_iter().next().map(|row| row.customer_id))
    }

    #[instrument(skip(self, update), fields(status = %update.status))]
    async fn update_status(
        &self,
        customer_id: &str,
        update: &StatusUpdate,
    ) -> Result<u64, StoreError> {
        let filter = format!("eq.{}", customer_id);
        let url = self.url_with_query(&[("customer_id", filter.as_str())]);

        let response = self
            .send(
                self.client
                    .patch(url)
                    .header("Prefer", "return=representation")
                    .json(update),
            )
            .await?;

        let rows: Vec<serde_json::Value> =
            response.json().await.map_err(|e| StoreError::Decode {
                message: e.to_string(),
            })?;

        debug!(rows = rows.len(), "Updated subscriber status");
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
#[path = "postgrest_store_tests.rs"]
mod tests;
