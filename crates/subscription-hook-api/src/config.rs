//! Configuration types for the HTTP service

use crate::errors::ConfigError;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use subscription_hook_core::{SecretString, UnknownCustomerPolicy};
use tracing::info;
use url::Url;

/// Service configuration
///
/// Every section carries serde defaults so an absent file or an unconfigured
/// environment still deserializes. Secrets default to empty and are rejected
/// by [`ServiceConfig::validate`].
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// HTTP server settings
    pub server: ServerConfig,

    /// Signature verification and dispatch settings
    pub webhook: WebhookConfig,

    /// Payment provider credentials and API access
    pub stripe: StripeConfig,

    /// Subscriber record store access
    pub store: StoreConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Path the webhook is served on
    pub endpoint_path: String,

    /// Maximum request size in bytes
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            endpoint_path: "/api/webhook".to_string(),
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// Webhook verification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Request header carrying the signature
    pub signature_header: String,

    /// Maximum accepted age of a signed timestamp; 0 disables the check
    pub tolerance_seconds: u64,

    /// Behaviour for status events naming an unknown customer
    pub unknown_customer_policy: UnknownCustomerPolicy,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            signature_header: "stripe-signature".to_string(),
            tolerance_seconds: 300,
            unknown_customer_policy: UnknownCustomerPolicy::default(),
        }
    }
}

impl WebhookConfig {
    pub fn tolerance(&self) -> Duration {
        Duration::from_secs(self.tolerance_seconds)
    }
}

/// Payment provider configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    /// Base URL of the provider API
    pub api_base: String,

    /// API key used for subscription lookups
    pub secret_key: SecretString,

    /// Shared secret used to sign webhook deliveries
    pub webhook_secret: SecretString,

    pub timeout_seconds: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.stripe.com".to_string(),
            secret_key: SecretString::default(),
            webhook_secret: SecretString::default(),
            timeout_seconds: 10,
        }
    }
}

/// Record store configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URL of the PostgREST / Supabase project
    pub url: String,

    pub service_key: SecretString,

    /// Table holding subscriber records
    pub table: String,

    pub timeout_seconds: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            service_key: SecretString::default(),
            table: "premium_users".to_string(),
            timeout_seconds: 10,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging level, used when `RUST_LOG` is not set
    pub level: String,

    /// Enable JSON structured logging
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ServiceConfig {
    /// Check the configuration is usable before anything is started
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] for an empty secret or store setting
    /// and [`ConfigError::Invalid`] for unparsable URLs or a bad endpoint path.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.endpoint_path.starts_with('/') {
            return Err(ConfigError::Invalid {
                message: format!(
                    "server.endpoint_path must start with '/': {}",
                    self.server.endpoint_path
                ),
            });
        }

        if self.server.max_body_size == 0 {
            return Err(ConfigError::Invalid {
                message: "server.max_body_size must be greater than zero".to_string(),
            });
        }

        if self.webhook.signature_header.trim().is_empty() {
            return Err(ConfigError::Missing {
                key: "webhook.signature_header".to_string(),
            });
        }

        if self.stripe.webhook_secret.is_empty() {
            return Err(ConfigError::Missing {
                key: "stripe.webhook_secret".to_string(),
            });
        }

        if self.stripe.secret_key.is_empty() {
            return Err(ConfigError::Missing {
                key: "stripe.secret_key".to_string(),
            });
        }

        if self.store.url.is_empty() {
            return Err(ConfigError::Missing {
                key: "store.url".to_string(),
            });
        }

        if self.store.service_key.is_empty() {
            return Err(ConfigError::Missing {
                key: "store.service_key".to_string(),
            });
        }

        if self.store.table.is_empty() {
            return Err(ConfigError::Missing {
                key: "store.table".to_string(),
            });
        }

        self.stripe_api_base()?;
        self.store_url()?;

        Ok(())
    }

    /// Parsed provider API base URL
    pub fn stripe_api_base(&self) -> Result<Url, ConfigError> {
        parse_url("stripe.api_base", &self.stripe.api_base)
    }

    /// Parsed record store URL
    pub fn store_url(&self) -> Result<Url, ConfigError> {
        parse_url("store.url", &self.store.url)
    }
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| ConfigError::Invalid {
        message: format!("{} is not a valid URL ({}): {}", key, e, value),
    })?;

    if url.cannot_be_a_base() {
        return Err(ConfigError::Invalid {
            message: format!("{} must be an http(s) base URL: {}", key, value),
        });
    }

    Ok(url)
}

// ============================================================================
// Loading
// ============================================================================

/// Conventional environment variables honoured on top of all other sources
pub const CONVENTIONAL_ENV_VARS: [(&str, &str); 4] = [
    ("STRIPE_SECRET_KEY", "stripe.secret_key"),
    ("STRIPE_WEBHOOK_SECRET", "stripe.webhook_secret"),
    ("SUPABASE_URL", "store.url"),
    ("SUPABASE_SERVICE_KEY", "store.service_key"),
];

/// Where configuration is read from
///
/// Sources are applied in order, later ones overriding earlier ones:
///
///  1. `system_file` (optional)
///  2. `local_file` (optional)
///  3. `explicit_file` (required when given)
///  4. Environment variables `{env_prefix}__SECTION__KEY`
///  5. [`CONVENTIONAL_ENV_VARS`]
#[derive(Debug, Clone)]
pub struct ConfigSources {
    pub system_file: PathBuf,
    pub local_file: PathBuf,
    pub explicit_file: Option<PathBuf>,
    pub env_prefix: String,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            system_file: PathBuf::from("/etc/subscription-hook/service.yaml"),
            local_file: PathBuf::from("config/service.yaml"),
            explicit_file: None,
            env_prefix: "SH".to_string(),
        }
    }
}

impl ConfigSources {
    pub fn with_explicit_file(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_file = path;
        self
    }
}

impl ServiceConfig {
    /// Load configuration from files and the environment
    ///
    /// A malformed file or an environment value that cannot be coerced to the
    /// target type is an error. Validation is left to the caller.
    pub fn load(sources: &ConfigSources) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(
                config::File::from(sources.system_file.as_path())
                    .required(false)
                    .format(config::FileFormat::Yaml),
            )
            .add_source(
                config::File::from(sources.local_file.as_path())
                    .required(false)
                    .format(config::FileFormat::Yaml),
            );

        if let Some(explicit) = &sources.explicit_file {
            info!(path = %explicit.display(), "Loading configuration from explicit path");
            builder = builder.add_source(
                config::File::from(explicit.as_path())
                    .required(true)
                    .format(config::FileFormat::Yaml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&sources.env_prefix).separator("__"),
        );

        for (var, key) in CONVENTIONAL_ENV_VARS {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder.set_override_option(key, value)?;
        }

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
