//! # Subscription-Hook Service
//!
//! Binary entry point for the subscription webhook receiver.
//!
//! This executable:
//! - Loads configuration from files and the environment
//! - Initializes structured logging
//! - Wires the signature verifier, record store and provider client
//! - Starts the HTTP server from subscription-hook-api

use anyhow::Context;
use clap::Parser;
use std::{path::PathBuf, sync::Arc, time::Duration};
use subscription_hook_api::{start_server, ConfigSources, ServiceConfig, ServiceError};
use subscription_hook_core::{
    adapters::{PostgrestConfig, PostgrestSubscriberStore, StripeClient, StripeClientConfig},
    EventDispatcher, SignatureVerifier, WebhookProcessor, WebhookProcessorImpl,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Receives payment provider webhooks and keeps subscriber records in sync
#[derive(Debug, Parser)]
#[command(name = "subscription-hook")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Configuration file applied on top of the default locations
    #[arg(short, long, env = "SH_CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding configuration
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // -------------------------------------------------------------------------
    // Load configuration
    //
    // Sources (later override earlier):
    //  1. /etc/subscription-hook/service.yaml
    //  2. ./config/service.yaml
    //  3. --config / SH_CONFIG_FILE
    //  4. SH__SECTION__KEY environment variables
    //  5. STRIPE_SECRET_KEY, STRIPE_WEBHOOK_SECRET, SUPABASE_URL,
    //     SUPABASE_SERVICE_KEY
    // -------------------------------------------------------------------------
    let sources = ConfigSources::default().with_explicit_file(args.config.clone());
    let mut service_config = match ServiceConfig::load(&sources) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not configured yet
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(3);
        }
    };

    if let Some(port) = args.port {
        service_config.server.port = port;
    }

    init_tracing(&service_config);

    info!("Starting Subscription-Hook Service");

    if let Err(e) = service_config.validate() {
        error!(error = %e, "Service configuration is invalid; aborting");
        std::process::exit(3);
    }

    let processor = match build_processor(&service_config) {
        Ok(processor) => processor,
        Err(e) => {
            error!(error = %format!("{:#}", e), "Failed to construct webhook processor");
            std::process::exit(3);
        }
    };

    info!(
        host = %service_config.server.host,
        port = service_config.server.port,
        endpoint = %service_config.server.endpoint_path,
        "Starting HTTP server"
    );

    if let Err(e) = start_server(service_config, processor).await {
        error!("Failed to start server: {}", e);

        let exit_code = match e {
            ServiceError::BindFailed { .. } => 1,
            ServiceError::ServerFailed { .. } => 2,
        };

        std::process::exit(exit_code);
    }
}

// ============================================================================
// Private helpers
// ============================================================================

/// Install the global tracing subscriber
///
/// `RUST_LOG` wins over `logging.level` when set.
fn init_tracing(config: &ServiceConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},tower_http=info", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.json_format {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Build the verifier, adapters and dispatcher from validated configuration
fn build_processor(config: &ServiceConfig) -> anyhow::Result<Arc<dyn WebhookProcessor>> {
    let store_config = PostgrestConfig::new(config.store_url()?, config.store.service_key.clone())
        .with_table(config.store.table.clone())
        .with_timeout(Duration::from_secs(config.store.timeout_seconds));
    let store = PostgrestSubscriberStore::new(store_config)
        .context("failed to create record store client")?;

    let stripe_config =
        StripeClientConfig::new(config.stripe_api_base()?, config.stripe.secret_key.clone())
            .with_timeout(Duration::from_secs(config.stripe.timeout_seconds));
    let provider = StripeClient::new(stripe_config).context("failed to create provider client")?;

    let verifier = SignatureVerifier::new(config.stripe.webhook_secret.clone())
        .with_tolerance(config.webhook.tolerance());

    let dispatcher = EventDispatcher::new(Arc::new(store), Arc::new(provider))
        .with_unknown_customer_policy(config.webhook.unknown_customer_policy);

    info!(
        table = %config.store.table,
        tolerance_seconds = config.webhook.tolerance_seconds,
        unknown_customer_policy = ?config.webhook.unknown_customer_policy,
        "Webhook processor configured"
    );

    Ok(Arc::new(WebhookProcessorImpl::new(verifier, dispatcher)))
}
