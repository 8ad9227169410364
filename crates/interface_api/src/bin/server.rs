//! ISP Billing Core - API Server Binary
//!
//! This binary starts the HTTP API server for the billing core.
//!
//! # Usage
//!
//! ```bash
//! # Run with default configuration
//! cargo run --bin billing-api
//!
//! # Run with environment variables
//! BILLING_PORT=8080 BILLING_DATABASE_URL=postgres://... cargo run --bin billing-api
//! ```
//!
//! # Environment Variables
//!
//! * `BILLING_HOST` - Server host (default: 0.0.0.0)
//! * `BILLING_PORT` - Server port (default: 8080)
//! * `BILLING_DATABASE_URL` - PostgreSQL connection string (`DATABASE_URL` also accepted)
//! * `BILLING_LOG_LEVEL` - Log level when `RUST_LOG` is unset (default: info)
//! * `BILLING_DATABASE__MAX_CONNECTIONS`, `BILLING_DATABASE__MIN_CONNECTIONS`,
//!   `BILLING_DATABASE__CONNECT_TIMEOUT_SECS` - Pool sizing
//! * `BILLING_BILLING__TIMEZONE` - Billing calendar zone (default: Asia/Dhaka)
//! * `BILLING_BILLING__VAT_PERCENT` - VAT on itemised INT invoices (default: 5)
//! * `BILLING_BILLING__PAYMENT_TERMS_DAYS` - Default due date offset (default: 30)
//! * `BILLING_BILLING__INVOICE_NUMBER_ATTEMPTS` - Invoice number retries (default: 3)

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use domain_billing::{BillingPort, BillingService};
use infra_db::{create_pool, run_migrations, PostgresBillingAdapter};
use interface_api::{config::ApiConfig, create_router};

/// Main entry point for the API server.
///
/// Initializes logging, loads configuration, establishes database connection,
/// applies migrations and starts the HTTP server.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (useful for local development)
    dotenvy::dotenv().ok();

    let config = load_config()?;

    init_tracing(&config.log_level);

    tracing::info!(
        host = %config.host,
        port = %config.port,
        timezone = %config.billing.timezone.0.name(),
        "Starting ISP Billing Core API Server"
    );

    config
        .billing
        .validate()
        .context("invalid billing settings")?;

    tracing::info!("Connecting to database...");
    let pool = create_pool(config.database_config())
        .await
        .context("failed to connect to database")?;

    tracing::info!("Running database migrations...");
    run_migrations(&pool).await.context("failed to apply migrations")?;

    let port: Arc<dyn BillingPort> = Arc::new(PostgresBillingAdapter::new(pool));
    let service = BillingService::new(port, config.billing.clone());
    let app = create_router(service, config.clone());

    let addr: SocketAddr = config
        .server_addr()
        .parse()
        .with_context(|| format!("invalid server address {}", config.server_addr()))?;

    tracing::info!(%addr, "Server listening");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Loads API configuration from environment variables.
///
/// A plain `DATABASE_URL` is honoured when the prefixed variable is unset.
fn load_config() -> anyhow::Result<ApiConfig> {
    let mut config = ApiConfig::from_env().context("failed to load configuration")?;

    if std::env::var("BILLING_DATABASE_URL").is_err() {
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
    }

    Ok(config)
}

/// Initializes the tracing subscriber for structured logging.
fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
