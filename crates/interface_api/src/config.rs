//! API configuration
//!
//! Loaded from `BILLING_*` environment variables (a `.env` file is honoured
//! by the binary). Nested sections use `__`, e.g.
//! `BILLING_DATABASE__MAX_CONNECTIONS=20` or `BILLING_BILLING__VAT_PERCENT=7.5`.

use std::time::Duration;

use serde::Deserialize;

use domain_billing::BillingSettings;
use infra_db::DatabaseConfig;

/// API configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Database URL
    pub database_url: String,
    /// Log level, used when `RUST_LOG` is unset
    pub log_level: String,
    /// Connection pool sizing
    pub database: PoolSettings,
    /// Billing tunables handed to the domain service
    pub billing: BillingSettings,
}

/// Pool section of the configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            database_url: "postgres://localhost/isp_billing".to_string(),
            log_level: "info".to_string(),
            database: PoolSettings::default(),
            billing: BillingSettings::default(),
        }
    }
}

impl ApiConfig {
    /// Loads configuration from environment
    pub fn from_env() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(
                config::Environment::with_prefix("BILLING")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Returns the server address
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Pool configuration for `infra_db::create_pool`
    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig::new(self.database_url.clone())
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}
