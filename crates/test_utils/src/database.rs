//! Database Test Utilities
//!
//! Starts a throwaway PostgreSQL container per test for the adapter suites.
//! Tests using it are `#[ignore]`d and need a local Docker daemon:
//!
//! ```bash
//! cargo test -p infra_db -- --ignored
//! ```

use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "billing_test";
const POSTGRES_PASSWORD: &str = "billing_test";
const POSTGRES_DB: &str = "billing_test";

pub type TestDatabaseError = Box<dyn std::error::Error + Send + Sync>;

/// Connection settings of a test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A PostgreSQL container with an open pool
///
/// The schema is left empty; callers apply their own migrations. The
/// container stops when this value is dropped.
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pool: PgPool,
}

impl TestDatabase {
    /// Starts the container and connects
    ///
    /// # Errors
    ///
    /// Returns an error if Docker is unavailable or the server never accepts
    /// connections.
    pub async fn start() -> Result<Self, TestDatabaseError> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr("database system is ready to accept connections"))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let config = TestDatabaseConfig {
            host: container.get_host().await?.to_string(),
            port: container.get_host_port_ipv4(5432).await?,
            ..TestDatabaseConfig::default()
        };

        // The init script restarts the server once; retry until it settles
        let mut attempts = 0;
        let pool = loop {
            attempts += 1;
            match PgPoolOptions::new()
                .max_connections(8)
                .acquire_timeout(Duration::from_secs(30))
                .connect(&config.connection_url())
                .await
            {
                Ok(pool) => break pool,
                Err(_) if attempts < 10 => tokio::time::sleep(Duration::from_millis(500)).await,
                Err(e) => return Err(e.into()),
            }
        };

        Ok(Self {
            _container: container,
            config,
            pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}
