//! Infrastructure Database Layer
//!
//! PostgreSQL persistence for the billing core using SQLx. Bills, pricing
//! periods, daily amounts, invoices and payments live in plain relational
//! tables; every service operation runs inside one database transaction.
//!
//! # Architecture
//!
//! The crate follows the repository pattern. `repositories` holds the SQL and
//! row mapping, `adapters` implements the domain's `BillingPort` on top of it.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::{create_pool, run_migrations, DatabaseConfig, PostgresBillingAdapter};
//!
//! let pool = create_pool(DatabaseConfig::new("postgres://localhost/isp_billing")).await?;
//! run_migrations(&pool).await?;
//! let adapter = PostgresBillingAdapter::new(pool);
//! ```

pub mod pool;
pub mod error;
pub mod repositories;
pub mod adapters;

pub use pool::{create_pool, run_migrations, DatabaseConfig, DatabasePool};
pub use error::DatabaseError;
pub use repositories::BillingRepository;
pub use adapters::PostgresBillingAdapter;
