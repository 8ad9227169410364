//! Domain Adapters
//!
//! Connects the billing domain's port to the PostgreSQL layer.
//!
//! # Usage
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBillingAdapter;
//! use domain_billing::BillingPort;
//!
//! let adapter = PostgresBillingAdapter::new(pool);
//! let mut uow = adapter.begin().await?;
//! let bill = uow.find_bill(bill_id).await?;
//! ```

pub mod billing;

pub use billing::{PgBillingUnit, PostgresBillingAdapter};
