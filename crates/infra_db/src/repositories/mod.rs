//! Repository implementations
//!
//! Repositories encapsulate SQL queries and map between database rows and
//! domain types. Query functions take a `&mut PgConnection` so callers can
//! run them inside a transaction they own.

pub mod billing;

pub use billing::BillingRepository;
