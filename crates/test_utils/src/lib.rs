//! Test Utilities Crate
//!
//! Provides shared test infrastructure, fixtures, and helpers for the
//! billing test suites.
//!
//! # Modules
//!
//! - `fixtures`: Pre-built customers, dates, actors and a mock-backed service
//! - `builders`: Builder patterns for bill, period and payment payloads
//! - `assertions`: Decimal and invariant assertion helpers
//! - `generators`: Property-based test data generators
//! - `database`: Disposable PostgreSQL containers for adapter tests

pub mod fixtures;
pub mod builders;
pub mod assertions;
pub mod generators;
pub mod database;

pub use fixtures::*;
pub use builders::*;
pub use assertions::*;
pub use generators::*;
