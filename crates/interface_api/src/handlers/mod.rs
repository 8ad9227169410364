//! Request handlers
//!
//! Handlers translate HTTP into `BillingService` calls: extract the actor,
//! validate the body, call the service, map the result.

pub mod health;
pub mod customers;
pub mod bills;
pub mod daily;
pub mod invoices;
pub mod payments;
