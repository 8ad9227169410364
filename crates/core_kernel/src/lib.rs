//! Core Kernel - Foundational types and utilities for the ISP billing system
//!
//! This crate provides the fundamental building blocks used by the billing
//! domain and its adapters:
//! - Integer-backed identifiers for every persisted entity
//! - Decimal rounding, guarded division and VAT rates
//! - Billing calendar helpers (timezone, date ranges, ordinal formatting)
//! - Port marker traits and the explicit actor context

pub mod money;
pub mod words;
pub mod temporal;
pub mod identifiers;
pub mod ports;
pub mod error;

pub use money::{Rate, MoneyError, checked_product, round_money, round_usage, spread_evenly};
pub use words::amount_in_words;
pub use temporal::{DateRange, Timezone, TemporalError, format_date_range, last_day_of_month};
pub use identifiers::{
    CustomerId, EntitlementId, BillId, PricingPeriodId, DailyBillAmountId,
    InvoiceId, InvoiceItemId, PaymentMasterId, PaymentDetailId,
};
pub use ports::{ActorContext, AdapterHealth, DomainPort, HealthCheckable, HealthCheckResult};
pub use error::CoreError;
