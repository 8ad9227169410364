//! Billing Domain - ISP billing computation and invoice lifecycle
//!
//! This crate computes what a bandwidth customer owes and tracks what has
//! been paid:
//!
//! # Components
//!
//! - **Pricing periods**: day-of-month slices of a bill with their own usage
//!   and prices; their totals add up to the bill total
//! - **Bill total aggregator**: rolls periods (or the bill's flat fields)
//!   into `total_bill` and `total_due`
//! - **Daily amount calculator**: per-day revenue with a per-service
//!   breakdown, flat or pro-rated from a period
//! - **Document numbering**: bill, customer and month-scoped invoice numbers
//! - **Invoice generator**: invoice plus service line items from a bill
//! - **Payment reconciler**: re-projects payment details onto the invoice
//!
//! # Example
//!
//! ```rust,ignore
//! use domain_billing::{BillingService, InvoiceFormat, InvoiceRequest};
//!
//! let bill = service.create_bill(new_bill, &actor).await?;
//! let invoice = service
//!     .generate_invoice(bill.id, InvoiceRequest::new(InvoiceFormat::Its), &actor)
//!     .await?;
//! ```

pub mod components;
pub mod customer;
pub mod bill;
pub mod pricing;
pub mod daily;
pub mod numbering;
pub mod invoice;
pub mod generator;
pub mod payment;
pub mod settings;
pub mod ports;
pub mod services;
pub mod error;

pub use components::{PerService, ServiceComponent, ServiceLine, ServiceQuantities, ServiceUsage};
pub use customer::{Customer, CustomerCategory, NewCustomer};
pub use bill::{aggregate_total_bill, BillRecord, BillStatus, BillUpdate, NewBill};
pub use pricing::{PeriodInput, PricingPeriod};
pub use daily::{
    calculate_daily_amount, BreakdownEntry, DailyAmountInput, DailyBillAmount, DailyCalculationReport, DayError,
    NewDailyAmount, ServiceBreakdown,
};
pub use numbering::InvoiceNumberScope;
pub use invoice::{Invoice, InvoiceFormat, InvoiceItem, InvoiceStatus, NewInvoice, NewInvoiceItem};
pub use generator::{build_invoice, InvoiceRequest};
pub use payment::{
    reconcile_invoice, NewPayment, PaymentDetailInput, PaymentDetailStatus, PaymentDetails, PaymentMaster,
    ReconciliationOutcome,
};
pub use settings::BillingSettings;
pub use ports::{BillingPort, BillingUnitOfWork};
pub use services::{
    BillWithPeriods, BillingService, DetailReceipt, FinalizeOutcome, FinalizeSummary, PaymentReceipt,
    PaymentRecord, PeriodSummary,
};
pub use error::BillingError;
