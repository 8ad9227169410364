//! Billing application service
//!
//! `BillingService` is the only entry point that mutates billing state. Each
//! public operation opens one unit of work, performs every dependent write
//! (period then bill total, payment detail then invoice) inside it and
//! commits once. Cross-entity recomputation is an explicit call here, never
//! a side effect of a storage write.

mod bills;
mod customers;
mod daily;
mod invoices;
mod payments;

use std::sync::Arc;

use core_kernel::{BillId, HealthCheckResult, InvoiceId};

use crate::bill::BillRecord;
use crate::error::BillingError;
use crate::invoice::Invoice;
use crate::ports::{BillingPort, BillingUnitOfWork};
use crate::settings::BillingSettings;

pub use bills::{BillWithPeriods, FinalizeOutcome, FinalizeSummary, PeriodSummary};
pub use payments::{DetailReceipt, PaymentReceipt, PaymentRecord};

/// Orchestrates billing operations over a storage port
#[derive(Clone)]
pub struct BillingService {
    port: Arc<dyn BillingPort>,
    settings: BillingSettings,
}

impl BillingService {
    /// Creates a service over `port`
    pub fn new(port: Arc<dyn BillingPort>, settings: BillingSettings) -> Self {
        Self { port, settings }
    }

    pub fn settings(&self) -> &BillingSettings {
        &self.settings
    }

    /// Health of the underlying storage adapter
    pub async fn health(&self) -> HealthCheckResult {
        self.port.health_check().await
    }

    async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, BillingError> {
        self.port.begin().await
    }
}

async fn require_bill(uow: &mut dyn BillingUnitOfWork, id: BillId) -> Result<BillRecord, BillingError> {
    uow.find_bill(id)
        .await?
        .ok_or_else(|| BillingError::not_found("Bill", id))
}

async fn require_locked_bill(uow: &mut dyn BillingUnitOfWork, id: BillId) -> Result<BillRecord, BillingError> {
    uow.lock_bill(id)
        .await?
        .ok_or_else(|| BillingError::not_found("Bill", id))
}

async fn require_locked_invoice(uow: &mut dyn BillingUnitOfWork, id: InvoiceId) -> Result<Invoice, BillingError> {
    uow.lock_invoice(id)
        .await?
        .ok_or_else(|| BillingError::not_found("Invoice", id))
}
