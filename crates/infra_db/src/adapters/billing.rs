//! PostgreSQL Billing Adapter
//!
//! Implements `BillingPort` with one sqlx transaction per unit of work.
//! Dropping a `PgBillingUnit` without committing rolls the transaction back.
//!
//! # Example
//!
//! ```rust,ignore
//! use infra_db::adapters::PostgresBillingAdapter;
//! use domain_billing::{BillingPort, BillingService, BillingSettings};
//! use std::sync::Arc;
//!
//! let port: Arc<dyn BillingPort> = Arc::new(PostgresBillingAdapter::new(pool));
//! let service = BillingService::new(port, BillingSettings::default());
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Connection, PgPool, Postgres, Transaction};
use tracing::{debug, instrument};

use core_kernel::{
    BillId, CustomerId, DomainPort, HealthCheckResult, HealthCheckable, InvoiceId, PaymentDetailId,
    PaymentMasterId, PricingPeriodId,
};
use domain_billing::{
    BillRecord, BillingError, BillingPort, BillingUnitOfWork, Customer, DailyBillAmount, Invoice,
    InvoiceNumberScope, NewBill, NewCustomer, NewDailyAmount, NewInvoice, NewPayment, PaymentDetailInput,
    PaymentDetails, PaymentMaster, PeriodInput, PricingPeriod,
};

use crate::error::{DatabaseError, INVOICE_BILL_CONSTRAINT, INVOICE_NUMBER_CONSTRAINT};
use crate::repositories::billing::{self as repo, BillingRepository};

const ADAPTER_ID: &str = "postgres-billing-adapter";

/// PostgreSQL-backed implementation of the BillingPort trait
#[derive(Debug, Clone)]
pub struct PostgresBillingAdapter {
    repository: BillingRepository,
}

impl PostgresBillingAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: BillingRepository::new(pool),
        }
    }

    pub fn repository(&self) -> &BillingRepository {
        &self.repository
    }
}

impl DomainPort for PostgresBillingAdapter {}

#[async_trait]
impl HealthCheckable for PostgresBillingAdapter {
    /// Runs `SELECT 1` against the pool
    async fn health_check(&self) -> HealthCheckResult {
        let start = std::time::Instant::now();
        let result = self.repository.ping().await;
        let latency_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(()) => HealthCheckResult::healthy(ADAPTER_ID, latency_ms),
            Err(e) => HealthCheckResult::unhealthy(ADAPTER_ID, latency_ms, format!("Database error: {}", e)),
        }
    }
}

#[async_trait]
impl BillingPort for PostgresBillingAdapter {
    async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, BillingError> {
        let tx = self.repository.begin().await?;
        Ok(Box::new(PgBillingUnit { tx }))
    }
}

/// A unit of work bound to one open transaction
pub struct PgBillingUnit {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BillingUnitOfWork for PgBillingUnit {
    // ========================================================================
    // Customers
    // ========================================================================

    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, BillingError> {
        Ok(repo::find_customer(&mut self.tx, id).await?)
    }

    async fn customer_email_exists(&mut self, email: &str) -> Result<bool, BillingError> {
        Ok(repo::customer_email_exists(&mut self.tx, email).await?)
    }

    #[instrument(skip(self, customer))]
    async fn insert_customer(&mut self, customer: &NewCustomer, created_by: &str) -> Result<Customer, BillingError> {
        let stored = repo::insert_customer(&mut self.tx, customer, created_by).await?;
        debug!(customer_id = %stored.id, "Customer row inserted");
        Ok(stored)
    }

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), BillingError> {
        Ok(repo::update_customer(&mut self.tx, customer).await?)
    }

    // ========================================================================
    // Bills
    // ========================================================================

    async fn find_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError> {
        Ok(repo::find_bill(&mut self.tx, id, false).await?)
    }

    async fn lock_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError> {
        Ok(repo::find_bill(&mut self.tx, id, true).await?)
    }

    #[instrument(skip(self, bill), fields(customer_id = %bill.customer_id))]
    async fn insert_bill(&mut self, bill: &NewBill, created_by: &str) -> Result<BillRecord, BillingError> {
        let stored = repo::insert_bill(&mut self.tx, bill, created_by).await.map_err(|e| match e {
            DatabaseError::ForeignKeyViolation(_) => BillingError::not_found("Customer", bill.customer_id),
            other => other.into(),
        })?;
        debug!(bill_id = %stored.id, "Bill row inserted");
        Ok(stored)
    }

    async fn update_bill(&mut self, bill: &BillRecord) -> Result<(), BillingError> {
        Ok(repo::update_bill(&mut self.tx, bill).await?)
    }

    async fn delete_bill(&mut self, id: BillId) -> Result<bool, BillingError> {
        Ok(repo::delete_bill(&mut self.tx, id).await?)
    }

    // ========================================================================
    // Pricing periods
    // ========================================================================

    async fn list_periods(&mut self, bill_id: BillId) -> Result<Vec<PricingPeriod>, BillingError> {
        Ok(repo::list_periods(&mut self.tx, bill_id).await?)
    }

    async fn find_period(&mut self, id: PricingPeriodId) -> Result<Option<PricingPeriod>, BillingError> {
        Ok(repo::find_period(&mut self.tx, id).await?)
    }

    async fn insert_period(&mut self, bill_id: BillId, period: &PeriodInput) -> Result<PricingPeriod, BillingError> {
        Ok(repo::insert_period(&mut self.tx, bill_id, period).await?)
    }

    async fn update_period(&mut self, period: &PricingPeriod) -> Result<(), BillingError> {
        Ok(repo::update_period(&mut self.tx, period).await?)
    }

    async fn delete_period(&mut self, id: PricingPeriodId) -> Result<bool, BillingError> {
        Ok(repo::delete_period(&mut self.tx, id).await?)
    }

    // ========================================================================
    // Daily amounts
    // ========================================================================

    async fn list_daily_amounts(&mut self, bill_id: BillId) -> Result<Vec<DailyBillAmount>, BillingError> {
        Ok(repo::list_daily_amounts(&mut self.tx, bill_id).await?)
    }

    async fn find_daily_amount(
        &mut self,
        bill_id: BillId,
        date: NaiveDate,
    ) -> Result<Option<DailyBillAmount>, BillingError> {
        Ok(repo::find_daily_amount(&mut self.tx, bill_id, date).await?)
    }

    async fn insert_daily_amount(&mut self, daily: &NewDailyAmount) -> Result<DailyBillAmount, BillingError> {
        Ok(repo::insert_daily_amount(&mut self.tx, daily).await?)
    }

    async fn update_daily_amount(&mut self, daily: &DailyBillAmount) -> Result<(), BillingError> {
        Ok(repo::update_daily_amount(&mut self.tx, daily).await?)
    }

    // ========================================================================
    // Invoices
    // ========================================================================

    #[instrument(skip(self), fields(prefix = %scope.prefix()))]
    async fn lock_invoice_scope(&mut self, scope: &InvoiceNumberScope) -> Result<(), BillingError> {
        repo::lock_invoice_prefix(&mut self.tx, &scope.prefix()).await?;
        debug!("Invoice number scope locked");
        Ok(())
    }

    async fn invoice_numbers_in_scope(&mut self, scope: &InvoiceNumberScope) -> Result<Vec<String>, BillingError> {
        Ok(repo::invoice_numbers_with_prefix(&mut self.tx, &scope.prefix()).await?)
    }

    async fn find_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
        Ok(repo::find_invoice(&mut self.tx, id, false).await?)
    }

    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
        Ok(repo::find_invoice(&mut self.tx, id, true).await?)
    }

    async fn find_invoice_by_bill(&mut self, bill_id: BillId) -> Result<Option<Invoice>, BillingError> {
        Ok(repo::find_invoice_by_bill(&mut self.tx, bill_id).await?)
    }

    #[instrument(skip(self, invoice), fields(invoice_number = %invoice.invoice_number))]
    async fn insert_invoice(&mut self, invoice: &NewInvoice, created_by: &str) -> Result<Invoice, BillingError> {
        // Savepoint so a lost race on the bill can still read the winner
        let mut savepoint = self.tx.begin().await.map_err(DatabaseError::from)?;
        match repo::insert_invoice(&mut savepoint, invoice, created_by).await {
            Ok(created) => {
                savepoint.commit().await.map_err(DatabaseError::from)?;
                Ok(created)
            }
            Err(e) if e.is_unique_violation_on(INVOICE_NUMBER_CONSTRAINT) => {
                Err(BillingError::DuplicateInvoiceNumber(invoice.invoice_number.clone()))
            }
            Err(e) if e.is_unique_violation_on(INVOICE_BILL_CONSTRAINT) => {
                savepoint.rollback().await.map_err(DatabaseError::from)?;
                match repo::find_invoice_by_bill(&mut self.tx, invoice.bill_id).await? {
                    Some(existing) => {
                        debug!(invoice_number = %existing.invoice_number, "Bill invoiced concurrently");
                        Err(BillingError::InvoiceAlreadyExists {
                            bill_id: invoice.bill_id,
                            invoice_number: existing.invoice_number,
                        })
                    }
                    None => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), BillingError> {
        Ok(repo::update_invoice(&mut self.tx, invoice).await?)
    }

    // ========================================================================
    // Payments
    // ========================================================================

    async fn insert_payment_master(
        &mut self,
        payment: &NewPayment,
        received_by: &str,
    ) -> Result<PaymentMaster, BillingError> {
        repo::insert_payment_master(&mut self.tx, payment, received_by)
            .await
            .map_err(|e| match e {
                DatabaseError::ForeignKeyViolation(_) => BillingError::not_found("Invoice", payment.invoice_id),
                other => other.into(),
            })
    }

    async fn find_payment_master(&mut self, id: PaymentMasterId) -> Result<Option<PaymentMaster>, BillingError> {
        Ok(repo::find_payment_master(&mut self.tx, id).await?)
    }

    async fn insert_payment_detail(
        &mut self,
        master_id: PaymentMasterId,
        detail: &PaymentDetailInput,
    ) -> Result<PaymentDetails, BillingError> {
        Ok(repo::insert_payment_detail(&mut self.tx, master_id, detail).await?)
    }

    async fn find_payment_detail(&mut self, id: PaymentDetailId) -> Result<Option<PaymentDetails>, BillingError> {
        Ok(repo::find_payment_detail(&mut self.tx, id).await?)
    }

    async fn update_payment_detail(&mut self, detail: &PaymentDetails) -> Result<(), BillingError> {
        Ok(repo::update_payment_detail(&mut self.tx, detail).await?)
    }

    async fn list_payment_details(&mut self, master_id: PaymentMasterId) -> Result<Vec<PaymentDetails>, BillingError> {
        Ok(repo::list_payment_details(&mut self.tx, master_id).await?)
    }

    async fn sum_payments_for_invoice(&mut self, invoice_id: InvoiceId) -> Result<Decimal, BillingError> {
        Ok(repo::sum_payments_for_invoice(&mut self.tx, invoice_id).await?)
    }

    // ========================================================================
    // Transaction control
    // ========================================================================

    async fn commit(self: Box<Self>) -> Result<(), BillingError> {
        self.tx
            .commit()
            .await
            .map_err(|e| DatabaseError::TransactionFailed(e.to_string()).into())
    }
}
