//! Billing Domain Ports
//!
//! This module defines the persistence interfaces of the billing domain.
//!
//! # Architecture
//!
//! Every billing operation runs inside one storage transaction. The
//! `BillingPort` hands out a `BillingUnitOfWork`; all reads and writes of the
//! operation go through it and become visible together on `commit`. Dropping
//! a unit without committing rolls it back.
//!
//! - **Postgres Adapter**: one sqlx transaction per unit (infra_db)
//! - **Mock Adapter**: in-memory state, units serialised by a mutex
//!
//! # Usage
//!
//! ```rust,ignore
//! let mut uow = port.begin().await?;
//! let mut bill = uow.lock_bill(bill_id).await?.ok_or(...)?;
//! let periods = uow.list_periods(bill_id).await?;
//! bill.recompute_totals(&periods);
//! uow.update_bill(&bill).await?;
//! uow.commit().await?;
//! ```

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;

use core_kernel::{
    BillId, CustomerId, DomainPort, HealthCheckable, InvoiceId, PaymentDetailId, PaymentMasterId,
    PricingPeriodId,
};

use crate::bill::{BillRecord, NewBill};
use crate::customer::{Customer, NewCustomer};
use crate::daily::{DailyBillAmount, NewDailyAmount};
use crate::error::BillingError;
use crate::invoice::{Invoice, NewInvoice};
use crate::numbering::InvoiceNumberScope;
use crate::payment::{NewPayment, PaymentDetailInput, PaymentDetails, PaymentMaster};
use crate::pricing::{PeriodInput, PricingPeriod};

/// Entry point to billing storage
#[async_trait]
pub trait BillingPort: DomainPort + HealthCheckable {
    /// Opens a unit of work backed by one storage transaction
    async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, BillingError>;
}

/// Transactional access to billing records
///
/// Writes become visible to other units only after [`commit`]. Methods
/// named `lock_*` additionally block concurrent units from mutating the
/// returned row until this unit ends.
///
/// [`commit`]: BillingUnitOfWork::commit
#[async_trait]
pub trait BillingUnitOfWork: Send {
    // ========================================================================
    // Customers
    // ========================================================================

    async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, BillingError>;

    /// Case-insensitive lookup used for the duplicate email check
    async fn customer_email_exists(&mut self, email: &str) -> Result<bool, BillingError>;

    /// Inserts a customer without its customer number
    async fn insert_customer(&mut self, customer: &NewCustomer, created_by: &str) -> Result<Customer, BillingError>;

    async fn update_customer(&mut self, customer: &Customer) -> Result<(), BillingError>;

    // ========================================================================
    // Bills
    // ========================================================================

    async fn find_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError>;

    /// Reads the bill and holds its row lock until the unit ends
    async fn lock_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError>;

    /// First creation step: inserts the bill without a number
    async fn insert_bill(&mut self, bill: &NewBill, created_by: &str) -> Result<BillRecord, BillingError>;

    async fn update_bill(&mut self, bill: &BillRecord) -> Result<(), BillingError>;

    /// Deletes the bill with its periods and daily amounts
    async fn delete_bill(&mut self, id: BillId) -> Result<bool, BillingError>;

    // ========================================================================
    // Pricing periods
    // ========================================================================

    /// Periods of a bill ordered by start day
    async fn list_periods(&mut self, bill_id: BillId) -> Result<Vec<PricingPeriod>, BillingError>;

    async fn find_period(&mut self, id: PricingPeriodId) -> Result<Option<PricingPeriod>, BillingError>;

    async fn insert_period(&mut self, bill_id: BillId, period: &PeriodInput) -> Result<PricingPeriod, BillingError>;

    async fn update_period(&mut self, period: &PricingPeriod) -> Result<(), BillingError>;

    /// Deletes a period; daily rows that used it keep their amounts and lose the link
    async fn delete_period(&mut self, id: PricingPeriodId) -> Result<bool, BillingError>;

    // ========================================================================
    // Daily amounts
    // ========================================================================

    /// Daily rows of a bill ordered by date
    async fn list_daily_amounts(&mut self, bill_id: BillId) -> Result<Vec<DailyBillAmount>, BillingError>;

    async fn find_daily_amount(
        &mut self,
        bill_id: BillId,
        date: NaiveDate,
    ) -> Result<Option<DailyBillAmount>, BillingError>;

    async fn insert_daily_amount(&mut self, daily: &NewDailyAmount) -> Result<DailyBillAmount, BillingError>;

    async fn update_daily_amount(&mut self, daily: &DailyBillAmount) -> Result<(), BillingError>;

    // ========================================================================
    // Invoices
    // ========================================================================

    /// Serialises invoice numbering within `scope` until the unit ends
    async fn lock_invoice_scope(&mut self, scope: &InvoiceNumberScope) -> Result<(), BillingError>;

    /// Every invoice number starting with the scope prefix
    async fn invoice_numbers_in_scope(&mut self, scope: &InvoiceNumberScope) -> Result<Vec<String>, BillingError>;

    /// Invoice with its items
    async fn find_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError>;

    /// Invoice with its items, row locked until the unit ends
    async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError>;

    async fn find_invoice_by_bill(&mut self, bill_id: BillId) -> Result<Option<Invoice>, BillingError>;

    /// Inserts the invoice and its items
    ///
    /// # Errors
    ///
    /// `BillingError::DuplicateInvoiceNumber` when the number is taken.
    async fn insert_invoice(&mut self, invoice: &NewInvoice, created_by: &str) -> Result<Invoice, BillingError>;

    /// Writes the invoice header fields; items are immutable after creation
    async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), BillingError>;

    // ========================================================================
    // Payments
    // ========================================================================

    async fn insert_payment_master(
        &mut self,
        payment: &NewPayment,
        received_by: &str,
    ) -> Result<PaymentMaster, BillingError>;

    async fn find_payment_master(&mut self, id: PaymentMasterId) -> Result<Option<PaymentMaster>, BillingError>;

    async fn insert_payment_detail(
        &mut self,
        master_id: PaymentMasterId,
        detail: &PaymentDetailInput,
    ) -> Result<PaymentDetails, BillingError>;

    async fn find_payment_detail(&mut self, id: PaymentDetailId) -> Result<Option<PaymentDetails>, BillingError>;

    async fn update_payment_detail(&mut self, detail: &PaymentDetails) -> Result<(), BillingError>;

    async fn list_payment_details(&mut self, master_id: PaymentMasterId) -> Result<Vec<PaymentDetails>, BillingError>;

    /// Σ pay_amount over every detail of every payment against the invoice
    async fn sum_payments_for_invoice(&mut self, invoice_id: InvoiceId) -> Result<Decimal, BillingError>;

    // ========================================================================
    // Transaction control
    // ========================================================================

    /// Makes every write of this unit visible atomically
    async fn commit(self: Box<Self>) -> Result<(), BillingError>;
}

/// Mock implementation of BillingPort for testing
///
/// State lives in memory. A unit of work holds the state mutex from `begin`
/// until it is committed or dropped and works on a private copy, so units
/// are fully serialised and an uncommitted unit leaves no trace.
#[cfg(any(test, feature = "mock"))]
pub mod mock {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use tokio::sync::{Mutex, OwnedMutexGuard};

    use core_kernel::{DailyBillAmountId, HealthCheckResult, InvoiceItemId};

    use crate::invoice::InvoiceItem;

    /// Everything the mock stores
    #[derive(Debug, Clone, Default)]
    pub struct BillingState {
        next_id: i64,
        pub customers: BTreeMap<CustomerId, Customer>,
        pub bills: BTreeMap<BillId, BillRecord>,
        pub periods: BTreeMap<PricingPeriodId, PricingPeriod>,
        pub daily_amounts: BTreeMap<DailyBillAmountId, DailyBillAmount>,
        pub invoices: BTreeMap<InvoiceId, Invoice>,
        pub payment_masters: BTreeMap<PaymentMasterId, PaymentMaster>,
        pub payment_details: BTreeMap<PaymentDetailId, PaymentDetails>,
    }

    impl BillingState {
        fn next_id(&mut self) -> i64 {
            self.next_id += 1;
            self.next_id
        }
    }

    /// In-memory mock implementation of BillingPort
    #[derive(Debug, Default, Clone)]
    pub struct MockBillingPort {
        state: Arc<Mutex<BillingState>>,
        forced_collisions: Arc<AtomicU32>,
    }

    impl MockBillingPort {
        /// Creates a new mock port
        pub fn new() -> Self {
            Self::default()
        }

        /// Makes the next `count` invoice inserts fail with a number collision
        pub fn inject_invoice_number_collisions(&self, count: u32) {
            self.forced_collisions.store(count, Ordering::SeqCst);
        }

        /// Copy of the committed state
        pub async fn snapshot(&self) -> BillingState {
            self.state.lock().await.clone()
        }
    }

    impl DomainPort for MockBillingPort {}

    #[async_trait]
    impl HealthCheckable for MockBillingPort {
        async fn health_check(&self) -> HealthCheckResult {
            let mut result = HealthCheckResult::healthy("mock-billing-port", 0);
            result.message = Some("Mock adapter always healthy".to_string());
            result
        }
    }

    #[async_trait]
    impl BillingPort for MockBillingPort {
        async fn begin(&self) -> Result<Box<dyn BillingUnitOfWork>, BillingError> {
            let guard = self.state.clone().lock_owned().await;
            let working = guard.clone();
            Ok(Box::new(MockUnitOfWork {
                guard,
                working,
                forced_collisions: self.forced_collisions.clone(),
            }))
        }
    }

    struct MockUnitOfWork {
        guard: OwnedMutexGuard<BillingState>,
        working: BillingState,
        forced_collisions: Arc<AtomicU32>,
    }

    impl MockUnitOfWork {
        fn item_ids(&mut self, count: usize) -> Vec<InvoiceItemId> {
            (0..count).map(|_| InvoiceItemId::new(self.working.next_id())).collect()
        }

        fn take_forced_collision(&self) -> bool {
            self.forced_collisions
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
        }
    }

    #[async_trait]
    impl BillingUnitOfWork for MockUnitOfWork {
        async fn find_customer(&mut self, id: CustomerId) -> Result<Option<Customer>, BillingError> {
            Ok(self.working.customers.get(&id).cloned())
        }

        async fn customer_email_exists(&mut self, email: &str) -> Result<bool, BillingError> {
            Ok(self
                .working
                .customers
                .values()
                .filter_map(|c| c.email.as_deref())
                .any(|e| e.eq_ignore_ascii_case(email)))
        }

        async fn insert_customer(&mut self, customer: &NewCustomer, created_by: &str) -> Result<Customer, BillingError> {
            let id = CustomerId::new(self.working.next_id());
            let customer = Customer::from_new(id, customer.clone(), created_by, Utc::now());
            self.working.customers.insert(id, customer.clone());
            Ok(customer)
        }

        async fn update_customer(&mut self, customer: &Customer) -> Result<(), BillingError> {
            match self.working.customers.get_mut(&customer.id) {
                Some(stored) => {
                    *stored = customer.clone();
                    Ok(())
                }
                None => Err(BillingError::not_found("Customer", customer.id)),
            }
        }

        async fn find_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError> {
            Ok(self.working.bills.get(&id).cloned())
        }

        async fn lock_bill(&mut self, id: BillId) -> Result<Option<BillRecord>, BillingError> {
            self.find_bill(id).await
        }

        async fn insert_bill(&mut self, bill: &NewBill, created_by: &str) -> Result<BillRecord, BillingError> {
            if !self.working.customers.contains_key(&bill.customer_id) {
                return Err(BillingError::not_found("Customer", bill.customer_id));
            }
            let id = BillId::new(self.working.next_id());
            let record = BillRecord::from_new(id, bill.clone(), created_by, Utc::now());
            self.working.bills.insert(id, record.clone());
            Ok(record)
        }

        async fn update_bill(&mut self, bill: &BillRecord) -> Result<(), BillingError> {
            match self.working.bills.get_mut(&bill.id) {
                Some(stored) => {
                    *stored = bill.clone();
                    Ok(())
                }
                None => Err(BillingError::not_found("Bill", bill.id)),
            }
        }

        async fn delete_bill(&mut self, id: BillId) -> Result<bool, BillingError> {
            if self.working.bills.remove(&id).is_none() {
                return Ok(false);
            }
            self.working.periods.retain(|_, p| p.bill_id != id);
            self.working.daily_amounts.retain(|_, d| d.bill_id != id);
            Ok(true)
        }

        async fn list_periods(&mut self, bill_id: BillId) -> Result<Vec<PricingPeriod>, BillingError> {
            let mut periods: Vec<_> = self
                .working
                .periods
                .values()
                .filter(|p| p.bill_id == bill_id)
                .cloned()
                .collect();
            periods.sort_by_key(|p| (p.start_day, p.id));
            Ok(periods)
        }

        async fn find_period(&mut self, id: PricingPeriodId) -> Result<Option<PricingPeriod>, BillingError> {
            Ok(self.working.periods.get(&id).cloned())
        }

        async fn insert_period(&mut self, bill_id: BillId, period: &PeriodInput) -> Result<PricingPeriod, BillingError> {
            let id = PricingPeriodId::new(self.working.next_id());
            let period = PricingPeriod::from_input(id, bill_id, period.clone(), Utc::now());
            self.working.periods.insert(id, period.clone());
            Ok(period)
        }

        async fn update_period(&mut self, period: &PricingPeriod) -> Result<(), BillingError> {
            match self.working.periods.get_mut(&period.id) {
                Some(stored) => {
                    *stored = period.clone();
                    Ok(())
                }
                None => Err(BillingError::not_found("PricingPeriod", period.id)),
            }
        }

        async fn delete_period(&mut self, id: PricingPeriodId) -> Result<bool, BillingError> {
            if self.working.periods.remove(&id).is_none() {
                return Ok(false);
            }
            for daily in self.working.daily_amounts.values_mut() {
                if daily.pricing_period_id == Some(id) {
                    daily.pricing_period_id = None;
                }
            }
            Ok(true)
        }

        async fn list_daily_amounts(&mut self, bill_id: BillId) -> Result<Vec<DailyBillAmount>, BillingError> {
            let mut rows: Vec<_> = self
                .working
                .daily_amounts
                .values()
                .filter(|d| d.bill_id == bill_id)
                .cloned()
                .collect();
            rows.sort_by_key(|d| d.date);
            Ok(rows)
        }

        async fn find_daily_amount(
            &mut self,
            bill_id: BillId,
            date: NaiveDate,
        ) -> Result<Option<DailyBillAmount>, BillingError> {
            Ok(self
                .working
                .daily_amounts
                .values()
                .find(|d| d.bill_id == bill_id && d.date == date)
                .cloned())
        }

        async fn insert_daily_amount(&mut self, daily: &NewDailyAmount) -> Result<DailyBillAmount, BillingError> {
            let taken = self
                .working
                .daily_amounts
                .values()
                .any(|d| d.bill_id == daily.bill_id && d.date == daily.date);
            if taken {
                return Err(BillingError::Conflict(format!(
                    "Daily amount for bill {} on {} already exists",
                    daily.bill_id, daily.date
                )));
            }
            let id = DailyBillAmountId::new(self.working.next_id());
            let record = daily.clone().into_record(id, Utc::now());
            self.working.daily_amounts.insert(id, record.clone());
            Ok(record)
        }

        async fn update_daily_amount(&mut self, daily: &DailyBillAmount) -> Result<(), BillingError> {
            match self.working.daily_amounts.get_mut(&daily.id) {
                Some(stored) => {
                    *stored = daily.clone();
                    Ok(())
                }
                None => Err(BillingError::not_found("DailyBillAmount", daily.id)),
            }
        }

        async fn lock_invoice_scope(&mut self, _scope: &InvoiceNumberScope) -> Result<(), BillingError> {
            // the unit already holds the global state lock
            Ok(())
        }

        async fn invoice_numbers_in_scope(&mut self, scope: &InvoiceNumberScope) -> Result<Vec<String>, BillingError> {
            let prefix = scope.prefix();
            Ok(self
                .working
                .invoices
                .values()
                .filter(|i| i.invoice_number.starts_with(&prefix))
                .map(|i| i.invoice_number.clone())
                .collect())
        }

        async fn find_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
            Ok(self.working.invoices.get(&id).cloned())
        }

        async fn lock_invoice(&mut self, id: InvoiceId) -> Result<Option<Invoice>, BillingError> {
            self.find_invoice(id).await
        }

        async fn find_invoice_by_bill(&mut self, bill_id: BillId) -> Result<Option<Invoice>, BillingError> {
            Ok(self.working.invoices.values().find(|i| i.bill_id == bill_id).cloned())
        }

        async fn insert_invoice(&mut self, invoice: &NewInvoice, created_by: &str) -> Result<Invoice, BillingError> {
            let taken = self
                .working
                .invoices
                .values()
                .any(|i| i.invoice_number == invoice.invoice_number);
            if taken || self.take_forced_collision() {
                return Err(BillingError::DuplicateInvoiceNumber(invoice.invoice_number.clone()));
            }
            let id = InvoiceId::new(self.working.next_id());
            let item_ids = self.item_ids(invoice.items.len());
            let stored = invoice.clone().into_invoice(id, item_ids, created_by, Utc::now());
            self.working.invoices.insert(id, stored.clone());
            Ok(stored)
        }

        async fn update_invoice(&mut self, invoice: &Invoice) -> Result<(), BillingError> {
            match self.working.invoices.get_mut(&invoice.id) {
                Some(stored) => {
                    let items: Vec<InvoiceItem> = std::mem::take(&mut stored.items);
                    *stored = invoice.clone();
                    stored.items = items;
                    Ok(())
                }
                None => Err(BillingError::not_found("Invoice", invoice.id)),
            }
        }

        async fn insert_payment_master(
            &mut self,
            payment: &NewPayment,
            received_by: &str,
        ) -> Result<PaymentMaster, BillingError> {
            if !self.working.invoices.contains_key(&payment.invoice_id) {
                return Err(BillingError::not_found("Invoice", payment.invoice_id));
            }
            let id = PaymentMasterId::new(self.working.next_id());
            let master = payment.to_master(id, received_by, Utc::now());
            self.working.payment_masters.insert(id, master.clone());
            Ok(master)
        }

        async fn find_payment_master(&mut self, id: PaymentMasterId) -> Result<Option<PaymentMaster>, BillingError> {
            Ok(self.working.payment_masters.get(&id).cloned())
        }

        async fn insert_payment_detail(
            &mut self,
            master_id: PaymentMasterId,
            detail: &PaymentDetailInput,
        ) -> Result<PaymentDetails, BillingError> {
            if !self.working.payment_masters.contains_key(&master_id) {
                return Err(BillingError::not_found("PaymentMaster", master_id));
            }
            let id = PaymentDetailId::new(self.working.next_id());
            let detail = PaymentDetails::from_input(id, master_id, detail.clone(), Utc::now());
            self.working.payment_details.insert(id, detail.clone());
            Ok(detail)
        }

        async fn find_payment_detail(&mut self, id: PaymentDetailId) -> Result<Option<PaymentDetails>, BillingError> {
            Ok(self.working.payment_details.get(&id).cloned())
        }

        async fn update_payment_detail(&mut self, detail: &PaymentDetails) -> Result<(), BillingError> {
            match self.working.payment_details.get_mut(&detail.id) {
                Some(stored) => {
                    *stored = detail.clone();
                    Ok(())
                }
                None => Err(BillingError::not_found("PaymentDetails", detail.id)),
            }
        }

        async fn list_payment_details(&mut self, master_id: PaymentMasterId) -> Result<Vec<PaymentDetails>, BillingError> {
            Ok(self
                .working
                .payment_details
                .values()
                .filter(|d| d.payment_master_id == master_id)
                .cloned()
                .collect())
        }

        async fn sum_payments_for_invoice(&mut self, invoice_id: InvoiceId) -> Result<Decimal, BillingError> {
            let masters: Vec<PaymentMasterId> = self
                .working
                .payment_masters
                .values()
                .filter(|m| m.invoice_id == invoice_id)
                .map(|m| m.id)
                .collect();
            Ok(self
                .working
                .payment_details
                .values()
                .filter(|d| masters.contains(&d.payment_master_id))
                .map(|d| d.pay_amount)
                .sum())
        }

        async fn commit(self: Box<Self>) -> Result<(), BillingError> {
            let MockUnitOfWork { mut guard, working, .. } = *self;
            *guard = working;
            Ok(())
        }
    }
}
