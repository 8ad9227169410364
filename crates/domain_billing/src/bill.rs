//! Bill records and the bill total aggregator
//!
//! A bill is one customer's billing cycle. Its `total_bill` is derived:
//! from its pricing periods when it has any, otherwise from its own flat
//! quantity/price/discount fields. `total_due` always follows as
//! `total_bill - total_received`.
//!
//! # Lifecycle
//!
//! Creation is two-phase. The row is inserted without a bill number, then
//! [`BillRecord::assign_identifier`] derives the number from the assigned id
//! and the row is updated. Both steps run inside one unit of work.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{BillId, CustomerId, DateRange};

use crate::components::ServiceUsage;
use crate::error::BillingError;
use crate::numbering;
use crate::pricing::PricingPeriod;

/// Soft lifecycle status of a bill
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillStatus {
    #[default]
    Active,
    Inactive,
}

impl BillStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillStatus::Active => "active",
            BillStatus::Inactive => "inactive",
        }
    }
}

impl fmt::Display for BillStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BillStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(BillStatus::Active),
            "inactive" => Ok(BillStatus::Inactive),
            other => Err(BillingError::validation(format!("Unknown bill status: {}", other))),
        }
    }
}

/// One customer billing cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillRecord {
    pub id: BillId,
    pub customer_id: CustomerId,
    /// Public number; `None` until the second creation step has run
    pub bill_number: Option<String>,
    pub billing_date: Option<NaiveDate>,
    pub active_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    /// Flat per-service quantities and prices
    pub usage: ServiceUsage,
    pub discount: Decimal,
    pub total_bill: Decimal,
    pub total_received: Decimal,
    pub total_due: Decimal,
    pub status: BillStatus,
    pub remarks: Option<String>,
    pub created_by: String,
    pub updated_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BillRecord {
    /// Materialises a freshly inserted row (no bill number yet)
    pub fn from_new(id: BillId, new: NewBill, created_by: &str, now: DateTime<Utc>) -> Self {
        let mut bill = Self {
            id,
            customer_id: new.customer_id,
            bill_number: None,
            billing_date: new.billing_date,
            active_date: new.active_date,
            termination_date: new.termination_date,
            usage: new.usage,
            discount: new.discount,
            total_bill: Decimal::ZERO,
            total_received: new.total_received,
            total_due: Decimal::ZERO,
            status: new.status,
            remarks: new.remarks,
            created_by: created_by.to_string(),
            updated_by: None,
            created_at: now,
            updated_at: now,
        };
        bill.recompute_totals(&[]);
        bill
    }

    /// Second creation step: derive the public bill number
    ///
    /// Uses the billing date, falling back to the creation date. A bill that
    /// already carries a number keeps it.
    pub fn assign_identifier(&mut self, customer_name: &str) -> &str {
        if self.bill_number.is_none() {
            let date = self.billing_date.unwrap_or_else(|| self.created_at.date_naive());
            self.bill_number = Some(numbering::bill_number(customer_name, self.id, date));
        }
        self.bill_number.as_deref().unwrap_or_default()
    }

    /// Returns true once the bill number has been assigned
    pub fn is_complete(&self) -> bool {
        self.bill_number.is_some()
    }

    /// Recomputes `total_bill` and `total_due`
    ///
    /// Idempotent: with unchanged inputs the totals are unchanged. Returns
    /// true when either total moved.
    pub fn recompute_totals(&mut self, periods: &[PricingPeriod]) -> bool {
        let total_bill = aggregate_total_bill(&self.usage, self.discount, periods);
        let total_due = total_bill - self.total_received;
        let changed = total_bill != self.total_bill || total_due != self.total_due;
        self.total_bill = total_bill;
        self.total_due = total_due;
        changed
    }

    /// Applies a partial update of flat fields
    pub fn apply_update(&mut self, update: BillUpdate, actor: &str, now: DateTime<Utc>) -> Result<(), BillingError> {
        if let Some(date) = update.billing_date {
            self.billing_date = Some(date);
        }
        if let Some(date) = update.active_date {
            self.active_date = Some(date);
        }
        if let Some(date) = update.termination_date {
            self.termination_date = Some(date);
        }
        if let Some(usage) = update.usage {
            usage.validate_non_negative()?;
            self.usage = usage;
        }
        if let Some(discount) = update.discount {
            ensure_non_negative("discount", discount)?;
            self.discount = discount;
        }
        if let Some(received) = update.total_received {
            ensure_non_negative("total_received", received)?;
            self.total_received = received;
        }
        if let Some(remarks) = update.remarks {
            self.remarks = Some(remarks);
        }
        validate_dates(self.active_date, self.termination_date)?;
        self.touch(actor, now);
        Ok(())
    }

    /// Records the actor and time of a mutation
    pub fn touch(&mut self, actor: &str, now: DateTime<Utc>) {
        self.updated_by = Some(actor.to_string());
        self.updated_at = now;
    }

    /// Calendar range walked by the daily amount calculator
    ///
    /// Starts at the active date (falling back to the billing date) and ends
    /// at the termination date (falling back to the end of the start month).
    pub fn billing_range(&self) -> Result<DateRange, BillingError> {
        let start = self
            .active_date
            .or(self.billing_date)
            .ok_or_else(|| BillingError::validation(format!(
                "Bill {} has neither an active date nor a billing date",
                self.id
            )))?;
        let range = match self.termination_date {
            Some(end) => DateRange::new(start, end)?,
            None => DateRange::rest_of_month(start)?,
        };
        Ok(range)
    }

    /// Service period printed on invoice lines
    ///
    /// Starts at the active date, then the billing date, then `fallback`;
    /// ends at the termination date or the end of the start month.
    pub fn service_period(&self, fallback: NaiveDate) -> Result<DateRange, BillingError> {
        let start = self.active_date.or(self.billing_date).unwrap_or(fallback);
        let range = match self.termination_date {
            Some(end) if end >= start => DateRange::new(start, end)?,
            _ => DateRange::rest_of_month(start)?,
        };
        Ok(range)
    }
}

/// The bill total aggregator
///
/// With one or more periods the total is the sum of every period's own
/// total (periods cover different days, so they add up). Without periods it
/// is the bill's flat Σ(quantity × price) - discount.
pub fn aggregate_total_bill(usage: &ServiceUsage, discount: Decimal, periods: &[PricingPeriod]) -> Decimal {
    if periods.is_empty() {
        usage.gross_total() - discount
    } else {
        periods.iter().map(PricingPeriod::period_total).sum()
    }
}

/// Create payload for a bill
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewBill {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub billing_date: Option<NaiveDate>,
    #[serde(default)]
    pub active_date: Option<NaiveDate>,
    #[serde(default)]
    pub termination_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage: ServiceUsage,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub total_received: Decimal,
    #[serde(default)]
    pub status: BillStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl NewBill {
    /// Checks the payload before any write
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.billing_date.is_none() && self.active_date.is_none() {
            return Err(BillingError::validation(
                "A bill needs a billing date or an active date",
            ));
        }
        self.usage.validate_non_negative()?;
        ensure_non_negative("discount", self.discount)?;
        ensure_non_negative("total_received", self.total_received)?;
        validate_dates(self.active_date, self.termination_date)
    }
}

/// Partial update payload for a bill's flat fields
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BillUpdate {
    pub billing_date: Option<NaiveDate>,
    pub active_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub usage: Option<ServiceUsage>,
    pub discount: Option<Decimal>,
    pub total_received: Option<Decimal>,
    pub remarks: Option<String>,
}

fn ensure_non_negative(field: &str, value: Decimal) -> Result<(), BillingError> {
    if value < Decimal::ZERO {
        return Err(BillingError::validation(format!("{} must not be negative", field)));
    }
    Ok(())
}

fn validate_dates(active: Option<NaiveDate>, termination: Option<NaiveDate>) -> Result<(), BillingError> {
    if let (Some(start), Some(end)) = (active, termination) {
        if end < start {
            return Err(BillingError::validation(format!(
                "Termination date {} is before active date {}",
                end, start
            )));
        }
    }
    Ok(())
}
