//! Pricing period ledger
//!
//! A pricing period is a day-of-month slice of a bill carrying its own usage,
//! prices and optional discount. Several periods model a mid-cycle price
//! change; their totals are additive across the bill.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::{BillId, PricingPeriodId};

use crate::components::ServiceUsage;
use crate::error::BillingError;

/// Lowest valid day of month
pub const FIRST_DAY: i32 = 1;

/// Highest valid day of month
pub const LAST_DAY: i32 = 31;

/// A day-range slice of a bill with its own usage and prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingPeriod {
    pub id: PricingPeriodId,
    pub bill_id: BillId,
    /// First covered day of month (inclusive)
    pub start_day: i32,
    /// Last covered day of month (inclusive)
    pub end_day: i32,
    pub usage: ServiceUsage,
    pub discount: Decimal,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PricingPeriod {
    /// Materialises a freshly inserted row
    pub fn from_input(id: PricingPeriodId, bill_id: BillId, input: PeriodInput, now: DateTime<Utc>) -> Self {
        Self {
            id,
            bill_id,
            start_day: input.start_day,
            end_day: input.end_day,
            usage: input.usage,
            discount: input.discount,
            notes: input.notes,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the editable fields from an update payload
    pub fn apply(&mut self, input: PeriodInput, now: DateTime<Utc>) {
        self.start_day = input.start_day;
        self.end_day = input.end_day;
        self.usage = input.usage;
        self.discount = input.discount;
        self.notes = input.notes;
        self.updated_at = now;
    }

    /// Σ(quantity_i × price_i) - discount
    pub fn period_total(&self) -> Decimal {
        self.usage.gross_total() - self.discount
    }

    /// Number of days the period spans, counting both ends
    ///
    /// Rows read back from storage are not trusted to satisfy the day
    /// invariant, so callers dividing by this must reject non-positive values.
    pub fn days_in_period(&self) -> i64 {
        i64::from(self.end_day) - i64::from(self.start_day) + 1
    }

    /// Returns true if the day of month lies in [start_day, end_day]
    pub fn covers_day(&self, day: u32) -> bool {
        let day = day as i32;
        day >= self.start_day && day <= self.end_day
    }

    /// Returns true if the calendar date's day of month is covered
    pub fn covers_date(&self, date: NaiveDate) -> bool {
        self.covers_day(date.day())
    }
}

/// Create/update payload for a pricing period
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodInput {
    pub start_day: i32,
    pub end_day: i32,
    #[serde(default)]
    pub usage: ServiceUsage,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PeriodInput {
    /// Enforces 1 ≤ start_day ≤ end_day ≤ 31 and non-negative values
    pub fn validate(&self) -> Result<(), BillingError> {
        validate_day_range(self.start_day, self.end_day)?;
        if self.discount < Decimal::ZERO {
            return Err(BillingError::validation("Period discount must not be negative"));
        }
        self.usage.validate_non_negative()
    }
}

/// Checks a day-of-month range
pub fn validate_day_range(start_day: i32, end_day: i32) -> Result<(), BillingError> {
    if !(FIRST_DAY..=LAST_DAY).contains(&start_day) || !(FIRST_DAY..=LAST_DAY).contains(&end_day) {
        return Err(BillingError::validation(format!(
            "Period days must be between {} and {}, got {}-{}",
            FIRST_DAY, LAST_DAY, start_day, end_day
        )));
    }
    if start_day > end_day {
        return Err(BillingError::validation(format!(
            "Period start day {} is after end day {}",
            start_day, end_day
        )));
    }
    Ok(())
}

/// Finds the single period covering a date
///
/// # Errors
///
/// Returns a validation error naming the day when no period or more than
/// one period covers it.
pub fn period_for_date(periods: &[PricingPeriod], date: NaiveDate) -> Result<&PricingPeriod, BillingError> {
    let mut matching = periods.iter().filter(|p| p.covers_date(date));
    match (matching.next(), matching.next()) {
        (Some(period), None) => Ok(period),
        (None, _) => Err(BillingError::validation(format!(
            "No pricing period covers day {} ({})",
            date.day(),
            date
        ))),
        (Some(_), Some(_)) => Err(BillingError::validation(format!(
            "Multiple pricing periods cover day {} ({})",
            date.day(),
            date
        ))),
    }
}
