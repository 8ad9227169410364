//! Daily amount calculator
//!
//! Derives one revenue figure per (bill, calendar date) together with a
//! per-service breakdown. A day either falls back to the bill's flat fields
//! or is pro-rated from the single pricing period whose day-of-month range
//! covers it.
//!
//! # Modes
//!
//! - **Flat**: quantity per service is the daily override when positive,
//!   otherwise the bill's quantity; priced at the bill's flat prices.
//! - **Period**: quantity per service is the daily override when positive,
//!   otherwise `period quantity / days_in_period`; priced at the period's
//!   prices, minus `period discount / days_in_period`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use core_kernel::{checked_product, round_money, round_usage, spread_evenly, BillId, DailyBillAmountId, PricingPeriodId};

use crate::bill::BillRecord;
use crate::components::{ServiceComponent, ServiceQuantities, ServiceUsage};
use crate::error::BillingError;
use crate::pricing::{self, PricingPeriod};

/// Usage, price and amount of one service on one day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakdownEntry {
    pub usage: Decimal,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Per-service audit map stored alongside the daily amount
pub type ServiceBreakdown = BTreeMap<ServiceComponent, BreakdownEntry>;

/// One materialised day of a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBillAmount {
    pub id: DailyBillAmountId,
    pub bill_id: BillId,
    pub date: NaiveDate,
    /// Period whose pro-rated values were used; `None` in flat mode
    pub pricing_period_id: Option<PricingPeriodId>,
    /// Per-service overrides; only values above zero take effect
    pub quantities: ServiceQuantities,
    pub daily_amount: Option<Decimal>,
    pub service_breakdown: ServiceBreakdown,
    /// False for manual overrides that keep their stored amount
    pub is_calculated: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DailyBillAmount {
    /// Returns true when a save must run the calculator
    pub fn needs_calculation(&self) -> bool {
        self.is_calculated || self.daily_amount.is_none()
    }

    /// Applies the save rule: recalculates when required, otherwise keeps
    /// the manual amount
    pub fn refresh(&mut self, bill: &BillRecord, period: Option<&PricingPeriod>) -> Result<(), BillingError> {
        self.pricing_period_id = period.map(|p| p.id);
        if self.needs_calculation() {
            let calculation = calculate_daily_amount(&self.quantities, bill, period)?;
            self.daily_amount = Some(calculation.daily_amount);
            self.service_breakdown = calculation.service_breakdown;
        }
        Ok(())
    }
}

/// A day ready for insertion, save rule already applied
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewDailyAmount {
    pub bill_id: BillId,
    pub date: NaiveDate,
    pub pricing_period_id: Option<PricingPeriodId>,
    pub quantities: ServiceQuantities,
    pub daily_amount: Option<Decimal>,
    pub service_breakdown: ServiceBreakdown,
    pub is_calculated: bool,
    pub notes: Option<String>,
}

impl NewDailyAmount {
    /// Materialises the inserted row
    pub fn into_record(self, id: DailyBillAmountId, now: DateTime<Utc>) -> DailyBillAmount {
        DailyBillAmount {
            id,
            bill_id: self.bill_id,
            date: self.date,
            pricing_period_id: self.pricing_period_id,
            quantities: self.quantities,
            daily_amount: self.daily_amount,
            service_breakdown: self.service_breakdown,
            is_calculated: self.is_calculated,
            notes: self.notes,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Create/update payload for a single day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyAmountInput {
    pub date: NaiveDate,
    #[serde(default)]
    pub quantities: ServiceQuantities,
    /// Manual amount; ignored when `is_calculated` is true
    #[serde(default)]
    pub daily_amount: Option<Decimal>,
    #[serde(default = "default_calculated")]
    pub is_calculated: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_calculated() -> bool {
    true
}

impl DailyAmountInput {
    /// Auto-derived row for a date with no overrides
    pub fn calculated(date: NaiveDate) -> Self {
        Self {
            date,
            quantities: ServiceQuantities::default(),
            daily_amount: None,
            is_calculated: true,
            notes: None,
        }
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        for (component, quantity) in self.quantities.iter() {
            if *quantity < Decimal::ZERO {
                return Err(BillingError::validation(format!(
                    "{} daily quantity must not be negative",
                    component
                )));
            }
        }
        if matches!(self.daily_amount, Some(amount) if amount < Decimal::ZERO) {
            return Err(BillingError::validation("Daily amount must not be negative"));
        }
        Ok(())
    }

    /// Builds the insert payload for `bill`, applying the save rule
    pub fn into_new(
        self,
        bill: &BillRecord,
        period: Option<&PricingPeriod>,
    ) -> Result<NewDailyAmount, BillingError> {
        let mut new = NewDailyAmount {
            bill_id: bill.id,
            date: self.date,
            pricing_period_id: period.map(|p| p.id),
            quantities: self.quantities,
            daily_amount: if self.is_calculated { None } else { self.daily_amount },
            service_breakdown: ServiceBreakdown::new(),
            is_calculated: self.is_calculated,
            notes: self.notes,
        };
        if new.is_calculated || new.daily_amount.is_none() {
            let calculation = calculate_daily_amount(&new.quantities, bill, period)?;
            new.daily_amount = Some(calculation.daily_amount);
            new.service_breakdown = calculation.service_breakdown;
        }
        Ok(new)
    }

    /// Overwrites an existing row's editable fields
    pub fn apply_to(self, record: &mut DailyBillAmount, now: DateTime<Utc>) {
        record.quantities = self.quantities;
        record.daily_amount = if self.is_calculated { None } else { self.daily_amount };
        record.is_calculated = self.is_calculated;
        record.notes = self.notes;
        record.updated_at = now;
    }
}

/// Result of one day's calculation
#[derive(Debug, Clone, PartialEq)]
pub struct DailyCalculation {
    pub daily_amount: Decimal,
    pub service_breakdown: ServiceBreakdown,
}

/// Calculates one day's amount and breakdown
///
/// # Errors
///
/// Returns `BillingError::Calculation` when the period spans no days, which
/// the day invariant forbids but stored rows are not trusted to honour.
pub fn calculate_daily_amount(
    overrides: &ServiceQuantities,
    bill: &BillRecord,
    period: Option<&PricingPeriod>,
) -> Result<DailyCalculation, BillingError> {
    match period {
        None => flat_day(overrides, &bill.usage),
        Some(period) => prorated_day(overrides, period),
    }
}

fn flat_day(overrides: &ServiceQuantities, usage: &ServiceUsage) -> Result<DailyCalculation, BillingError> {
    let mut breakdown = ServiceBreakdown::new();
    let mut total = Decimal::ZERO;
    for (component, line) in usage.iter() {
        let quantity = effective_quantity(*overrides.get(component), line.quantity);
        let amount = checked_product(quantity, line.price)?;
        total += amount;
        record_entry(&mut breakdown, component, quantity, line.price, amount);
    }
    Ok(DailyCalculation {
        daily_amount: round_money(total),
        service_breakdown: breakdown,
    })
}

fn prorated_day(overrides: &ServiceQuantities, period: &PricingPeriod) -> Result<DailyCalculation, BillingError> {
    let days = period.days_in_period();
    if days <= 0 {
        return Err(BillingError::Calculation(format!(
            "Pricing period {} spans no days ({}-{})",
            period.id, period.start_day, period.end_day
        )));
    }

    let mut breakdown = ServiceBreakdown::new();
    let mut total = Decimal::ZERO;
    for (component, line) in period.usage.iter() {
        let daily_default = spread_evenly(line.quantity, days)?;
        let quantity = effective_quantity(*overrides.get(component), daily_default);
        let amount = checked_product(quantity, line.price)?;
        total += amount;
        record_entry(&mut breakdown, component, quantity, line.price, amount);
    }
    if period.discount > Decimal::ZERO {
        total -= spread_evenly(period.discount, days)?;
    }
    Ok(DailyCalculation {
        daily_amount: round_money(total),
        service_breakdown: breakdown,
    })
}

fn effective_quantity(override_value: Decimal, fallback: Decimal) -> Decimal {
    if override_value > Decimal::ZERO {
        override_value
    } else {
        fallback
    }
}

fn record_entry(
    breakdown: &mut ServiceBreakdown,
    component: ServiceComponent,
    usage: Decimal,
    price: Decimal,
    amount: Decimal,
) {
    if usage > Decimal::ZERO {
        breakdown.insert(
            component,
            BreakdownEntry {
                usage: round_usage(usage),
                price,
                amount: round_money(amount),
            },
        );
    }
}

/// Picks the period governing a date during bulk calculation
///
/// A bill without periods uses flat mode every day. Otherwise exactly one
/// period must cover the date's day of month.
pub fn resolve_period(periods: &[PricingPeriod], date: NaiveDate) -> Result<Option<&PricingPeriod>, BillingError> {
    if periods.is_empty() {
        return Ok(None);
    }
    pricing::period_for_date(periods, date).map(Some)
}

/// A failed day inside a bulk run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayError {
    pub date: NaiveDate,
    pub message: String,
}

/// Outcome of a bulk calculation; partial failure is reported, not raised
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCalculationReport {
    pub created_count: u32,
    pub updated_count: u32,
    pub errors: Vec<DayError>,
}

impl DailyCalculationReport {
    pub fn record_error(&mut self, date: NaiveDate, error: &BillingError) {
        self.errors.push(DayError {
            date,
            message: error.to_string(),
        });
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}
