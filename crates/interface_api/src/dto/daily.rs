//! Daily amount DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use core_kernel::BillId;
use domain_billing::{DailyAmountInput, DailyBillAmount, DailyCalculationReport, ServiceQuantities};

use super::non_negative;

#[derive(Debug, Default, Deserialize)]
pub struct CalculateDailyRequest {
    /// Refresh rows that already exist instead of skipping them
    #[serde(default)]
    pub recalculate: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SaveDailyAmountRequest {
    pub date: NaiveDate,
    #[serde(default)]
    pub quantities: ServiceQuantities,
    #[validate(custom(function = "non_negative"))]
    pub daily_amount: Option<Decimal>,
    #[serde(default = "default_calculated")]
    pub is_calculated: bool,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

fn default_calculated() -> bool {
    true
}

impl From<SaveDailyAmountRequest> for DailyAmountInput {
    fn from(request: SaveDailyAmountRequest) -> Self {
        DailyAmountInput {
            date: request.date,
            quantities: request.quantities,
            daily_amount: request.daily_amount,
            is_calculated: request.is_calculated,
            notes: request.notes,
        }
    }
}

/// Daily rows of a bill with their summed amount
#[derive(Debug, Serialize)]
pub struct DailyAmountsResponse {
    pub bill_id: BillId,
    pub days: usize,
    pub total: Decimal,
    pub items: Vec<DailyBillAmount>,
}

impl DailyAmountsResponse {
    pub fn new(bill_id: BillId, items: Vec<DailyBillAmount>) -> Self {
        let total = items.iter().filter_map(|d| d.daily_amount).sum();
        Self {
            bill_id,
            days: items.len(),
            total,
            items,
        }
    }
}

/// Outcome of a bulk calculation run
#[derive(Debug, Serialize)]
pub struct CalculateDailyResponse {
    pub bill_id: BillId,
    #[serde(flatten)]
    pub report: DailyCalculationReport,
}
