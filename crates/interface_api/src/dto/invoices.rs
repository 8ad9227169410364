//! Invoice DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use domain_billing::{BillingError, InvoiceRequest};

use super::non_negative;

#[derive(Debug, Deserialize, Validate)]
pub struct GenerateInvoiceRequest {
    /// `ITS` (summary) or `INT` (itemised)
    #[validate(length(min = 1))]
    pub format: String,
    #[serde(default = "default_auto_populate")]
    pub auto_populate_items: bool,
    pub issue_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    #[validate(custom(function = "non_negative"))]
    pub tax_amount: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub discount_amount: Option<Decimal>,
    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

fn default_auto_populate() -> bool {
    true
}

impl GenerateInvoiceRequest {
    pub fn into_request(self) -> Result<InvoiceRequest, BillingError> {
        Ok(InvoiceRequest {
            format: self.format.parse()?,
            auto_populate_items: self.auto_populate_items,
            issue_date: self.issue_date,
            due_date: self.due_date,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            notes: self.notes,
        })
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct MarkPaidRequest {
    /// Paid amount; the full total when absent
    #[validate(custom(function = "non_negative"))]
    pub amount: Option<Decimal>,
}
