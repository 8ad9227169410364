//! Bill and pricing period DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::CustomerId;
use domain_billing::{BillStatus, BillUpdate, BillingError, NewBill, PeriodInput, ServiceUsage};

use super::non_negative;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateBillRequest {
    #[validate(range(min = 1))]
    pub customer_id: i64,
    pub billing_date: Option<NaiveDate>,
    pub active_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    #[serde(default)]
    pub usage: ServiceUsage,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub discount: Decimal,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub total_received: Decimal,
    /// `active` or `inactive`; defaults to active
    pub status: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

impl CreateBillRequest {
    pub fn into_new_bill(self) -> Result<NewBill, BillingError> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => BillStatus::default(),
        };
        Ok(NewBill {
            customer_id: CustomerId::new(self.customer_id),
            billing_date: self.billing_date,
            active_date: self.active_date,
            termination_date: self.termination_date,
            usage: self.usage,
            discount: self.discount,
            total_received: self.total_received,
            status,
            remarks: self.remarks,
        })
    }
}

/// Partial update; absent fields keep their stored value
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateBillRequest {
    pub billing_date: Option<NaiveDate>,
    pub active_date: Option<NaiveDate>,
    pub termination_date: Option<NaiveDate>,
    pub usage: Option<ServiceUsage>,
    #[validate(custom(function = "non_negative"))]
    pub discount: Option<Decimal>,
    #[validate(custom(function = "non_negative"))]
    pub total_received: Option<Decimal>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

impl From<UpdateBillRequest> for BillUpdate {
    fn from(request: UpdateBillRequest) -> Self {
        BillUpdate {
            billing_date: request.billing_date,
            active_date: request.active_date,
            termination_date: request.termination_date,
            usage: request.usage,
            discount: request.discount,
            total_received: request.total_received,
            remarks: request.remarks,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SetBillStatusRequest {
    #[validate(length(min = 1))]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PeriodRequest {
    #[validate(range(min = 1, max = 31))]
    pub start_day: i32,
    #[validate(range(min = 1, max = 31))]
    pub end_day: i32,
    #[serde(default)]
    pub usage: ServiceUsage,
    #[serde(default)]
    #[validate(custom(function = "non_negative"))]
    pub discount: Decimal,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

impl From<PeriodRequest> for PeriodInput {
    fn from(request: PeriodRequest) -> Self {
        PeriodInput {
            start_day: request.start_day,
            end_day: request.end_day,
            usage: request.usage,
            discount: request.discount,
            notes: request.notes,
        }
    }
}
