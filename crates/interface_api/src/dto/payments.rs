//! Payment DTOs

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use validator::Validate;

use core_kernel::{EntitlementId, InvoiceId};
use domain_billing::{BillingError, NewPayment, PaymentDetailInput, PaymentDetailStatus};

use super::positive;

#[derive(Debug, Deserialize, Validate)]
pub struct RecordPaymentRequest {
    #[validate(range(min = 1))]
    pub entitlement_id: i64,
    #[validate(range(min = 1))]
    pub invoice_id: i64,
    pub payment_date: NaiveDate,
    #[validate(length(max = 64))]
    pub payment_method: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub details: Vec<PaymentDetailRequest>,
}

impl RecordPaymentRequest {
    pub fn into_new_payment(self) -> Result<NewPayment, BillingError> {
        let details = self
            .details
            .into_iter()
            .map(PaymentDetailRequest::into_input)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NewPayment {
            entitlement_id: EntitlementId::new(self.entitlement_id),
            invoice_id: InvoiceId::new(self.invoice_id),
            payment_date: self.payment_date,
            payment_method: self.payment_method,
            remarks: self.remarks,
            details,
        })
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaymentDetailRequest {
    #[validate(custom(function = "positive"))]
    pub pay_amount: Decimal,
    #[validate(length(max = 128))]
    pub transaction_id: Option<String>,
    /// Defaults to completed
    pub status: Option<String>,
    #[validate(length(max = 1000))]
    pub remarks: Option<String>,
}

impl PaymentDetailRequest {
    pub fn into_input(self) -> Result<PaymentDetailInput, BillingError> {
        let status = match self.status.as_deref() {
            Some(s) => s.parse()?,
            None => PaymentDetailStatus::default(),
        };
        Ok(PaymentDetailInput {
            pay_amount: self.pay_amount,
            transaction_id: self.transaction_id,
            status,
            remarks: self.remarks,
        })
    }
}
