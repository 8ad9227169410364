//! Payments and the payment reconciler
//!
//! A payment master ties one payment event to an (entitlement, invoice)
//! pair and is decomposed into detail transactions. Reconciliation is
//! invoice-scoped: after any detail write the invoice's paid amount is the
//! sum over every detail of every master pointing at it.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{EntitlementId, InvoiceId, PaymentDetailId, PaymentMasterId};

use crate::error::BillingError;
use crate::invoice::{Invoice, InvoiceStatus};

/// Status of a single payment transaction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentDetailStatus {
    Pending,
    #[default]
    Completed,
    Failed,
}

impl PaymentDetailStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentDetailStatus::Pending => "pending",
            PaymentDetailStatus::Completed => "completed",
            PaymentDetailStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentDetailStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentDetailStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentDetailStatus::Pending),
            "completed" => Ok(PaymentDetailStatus::Completed),
            "failed" => Ok(PaymentDetailStatus::Failed),
            other => Err(BillingError::validation(format!("Unknown payment status: {}", other))),
        }
    }
}

/// A payment event against one invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMaster {
    pub id: PaymentMasterId,
    /// CRM-owned entitlement reference
    pub entitlement_id: EntitlementId,
    pub invoice_id: InvoiceId,
    pub payment_date: NaiveDate,
    pub payment_method: Option<String>,
    pub remarks: Option<String>,
    pub received_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One transaction within a payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub id: PaymentDetailId,
    pub payment_master_id: PaymentMasterId,
    pub pay_amount: Decimal,
    pub transaction_id: Option<String>,
    pub status: PaymentDetailStatus,
    pub remarks: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentDetails {
    /// Materialises a freshly inserted row
    pub fn from_input(
        id: PaymentDetailId,
        payment_master_id: PaymentMasterId,
        input: PaymentDetailInput,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            payment_master_id,
            pay_amount: input.pay_amount,
            transaction_id: input.transaction_id,
            status: input.status,
            remarks: input.remarks,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the editable fields
    pub fn apply(&mut self, input: PaymentDetailInput, now: DateTime<Utc>) {
        self.pay_amount = input.pay_amount;
        self.transaction_id = input.transaction_id;
        self.status = input.status;
        self.remarks = input.remarks;
        self.updated_at = now;
    }
}

/// Create/update payload for a payment detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDetailInput {
    pub pay_amount: Decimal,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub status: PaymentDetailStatus,
    #[serde(default)]
    pub remarks: Option<String>,
}

impl PaymentDetailInput {
    pub fn new(pay_amount: Decimal) -> Self {
        Self {
            pay_amount,
            transaction_id: None,
            status: PaymentDetailStatus::Completed,
            remarks: None,
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn validate(&self) -> Result<(), BillingError> {
        if self.pay_amount <= Decimal::ZERO {
            return Err(BillingError::validation("Pay amount must be positive"));
        }
        Ok(())
    }
}

/// Payload for recording a payment with its initial details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPayment {
    pub entitlement_id: EntitlementId,
    pub invoice_id: InvoiceId,
    pub payment_date: NaiveDate,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub remarks: Option<String>,
    #[serde(default)]
    pub details: Vec<PaymentDetailInput>,
}

impl NewPayment {
    pub fn validate(&self) -> Result<(), BillingError> {
        self.details.iter().try_for_each(PaymentDetailInput::validate)
    }

    /// Master row for this payload; details are inserted separately
    pub fn to_master(&self, id: PaymentMasterId, received_by: &str, now: DateTime<Utc>) -> PaymentMaster {
        PaymentMaster {
            id,
            entitlement_id: self.entitlement_id,
            invoice_id: self.invoice_id,
            payment_date: self.payment_date,
            payment_method: self.payment_method.clone(),
            remarks: self.remarks.clone(),
            received_by: received_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// What reconciliation did to an invoice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationOutcome {
    pub invoice_id: InvoiceId,
    pub total_paid: Decimal,
    pub balance_due: Decimal,
    pub previous_status: InvoiceStatus,
    pub status: InvoiceStatus,
}

/// Re-projects the invoice-wide payment sum onto the invoice
///
/// Balance at or below zero with a positive sum is paid (overpayment counts
/// as paid), a positive sum with a balance left is partial, and a zero sum
/// leaves the status alone. A cancelled invoice keeps its status while its
/// amounts still follow the payments.
pub fn reconcile_invoice(invoice: &mut Invoice, total_paid: Decimal, now: DateTime<Utc>) -> ReconciliationOutcome {
    let previous_status = invoice.status;
    invoice.paid_amount = total_paid;
    invoice.balance_due = invoice.total_amount - total_paid;

    if invoice.status != InvoiceStatus::Cancelled && total_paid > Decimal::ZERO {
        if invoice.balance_due <= Decimal::ZERO {
            invoice.status = InvoiceStatus::Paid;
        } else {
            invoice.status = InvoiceStatus::PartiallyPaid;
        }
    }
    if previous_status == InvoiceStatus::Paid && invoice.status != InvoiceStatus::Paid {
        invoice.paid_at = None;
    }
    invoice.refresh_derived(now);

    ReconciliationOutcome {
        invoice_id: invoice.id,
        total_paid,
        balance_due: invoice.balance_due,
        previous_status,
        status: invoice.status,
    }
}
