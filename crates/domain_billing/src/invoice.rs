//! Invoice management
//!
//! An invoice is a snapshot of one bill, numbered once at creation. Its
//! balance and status are derived on every save from the paid amount, except
//! that a cancelled invoice keeps its status.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::{amount_in_words, round_money, BillId, CustomerId, InvoiceId, InvoiceItemId};

use crate::components::ServiceComponent;
use crate::error::BillingError;
use crate::numbering::InvoiceNumberScope;

/// Invoice presentation format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceFormat {
    /// Domestic IT-support style, VAT only when supplied
    #[serde(rename = "ITS")]
    Its,
    /// International bandwidth style, 5% VAT applied on auto-populated items
    #[serde(rename = "INT")]
    Int,
}

impl InvoiceFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceFormat::Its => "ITS",
            InvoiceFormat::Int => "INT",
        }
    }

    /// Unit printed on auto-populated service lines
    pub fn line_unit(&self) -> &'static str {
        match self {
            InvoiceFormat::Its => "Mbps",
            InvoiceFormat::Int => "Mbps/Month",
        }
    }
}

impl fmt::Display for InvoiceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceFormat {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ITS" => Ok(InvoiceFormat::Its),
            "INT" => Ok(InvoiceFormat::Int),
            other => Err(BillingError::validation(format!("Unknown invoice format: {}", other))),
        }
    }
}

/// Invoice status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    /// Invoice is being drafted
    #[default]
    Draft,
    /// Invoice has been issued
    Issued,
    /// Invoice has been sent to customer
    Sent,
    /// Partial payment received
    #[serde(rename = "partial")]
    PartiallyPaid,
    /// Fully paid
    Paid,
    /// Past due date
    Overdue,
    /// Cancelled/voided
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Issued => "issued",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::PartiallyPaid => "partial",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }

    /// Statuses a positive payment may move to `Issued` during save
    fn is_pre_payment(&self) -> bool {
        matches!(self, InvoiceStatus::Draft | InvoiceStatus::Issued | InvoiceStatus::Sent)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(InvoiceStatus::Draft),
            "issued" => Ok(InvoiceStatus::Issued),
            "sent" => Ok(InvoiceStatus::Sent),
            "partial" => Ok(InvoiceStatus::PartiallyPaid),
            "paid" => Ok(InvoiceStatus::Paid),
            "overdue" => Ok(InvoiceStatus::Overdue),
            "cancelled" => Ok(InvoiceStatus::Cancelled),
            other => Err(BillingError::validation(format!("Unknown invoice status: {}", other))),
        }
    }
}

/// An invoice generated from a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    /// Unique identifier
    pub id: InvoiceId,
    /// `KTL {month} {year}/{sequence}`
    pub invoice_number: String,
    /// Source bill (one invoice per bill)
    pub bill_id: BillId,
    /// Billed customer
    pub customer_id: CustomerId,
    pub invoice_format: InvoiceFormat,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    /// Gross before the discount
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    /// subtotal + tax - discount
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    /// total_amount - paid_amount
    pub balance_due: Decimal,
    pub amount_in_words: String,
    pub status: InvoiceStatus,
    pub notes: Option<String>,
    pub issued_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Line items ordered by serial number
    pub items: Vec<InvoiceItem>,
}

impl Invoice {
    /// Recomputes `total_amount` from its components
    pub fn recalculate_total(&mut self) {
        self.total_amount = self.subtotal + self.tax_amount - self.discount_amount;
    }

    /// Save-time derivation of balance, words and status
    ///
    /// Runs before every write. Paid in full with a positive total moves the
    /// invoice to `Paid` (stamping `paid_at` once); any positive payment moves
    /// a draft, issued or sent invoice to `Issued`. Partial, overdue and
    /// cancelled invoices keep their status.
    pub fn refresh_derived(&mut self, now: DateTime<Utc>) {
        self.balance_due = self.total_amount - self.paid_amount;
        self.amount_in_words = amount_in_words(self.total_amount);
        self.updated_at = now;

        if self.status == InvoiceStatus::Cancelled {
            return;
        }
        if self.paid_amount >= self.total_amount && self.total_amount > Decimal::ZERO {
            self.status = InvoiceStatus::Paid;
            self.paid_at.get_or_insert(now);
        } else if self.paid_amount > Decimal::ZERO && self.status.is_pre_payment() {
            self.status = InvoiceStatus::Issued;
        }
    }

    /// Explicit transition to `Issued`
    ///
    /// # Errors
    ///
    /// Returns a conflict for cancelled or paid invoices.
    pub fn mark_as_issued(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if matches!(self.status, InvoiceStatus::Cancelled | InvoiceStatus::Paid) {
            return Err(BillingError::Conflict(format!(
                "Invoice {} is {} and cannot be issued",
                self.invoice_number, self.status
            )));
        }
        self.status = InvoiceStatus::Issued;
        self.issued_at = Some(now);
        self.refresh_derived(now);
        Ok(())
    }

    /// Explicit payment, bypassing payment reconciliation
    ///
    /// Only an amount covering the total moves the invoice to `Paid`. A
    /// smaller amount is recorded and the status follows the save rule.
    ///
    /// # Arguments
    ///
    /// * `amount` - Paid amount to record; defaults to the invoice total
    /// * `now` - Timestamp stamped as `paid_at`
    pub fn mark_as_paid(&mut self, amount: Option<Decimal>, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status == InvoiceStatus::Cancelled {
            return Err(BillingError::Conflict(format!(
                "Invoice {} is cancelled and cannot be paid",
                self.invoice_number
            )));
        }
        let amount = amount.unwrap_or(self.total_amount);
        if amount < Decimal::ZERO {
            return Err(BillingError::validation("Paid amount must not be negative"));
        }
        self.paid_amount = amount;
        if amount >= self.total_amount {
            self.status = InvoiceStatus::Paid;
            self.paid_at = Some(now);
        } else if self.status == InvoiceStatus::Paid {
            self.status = InvoiceStatus::Issued;
            self.paid_at = None;
        }
        self.refresh_derived(now);
        Ok(())
    }

    /// Voids the invoice; later payments still update the amounts
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), BillingError> {
        if self.status == InvoiceStatus::Paid {
            return Err(BillingError::Conflict(format!(
                "Invoice {} is paid and cannot be cancelled",
                self.invoice_number
            )));
        }
        self.status = InvoiceStatus::Cancelled;
        self.refresh_derived(now);
        Ok(())
    }

    /// Checks if the invoice is past due on `today`
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        today > self.due_date
            && self.balance_due > Decimal::ZERO
            && !matches!(self.status, InvoiceStatus::Paid | InvoiceStatus::Cancelled)
    }

    /// Numbering scope the invoice was counted in
    pub fn number_scope(&self) -> InvoiceNumberScope {
        InvoiceNumberScope::for_date(self.issue_date)
    }

}

/// `amount` when positive, else `quantity × unit_price`
pub fn derive_line_total(amount: Decimal, quantity: Decimal, unit_price: Decimal) -> Decimal {
    if amount > Decimal::ZERO {
        amount
    } else {
        round_money(quantity * unit_price)
    }
}

/// A line item on an invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: InvoiceItemId,
    pub invoice_id: InvoiceId,
    /// 1-based position on the printed invoice
    pub serial_number: i32,
    pub service_name: String,
    /// Service component for auto-populated lines
    pub service_type: Option<ServiceComponent>,
    pub description: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub line_total: Decimal,
}

/// Line item payload before insertion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoiceItem {
    pub serial_number: i32,
    pub service_name: String,
    pub service_type: Option<ServiceComponent>,
    pub description: String,
    pub unit: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
}

impl NewInvoiceItem {
    pub fn line_total(&self) -> Decimal {
        derive_line_total(self.amount, self.quantity, self.unit_price)
    }

    /// Materialises the inserted row
    pub fn into_item(self, id: InvoiceItemId, invoice_id: InvoiceId) -> InvoiceItem {
        let line_total = self.line_total();
        InvoiceItem {
            id,
            invoice_id,
            serial_number: self.serial_number,
            service_name: self.service_name,
            service_type: self.service_type,
            description: self.description,
            unit: self.unit,
            quantity: self.quantity,
            unit_price: self.unit_price,
            amount: self.amount,
            line_total,
        }
    }
}

/// Invoice payload before insertion
///
/// Built by the generator without a number; the service assigns the number
/// under the scope lock right before inserting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub bill_id: BillId,
    pub customer_id: CustomerId,
    pub invoice_format: InvoiceFormat,
    pub issue_date: NaiveDate,
    pub due_date: NaiveDate,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
    pub paid_amount: Decimal,
    pub notes: Option<String>,
    pub items: Vec<NewInvoiceItem>,
}

impl NewInvoice {
    /// Numbering scope derived from the issue date
    pub fn number_scope(&self) -> InvoiceNumberScope {
        InvoiceNumberScope::for_date(self.issue_date)
    }

    /// Materialises the inserted invoice with its item ids
    ///
    /// Runs the save-time derivation so a seeded paid amount is reflected in
    /// the stored status.
    pub fn into_invoice(
        self,
        id: InvoiceId,
        item_ids: impl IntoIterator<Item = InvoiceItemId>,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Invoice {
        let items = self
            .items
            .into_iter()
            .zip(item_ids)
            .map(|(item, item_id)| item.into_item(item_id, id))
            .collect();
        let mut invoice = Invoice {
            id,
            invoice_number: self.invoice_number,
            bill_id: self.bill_id,
            customer_id: self.customer_id,
            invoice_format: self.invoice_format,
            issue_date: self.issue_date,
            due_date: self.due_date,
            subtotal: self.subtotal,
            tax_amount: self.tax_amount,
            discount_amount: self.discount_amount,
            total_amount: self.total_amount,
            paid_amount: self.paid_amount,
            balance_due: Decimal::ZERO,
            amount_in_words: String::new(),
            status: InvoiceStatus::Draft,
            notes: self.notes,
            issued_at: None,
            paid_at: None,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            items,
        };
        invoice.refresh_derived(now);
        invoice
    }
}
