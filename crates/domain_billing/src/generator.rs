//! Invoice generator
//!
//! Builds an unnumbered [`NewInvoice`] from a bill. Numbering happens in the
//! service, inside the unit of work that inserts the invoice.
//!
//! The flat computation reconstructs the pre-discount gross as
//! `total_bill + bill.discount`, since the bill total already has the bill
//! discount taken off. Auto-populated line items then replace that subtotal
//! with the sum of their line totals.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::format_date_range;

use crate::bill::BillRecord;
use crate::components::{ServiceComponent, ServiceLine};
use crate::error::BillingError;
use crate::invoice::{derive_line_total, InvoiceFormat, NewInvoice, NewInvoiceItem};
use crate::settings::BillingSettings;

/// Options for generating an invoice from a bill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRequest {
    pub format: InvoiceFormat,
    #[serde(default = "default_auto_populate")]
    pub auto_populate_items: bool,
    /// Defaults to today in the billing timezone
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    /// Defaults to issue date + payment terms
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    /// ITS: defaults to 0. INT with items: defaults to VAT on the item subtotal
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    /// Defaults to the bill's discount
    #[serde(default)]
    pub discount_amount: Option<Decimal>,
    #[serde(default)]
    pub notes: Option<String>,
}

fn default_auto_populate() -> bool {
    true
}

impl InvoiceRequest {
    pub fn new(format: InvoiceFormat) -> Self {
        Self {
            format,
            auto_populate_items: true,
            issue_date: None,
            due_date: None,
            tax_amount: None,
            discount_amount: None,
            notes: None,
        }
    }

    pub fn with_issue_date(mut self, date: NaiveDate) -> Self {
        self.issue_date = Some(date);
        self
    }

    pub fn with_tax(mut self, tax: Decimal) -> Self {
        self.tax_amount = Some(tax);
        self
    }

    pub fn without_items(mut self) -> Self {
        self.auto_populate_items = false;
        self
    }

    fn validate(&self) -> Result<(), BillingError> {
        if matches!(self.tax_amount, Some(tax) if tax < Decimal::ZERO) {
            return Err(BillingError::validation("Tax amount must not be negative"));
        }
        if matches!(self.discount_amount, Some(discount) if discount < Decimal::ZERO) {
            return Err(BillingError::validation("Discount amount must not be negative"));
        }
        Ok(())
    }
}

/// Builds the invoice payload for a bill
///
/// # Arguments
///
/// * `bill` - Source bill with up-to-date totals
/// * `request` - Format and overrides
/// * `settings` - VAT rate and payment terms
/// * `today` - Issue date used when the request has none
///
/// # Errors
///
/// Returns a validation error for negative overrides or a due date before
/// the issue date.
pub fn build_invoice(
    bill: &BillRecord,
    request: &InvoiceRequest,
    settings: &BillingSettings,
    today: NaiveDate,
) -> Result<NewInvoice, BillingError> {
    request.validate()?;

    let issue_date = request.issue_date.unwrap_or(today);
    let due_date = match request.due_date {
        Some(due) => due,
        None => issue_date
            .checked_add_signed(Duration::days(settings.payment_terms_days))
            .ok_or_else(|| BillingError::validation("Due date is out of range"))?,
    };
    if due_date < issue_date {
        return Err(BillingError::validation(format!(
            "Due date {} is before issue date {}",
            due_date, issue_date
        )));
    }

    let discount_amount = request.discount_amount.unwrap_or(bill.discount);
    let mut invoice = NewInvoice {
        invoice_number: String::new(),
        bill_id: bill.id,
        customer_id: bill.customer_id,
        invoice_format: request.format,
        issue_date,
        due_date,
        subtotal: bill.total_bill + bill.discount,
        tax_amount: request.tax_amount.unwrap_or(Decimal::ZERO),
        discount_amount,
        total_amount: Decimal::ZERO,
        paid_amount: bill.total_received,
        notes: request.notes.clone(),
        items: Vec::new(),
    };

    if request.auto_populate_items {
        invoice.items = service_line_items(bill, request.format, issue_date)?;
        if !invoice.items.is_empty() {
            invoice.subtotal = invoice.items.iter().map(NewInvoiceItem::line_total).sum();
            if request.format == InvoiceFormat::Int && request.tax_amount.is_none() {
                invoice.tax_amount = settings.vat_rate().apply(invoice.subtotal);
            }
        }
    }
    invoice.total_amount = invoice.subtotal + invoice.tax_amount - invoice.discount_amount;
    Ok(invoice)
}

/// One line per billable service component, in component order
pub fn service_line_items(
    bill: &BillRecord,
    format: InvoiceFormat,
    issue_date: NaiveDate,
) -> Result<Vec<NewInvoiceItem>, BillingError> {
    let period = bill.service_period(issue_date)?;
    let range = format_date_range(period.start, period.end);

    let items = bill
        .usage
        .iter()
        .filter(|(_, line)| line.is_billable())
        .zip(1..)
        .map(|((component, line), serial_number)| line_item(component, line, format, &range, serial_number))
        .collect();
    Ok(items)
}

fn line_item(
    component: ServiceComponent,
    line: &ServiceLine,
    format: InvoiceFormat,
    range: &str,
    serial_number: i32,
) -> NewInvoiceItem {
    let amount = derive_line_total(Decimal::ZERO, line.quantity, line.price);
    NewInvoiceItem {
        serial_number,
        service_name: component.label().to_string(),
        service_type: Some(component),
        description: format!("{} Bandwidth charge for {}", component.label(), range),
        unit: format.line_unit().to_string(),
        quantity: line.quantity,
        unit_price: line.price,
        amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bill::NewBill;
    use crate::components::ServiceUsage;
    use chrono::Utc;
    use core_kernel::{BillId, CustomerId};
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bill() -> BillRecord {
        let new = NewBill {
            customer_id: CustomerId::new(3),
            billing_date: Some(date(2025, 6, 1)),
            usage: ServiceUsage::default().with_line(ServiceComponent::Iig, dec!(10), dec!(100)),
            discount: dec!(50),
            ..Default::default()
        };
        BillRecord::from_new(BillId::new(1), new, "tester", Utc::now())
    }

    #[test]
    fn test_its_with_items() {
        let invoice = build_invoice(
            &bill(),
            &InvoiceRequest::new(InvoiceFormat::Its),
            &BillingSettings::default(),
            date(2025, 6, 14),
        )
        .unwrap();

        assert_eq!(invoice.items.len(), 1);
        let item = &invoice.items[0];
        assert_eq!(item.service_name, "IIG");
        assert_eq!(item.unit, "Mbps");
        assert_eq!(item.line_total(), dec!(1000));
        assert_eq!(item.description, "IIG Bandwidth charge for 1st June to 30th June-2025");
        assert_eq!(invoice.subtotal, dec!(1000));
        assert_eq!(invoice.total_amount, dec!(950));
        assert_eq!(invoice.due_date, date(2025, 7, 14));
    }

    #[test]
    fn test_int_applies_vat() {
        let invoice = build_invoice(
            &bill(),
            &InvoiceRequest::new(InvoiceFormat::Int),
            &BillingSettings::default(),
            date(2025, 6, 14),
        )
        .unwrap();
        assert_eq!(invoice.items[0].unit, "Mbps/Month");
        assert_eq!(invoice.tax_amount, dec!(50));
        assert_eq!(invoice.total_amount, dec!(1000));
    }

    #[test]
    fn test_int_keeps_supplied_tax() {
        let request = InvoiceRequest::new(InvoiceFormat::Int).with_tax(dec!(10));
        let invoice = build_invoice(&bill(), &request, &BillingSettings::default(), date(2025, 6, 14)).unwrap();
        assert_eq!(invoice.tax_amount, dec!(10));
        assert_eq!(invoice.total_amount, dec!(960));
    }

    #[test]
    fn test_without_items_uses_flat_subtotal() {
        let request = InvoiceRequest::new(InvoiceFormat::Int).without_items();
        let invoice = build_invoice(&bill(), &request, &BillingSettings::default(), date(2025, 6, 14)).unwrap();
        assert!(invoice.items.is_empty());
        assert_eq!(invoice.subtotal, dec!(1000));
        assert_eq!(invoice.tax_amount, Decimal::ZERO);
        assert_eq!(invoice.total_amount, dec!(950));
    }

    #[test]
    fn test_description_uses_termination_date() {
        let mut bill = bill();
        bill.active_date = Some(date(2024, 12, 15));
        bill.termination_date = Some(date(2025, 1, 14));
        let items = service_line_items(&bill, InvoiceFormat::Its, date(2025, 1, 20)).unwrap();
        assert_eq!(
            items[0].description,
            "IIG Bandwidth charge for 15th December-2024 to 14th January-2025"
        );
    }

    #[test]
    fn test_due_before_issue_rejected() {
        let mut request = InvoiceRequest::new(InvoiceFormat::Its).with_issue_date(date(2025, 6, 14));
        request.due_date = Some(date(2025, 6, 1));
        assert!(build_invoice(&bill(), &request, &BillingSettings::default(), date(2025, 6, 14)).is_err());
    }
}
