//! Custom Test Assertions
//!
//! Provides assertion helpers for billing values that give more meaningful
//! failure messages than standard assertions.

use domain_billing::{BillRecord, Invoice};
use rust_decimal::Decimal;

/// Asserts that two decimals are equal within a tolerance
///
/// # Panics
///
/// Panics if the values differ by more than `tolerance`
pub fn assert_decimal_close(actual: Decimal, expected: Decimal, tolerance: Decimal) {
    let diff = (actual - expected).abs();
    assert!(
        diff <= tolerance,
        "Decimals differ by more than tolerance: actual={}, expected={}, diff={}, tolerance={}",
        actual,
        expected,
        diff,
        tolerance
    );
}

/// Asserts `total_due = total_bill - total_received`
pub fn assert_bill_balanced(bill: &BillRecord) {
    assert_eq!(
        bill.total_due,
        bill.total_bill - bill.total_received,
        "Bill {} due {} does not match total {} minus received {}",
        bill.id,
        bill.total_due,
        bill.total_bill,
        bill.total_received
    );
}

/// Asserts the invoice's derived amounts are consistent
pub fn assert_invoice_balanced(invoice: &Invoice) {
    assert_eq!(
        invoice.total_amount,
        invoice.subtotal + invoice.tax_amount - invoice.discount_amount,
        "Invoice {} total does not match its components",
        invoice.invoice_number
    );
    assert_eq!(
        invoice.balance_due,
        invoice.total_amount - invoice.paid_amount,
        "Invoice {} balance does not match total minus paid",
        invoice.invoice_number
    );
}
