//! Human-readable document numbers
//!
//! Three identifiers share one shape (prefix, normalised name fragment,
//! numeric component) but differ in scope:
//!
//! - Bill number `KTL-BL-{5 chars}-{bill id}-{DDMMYYYY}`, unique through the id
//! - Customer number `KTL-{8 chars}-{customer id}`, unique through the id
//! - Invoice number `KTL {month} {year}/{sequence}`, sequence scoped to the
//!   month; callers must hold the scope lock while picking the next value

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{BillId, CustomerId};

/// Common prefix of every document number
pub const DOCUMENT_PREFIX: &str = "KTL";

/// Width of the name fragment in bill numbers
pub const BILL_NAME_WIDTH: usize = 5;

/// Width of the name fragment in customer numbers
pub const CUSTOMER_NAME_WIDTH: usize = 8;

/// Keeps ASCII alphanumerics, truncates to `width`, pads with 'X', upper-cases
pub fn name_fragment(name: &str, width: usize) -> String {
    let mut fragment: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(width)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    while fragment.len() < width {
        fragment.push('X');
    }
    fragment
}

/// Builds a bill number; requires the persisted bill id
pub fn bill_number(customer_name: &str, bill_id: BillId, date: NaiveDate) -> String {
    format!(
        "{}-BL-{}-{}-{}",
        DOCUMENT_PREFIX,
        name_fragment(customer_name, BILL_NAME_WIDTH),
        bill_id.value(),
        date.format("%d%m%Y")
    )
}

/// Builds a customer number; requires the persisted customer id
pub fn customer_number(customer_name: &str, customer_id: CustomerId) -> String {
    format!(
        "{}-{}-{}",
        DOCUMENT_PREFIX,
        name_fragment(customer_name, CUSTOMER_NAME_WIDTH),
        customer_id.value()
    )
}

/// The month/year scope an invoice sequence counts within
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InvoiceNumberScope {
    pub month: u32,
    pub year: i32,
}

impl InvoiceNumberScope {
    /// Scope of the month containing `date`
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            month: date.month(),
            year: date.year(),
        }
    }

    /// `KTL {month} {year}/`, month without a leading zero
    pub fn prefix(&self) -> String {
        format!("{} {} {}/", DOCUMENT_PREFIX, self.month, self.year)
    }

    /// Formats the invoice number for a sequence value
    pub fn format(&self, sequence: u32) -> String {
        format!("{}{}", self.prefix(), sequence)
    }

    /// Parses the trailing sequence of a number in this scope
    ///
    /// Returns `None` for numbers outside the scope or with a non-numeric tail.
    pub fn parse_sequence(&self, invoice_number: &str) -> Option<u32> {
        let tail = invoice_number.strip_prefix(&self.prefix())?;
        tail.trim().parse().ok()
    }

    /// Next sequence after the highest parseable one among `existing`
    ///
    /// The maximum is numeric: `/10` ranks above `/9`. Unparseable legacy
    /// numbers are ignored, and a scope without any parseable number starts
    /// at 1, so malformed data never blocks invoice creation.
    pub fn next_sequence<'a, I>(&self, existing: I) -> u32
    where
        I: IntoIterator<Item = &'a str>,
    {
        existing
            .into_iter()
            .filter_map(|n| self.parse_sequence(n))
            .max()
            .map_or(1, |max| max.saturating_add(1))
    }
}

impl fmt::Display for InvoiceNumberScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.prefix())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_name_fragment_normalisation() {
        assert_eq!(name_fragment("a-b c", 5), "ABCXX");
        assert_eq!(name_fragment("Dhaka Online Ltd.", 5), "DHAKA");
        assert_eq!(name_fragment("", 8), "XXXXXXXX");
        assert_eq!(name_fragment("Bãnglá Net", 5), "BNGLN");
    }

    #[test]
    fn test_bill_number_format() {
        let number = bill_number("Sky Net", BillId::new(207), date(2025, 6, 5));
        assert_eq!(number, "KTL-BL-SKYNE-207-05062025");
    }

    #[test]
    fn test_customer_number_format() {
        assert_eq!(customer_number("Zed", CustomerId::new(8)), "KTL-ZEDXXXXX-8");
    }

    #[test]
    fn test_invoice_scope_prefix_has_no_leading_zero() {
        let scope = InvoiceNumberScope::for_date(date(2025, 6, 14));
        assert_eq!(scope.prefix(), "KTL 6 2025/");
        assert_eq!(scope.format(3), "KTL 6 2025/3");
    }

    #[test]
    fn test_next_sequence() {
        let scope = InvoiceNumberScope { month: 6, year: 2025 };
        assert_eq!(scope.next_sequence(Vec::<&str>::new()), 1);
        assert_eq!(scope.next_sequence(["KTL 6 2025/1", "KTL 6 2025/2"]), 3);
        assert_eq!(scope.next_sequence(["KTL 6 2025/9", "KTL 6 2025/10"]), 11);
        // other scopes never count
        assert_eq!(scope.next_sequence(["KTL 7 2025/40", "KTL 6 2024/12"]), 1);
    }

    #[test]
    fn test_unparseable_sequence_falls_back() {
        let scope = InvoiceNumberScope { month: 1, year: 2026 };
        assert_eq!(scope.next_sequence(["KTL 1 2026/legacy-A"]), 1);
        assert_eq!(scope.next_sequence(["KTL 1 2026/legacy-A", "KTL 1 2026/4"]), 5);
        // month 1 must not swallow month 11
        assert_eq!(scope.parse_sequence("KTL 11 2026/3"), None);
    }
}
