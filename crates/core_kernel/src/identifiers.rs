//! Strongly-typed identifiers for domain entities
//!
//! Every persisted entity is keyed by a database-assigned integer. Wrapping
//! those integers in newtypes prevents a bill id from being passed where an
//! invoice id is expected, and the bill number generator relies on the raw
//! value being available once the row exists.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

macro_rules! define_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            /// Wraps a database-assigned key
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            /// Returns the underlying integer key
            pub const fn value(&self) -> i64 {
                self.0
            }

            /// Returns the identifier prefix used in log output
            pub fn prefix() -> &'static str {
                $prefix
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                // Accept both "42" and "BL-42"
                let raw = s.strip_prefix(concat!($prefix, "-")).unwrap_or(s);
                raw.trim()
                    .parse()
                    .map(Self)
                    .map_err(|_| CoreError::invalid_identifier($prefix, s))
            }
        }

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> i64 {
                id.0
            }
        }
    };
}

// CRM references
define_id!(CustomerId, "CUS");
define_id!(EntitlementId, "ENT");

// Billing identifiers
define_id!(BillId, "BL");
define_id!(PricingPeriodId, "PP");
define_id!(DailyBillAmountId, "DBA");

// Invoicing identifiers
define_id!(InvoiceId, "INV");
define_id!(InvoiceItemId, "INVI");

// Payment identifiers
define_id!(PaymentMasterId, "PAY");
define_id!(PaymentDetailId, "PAYD");
