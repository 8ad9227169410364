//! Tunables the billing service runs with

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use core_kernel::{Rate, Timezone};

use crate::error::BillingError;

/// Typed billing settings, projected from the application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BillingSettings {
    /// Zone in which "today" is evaluated for invoice issue dates
    pub timezone: Timezone,
    /// VAT applied to auto-populated INT invoices
    pub vat_percent: Decimal,
    /// Days between issue date and default due date
    pub payment_terms_days: i64,
    /// Attempts at inserting an invoice before a number collision is fatal
    pub invoice_number_attempts: u32,
}

impl Default for BillingSettings {
    fn default() -> Self {
        Self {
            timezone: Timezone::default(),
            vat_percent: dec!(5),
            payment_terms_days: 30,
            invoice_number_attempts: 3,
        }
    }
}

impl BillingSettings {
    pub fn vat_rate(&self) -> Rate {
        Rate::from_percentage(self.vat_percent)
    }

    /// Rejects settings the service cannot run with
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.vat_percent < Decimal::ZERO || self.vat_percent > Decimal::ONE_HUNDRED {
            return Err(BillingError::validation("vat_percent must be between 0 and 100"));
        }
        if self.payment_terms_days < 0 {
            return Err(BillingError::validation("payment_terms_days must not be negative"));
        }
        if self.invoice_number_attempts == 0 {
            return Err(BillingError::validation("invoice_number_attempts must be at least 1"));
        }
        Ok(())
    }
}
