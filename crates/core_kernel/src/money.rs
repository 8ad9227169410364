//! Monetary arithmetic helpers
//!
//! Billing amounts are plain `rust_decimal::Decimal` values in Bangladeshi
//! Taka. This module centralises the rounding rule used whenever an amount is
//! written to storage, the guarded even-spread used for pro-rating, and the
//! percentage [`Rate`] type used for VAT.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Decimal places kept on stored monetary amounts
pub const MONEY_DP: u32 = 2;

/// Decimal places kept on displayed usage figures
pub const USAGE_DP: u32 = 4;

/// Errors that can occur during money operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Overflow during calculation")]
    Overflow,
}

/// Rounds an amount to two decimal places, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Rounds a usage figure for display
pub fn round_usage(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(USAGE_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Divides `amount` evenly across `parts`
///
/// The result is not rounded; callers round once at the point of storage so
/// that per-part values still sum back to the original within tolerance.
///
/// # Errors
///
/// Returns `MoneyError::DivisionByZero` when `parts` is zero or negative.
pub fn spread_evenly(amount: Decimal, parts: i64) -> Result<Decimal, MoneyError> {
    if parts <= 0 {
        return Err(MoneyError::DivisionByZero);
    }
    amount
        .checked_div(Decimal::from(parts))
        .ok_or(MoneyError::Overflow)
}

/// Multiplies two decimals, reporting overflow instead of panicking
pub fn checked_product(a: Decimal, b: Decimal) -> Result<Decimal, MoneyError> {
    a.checked_mul(b).ok_or(MoneyError::Overflow)
}

/// Represents a percentage rate (e.g. VAT)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rate {
    /// The rate as a decimal (e.g., 0.05 for 5%)
    value: Decimal,
}

impl Rate {
    /// Creates a rate from a decimal value (e.g., 0.05 for 5%)
    pub fn new(value: Decimal) -> Self {
        Self { value }
    }

    /// Creates a rate from a percentage (e.g., 5 for 5%)
    pub fn from_percentage(percentage: Decimal) -> Self {
        Self {
            value: percentage / dec!(100),
        }
    }

    /// Returns the rate as a decimal
    pub fn as_decimal(&self) -> Decimal {
        self.value
    }

    /// Returns the rate as a percentage
    pub fn as_percentage(&self) -> Decimal {
        self.value * dec!(100)
    }

    /// Applies this rate to an amount, rounded for storage
    pub fn apply(&self, amount: Decimal) -> Decimal {
        round_money(amount * self.value)
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.as_percentage().normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_money_midpoint() {
        assert_eq!(round_money(dec!(10.005)), dec!(10.01));
        assert_eq!(round_money(dec!(-10.005)), dec!(-10.01));
        assert_eq!(round_money(dec!(33.3333)), dec!(33.33));
    }

    #[test]
    fn test_spread_evenly() {
        assert_eq!(spread_evenly(dec!(100), 10).unwrap(), dec!(10));
        assert_eq!(spread_evenly(dec!(100), 0), Err(MoneyError::DivisionByZero));
        assert_eq!(spread_evenly(dec!(100), -3), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_rate_application() {
        let vat = Rate::from_percentage(dec!(5));
        assert_eq!(vat.apply(dec!(1000)), dec!(50.00));
        assert_eq!(vat.to_string(), "5%");
    }
}
