//! Spelling out amounts for printed invoices
//!
//! Invoices carry the total in words using the South-Asian grouping
//! (crore, lakh, thousand, hundred), e.g. `1,25,000.50` becomes
//! "One Lakh Twenty Five Thousand Taka And Fifty Paisa Only".

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::money::round_money;

const ONES: [&str; 20] = [
    "Zero", "One", "Two", "Three", "Four", "Five", "Six", "Seven", "Eight", "Nine", "Ten",
    "Eleven", "Twelve", "Thirteen", "Fourteen", "Fifteen", "Sixteen", "Seventeen", "Eighteen",
    "Nineteen",
];

const TENS: [&str; 10] = [
    "", "", "Twenty", "Thirty", "Forty", "Fifty", "Sixty", "Seventy", "Eighty", "Ninety",
];

fn below_hundred(n: u128) -> String {
    if n < 20 {
        ONES[n as usize].to_string()
    } else if n % 10 == 0 {
        TENS[(n / 10) as usize].to_string()
    } else {
        format!("{} {}", TENS[(n / 10) as usize], ONES[(n % 10) as usize])
    }
}

fn below_thousand(n: u128) -> String {
    let hundreds = n / 100;
    let rest = n % 100;
    match (hundreds, rest) {
        (0, r) => below_hundred(r),
        (h, 0) => format!("{} Hundred", ONES[h as usize]),
        (h, r) => format!("{} Hundred {}", ONES[h as usize], below_hundred(r)),
    }
}

/// Spells a whole number using crore/lakh grouping
pub fn number_in_words(n: u128) -> String {
    if n == 0 {
        return ONES[0].to_string();
    }

    let mut parts = Vec::new();
    let crore = n / 10_000_000;
    let mut rest = n % 10_000_000;

    if crore > 0 {
        // Amounts past 99 crore recurse so the grouping stays readable
        parts.push(format!("{} Crore", number_in_words(crore)));
    }
    let lakh = rest / 100_000;
    rest %= 100_000;
    if lakh > 0 {
        parts.push(format!("{} Lakh", below_hundred(lakh)));
    }
    let thousand = rest / 1_000;
    rest %= 1_000;
    if thousand > 0 {
        parts.push(format!("{} Thousand", below_hundred(thousand)));
    }
    if rest > 0 {
        parts.push(below_thousand(rest));
    }

    parts.join(" ")
}

/// Spells a Taka amount for the invoice footer
///
/// Negative amounts are prefixed with "Minus"; paisa are appended only when
/// present after rounding to two places.
pub fn amount_in_words(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let abs = rounded.abs();

    // Every non-negative integral Decimal fits in a u128
    let taka = abs.trunc().to_u128().unwrap_or(u128::MAX);
    let paisa = ((abs - abs.trunc()) * Decimal::ONE_HUNDRED)
        .round()
        .to_u128()
        .unwrap_or(0);

    let mut words = number_in_words(taka);
    words.push_str(" Taka");
    if paisa > 0 {
        words.push_str(&format!(" And {} Paisa", below_hundred(paisa)));
    }
    words.push_str(" Only");

    if negative {
        format!("Minus {}", words)
    } else {
        words
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_small_numbers() {
        assert_eq!(number_in_words(0), "Zero");
        assert_eq!(number_in_words(15), "Fifteen");
        assert_eq!(number_in_words(40), "Forty");
        assert_eq!(number_in_words(950), "Nine Hundred Fifty");
    }

    #[test]
    fn test_lakh_and_crore_grouping() {
        assert_eq!(number_in_words(125_000), "One Lakh Twenty Five Thousand");
        assert_eq!(
            number_in_words(30_500_017),
            "Three Crore Five Lakh Seventeen"
        );
    }

    #[test]
    fn test_amounts_beyond_u64() {
        assert_eq!(
            number_in_words(20_000_000_000_000_000_000),
            "Two Lakh Crore Crore"
        );
        let words = amount_in_words(Decimal::MAX);
        assert!(words.starts_with("Seven"));
        assert!(words.ends_with("Taka Only"));
        assert!(!words.contains("Zero"));
    }

    #[test]
    fn test_amount_with_paisa() {
        assert_eq!(amount_in_words(dec!(950)), "Nine Hundred Fifty Taka Only");
        assert_eq!(
            amount_in_words(dec!(1050.5)),
            "One Thousand Fifty Taka And Fifty Paisa Only"
        );
    }
}
