//! Integration tests for the kernel building blocks
//!
//! Tests cover identifier parsing, decimal helpers, the billing calendar,
//! and error conversions.

use chrono::NaiveDate;
use core_kernel::{
    amount_in_words, format_date_range, last_day_of_month, round_money, spread_evenly,
    BillId, CoreError, DateRange, MoneyError, Rate, TemporalError, Timezone,
};
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

mod identifiers {
    use super::*;

    #[test]
    fn test_serializes_as_bare_integer() {
        let json = serde_json::to_string(&BillId::new(120)).unwrap();
        assert_eq!(json, "120");

        let back: BillId = serde_json::from_str("120").unwrap();
        assert_eq!(back.value(), 120);
    }

    #[test]
    fn test_rejects_non_numeric() {
        assert!("BL-abc".parse::<BillId>().is_err());
    }
}

mod money {
    use super::*;

    #[test]
    fn test_spread_then_round_matches_total_for_even_split() {
        let share = spread_evenly(dec!(500), 10).unwrap();
        assert_eq!(round_money(share), dec!(50.00));
    }

    #[test]
    fn test_zero_days_is_rejected() {
        assert_eq!(spread_evenly(dec!(10), 0), Err(MoneyError::DivisionByZero));
    }

    #[test]
    fn test_vat_rate_percentage_round_trip() {
        let vat = Rate::from_percentage(dec!(5));
        assert_eq!(vat.as_decimal(), dec!(0.05));
        assert_eq!(vat.as_percentage(), dec!(5));
        assert_eq!(vat.apply(dec!(333.33)), dec!(16.67));
    }

    #[test]
    fn test_amount_in_words_for_invoice_total() {
        assert_eq!(amount_in_words(dec!(0)), "Zero Taka Only");
        assert_eq!(
            amount_in_words(dec!(250000)),
            "Two Lakh Fifty Thousand Taka Only"
        );
        assert_eq!(amount_in_words(dec!(-50)), "Minus Fifty Taka Only");
    }
}

mod calendar {
    use super::*;

    #[test]
    fn test_rest_of_month_range() {
        let range = DateRange::rest_of_month(date(2025, 2, 20)).unwrap();
        assert_eq!(range.end, date(2025, 2, 28));
        assert_eq!(range.num_days(), 9);
        assert!(range.contains(date(2025, 2, 28)));
        assert!(!range.contains(date(2025, 3, 1)));
    }

    #[test]
    fn test_invalid_range_error() {
        let err = DateRange::new(date(2025, 6, 30), date(2025, 6, 1)).unwrap_err();
        assert!(matches!(err, TemporalError::InvalidRange { .. }));
    }

    #[test]
    fn test_leap_year_end_of_month() {
        assert_eq!(last_day_of_month(date(2028, 2, 1)).unwrap(), date(2028, 2, 29));
    }

    #[test]
    fn test_range_description_formatting() {
        assert_eq!(
            format_date_range(date(2025, 3, 2), date(2025, 3, 23)),
            "2nd March to 23rd March-2025"
        );
    }

    #[test]
    fn test_timezone_parsing_and_serde() {
        let tz = Timezone::parse("Asia/Dhaka").unwrap();
        assert_eq!(tz, Timezone::default());
        assert_eq!(serde_json::to_string(&tz).unwrap(), "\"Asia/Dhaka\"");
        assert!(Timezone::parse("Mars/Olympus").is_err());
    }
}

mod errors {
    use super::*;

    #[test]
    fn test_core_error_conversions() {
        let err: CoreError = MoneyError::DivisionByZero.into();
        assert!(err.to_string().contains("Division by zero"));

        let err: CoreError = TemporalError::OutOfRange.into();
        assert!(matches!(err, CoreError::Temporal(_)));

        let err = CoreError::validation("bad input");
        assert_eq!(err.to_string(), "Validation error: bad input");
    }
}
