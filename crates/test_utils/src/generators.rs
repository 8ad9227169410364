//! Property-Based Test Generators
//!
//! Provides proptest strategies for generating billing inputs that satisfy
//! the domain's validation rules.

use domain_billing::{PeriodInput, ServiceComponent, ServiceLine, ServiceUsage};
use proptest::prelude::*;
use rust_decimal::Decimal;

/// Non-negative quantity with up to two decimal places
pub fn quantity_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Non-negative unit price with up to two decimal places
pub fn price_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..500_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Small non-negative discount
pub fn discount_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..100_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// One quantity/price pair
pub fn service_line_strategy() -> impl Strategy<Value = ServiceLine> {
    (quantity_strategy(), price_strategy()).prop_map(|(quantity, price)| ServiceLine::new(quantity, price))
}

/// Usage for all six services
pub fn service_usage_strategy() -> impl Strategy<Value = ServiceUsage> {
    prop::collection::vec(service_line_strategy(), ServiceComponent::ALL.len()).prop_map(|lines| {
        let mut usage = ServiceUsage::default();
        for (component, line) in ServiceComponent::ALL.into_iter().zip(lines) {
            *usage.get_mut(component) = line;
        }
        usage
    })
}

/// Valid `(start_day, end_day)` pair
pub fn day_range_strategy() -> impl Strategy<Value = (i32, i32)> {
    (1i32..=31).prop_flat_map(|start| (Just(start), start..=31))
}

/// A valid period payload
pub fn period_input_strategy() -> impl Strategy<Value = PeriodInput> {
    (day_range_strategy(), service_usage_strategy(), discount_strategy()).prop_map(
        |((start_day, end_day), usage, discount)| PeriodInput {
            start_day,
            end_day,
            usage,
            discount,
            notes: None,
        },
    )
}

/// Contiguous non-overlapping periods splitting days 1..=30
pub fn period_layout_strategy() -> impl Strategy<Value = Vec<PeriodInput>> {
    (prop::collection::btree_set(2i32..=30, 0..4), prop::collection::vec(service_usage_strategy(), 5)).prop_map(
        |(cuts, usages)| {
            let mut bounds = vec![1];
            bounds.extend(cuts);
            bounds
                .iter()
                .enumerate()
                .map(|(i, &start)| {
                    let end = bounds.get(i + 1).map_or(30, |next| next - 1);
                    PeriodInput {
                        start_day: start,
                        end_day: end,
                        usage: usages[i],
                        discount: Decimal::ZERO,
                        notes: None,
                    }
                })
                .collect()
        },
    )
}
