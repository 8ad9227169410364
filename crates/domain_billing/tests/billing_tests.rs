//! Service-level tests for domain_billing against the in-memory port

use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{BillId, InvoiceId};
use domain_billing::{
    BillStatus, BillUpdate, BillingError, BillingSettings, DailyAmountInput, InvoiceFormat, InvoiceRequest,
    InvoiceStatus, PaymentDetailInput, PaymentDetailStatus, PeriodInput, ServiceComponent, ServiceUsage,
};
use test_utils::{
    assert_bill_balanced, assert_decimal_close, assert_invoice_balanced, period_layout_strategy,
    service_usage_strategy, discount_strategy, BillBuilder, BillingHarness, CustomerFixtures, DateFixtures,
    PaymentBuilder, PeriodBuilder,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
}

async fn june_bill(harness: &BillingHarness) -> BillId {
    let customer_id = harness.customer().await;
    harness
        .service
        .create_bill(BillBuilder::new(customer_id).build(), &harness.actor)
        .await
        .expect("bill created")
        .id
}

async fn invoice_for_total(harness: &BillingHarness, total: Decimal) -> InvoiceId {
    let customer_id = harness.customer().await;
    let bill = harness
        .service
        .create_bill(
            BillBuilder::new(customer_id)
                .with_line(ServiceComponent::Iig, dec!(1), total)
                .build(),
            &harness.actor,
        )
        .await
        .expect("bill created");
    harness
        .service
        .generate_invoice(
            bill.id,
            InvoiceRequest::new(InvoiceFormat::Its).with_issue_date(DateFixtures::june_issue()),
            &harness.actor,
        )
        .await
        .expect("invoice generated")
        .id
}

// ============================================================================
// Customer Tests
// ============================================================================

mod customer_tests {
    use super::*;

    #[tokio::test]
    async fn test_create_customer_assigns_number() {
        let harness = BillingHarness::new();
        let customer = harness
            .service
            .create_customer(CustomerFixtures::bandwidth(), &harness.actor)
            .await
            .unwrap();

        let number = customer.customer_number.clone().expect("number assigned");
        assert!(number.ends_with(&customer.id.to_string()));
        assert_eq!(harness.service.get_customer(customer.id).await.unwrap(), customer);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let harness = BillingHarness::new();
        harness
            .service
            .create_customer(CustomerFixtures::bandwidth(), &harness.actor)
            .await
            .unwrap();

        let mut duplicate = CustomerFixtures::channel_partner();
        duplicate.email = Some("  NOC@SkyNet.example ".to_string());
        let err = harness
            .service
            .create_customer(duplicate, &harness.actor)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::DuplicateCustomerEmail(_)));
        assert!(err.is_conflict());
        assert_eq!(harness.port.snapshot().await.customers.len(), 1);
    }

    #[tokio::test]
    async fn test_customers_without_email_never_collide() {
        let harness = BillingHarness::new();
        harness.service.create_customer(CustomerFixtures::soho(), &harness.actor).await.unwrap();
        harness.service.create_customer(CustomerFixtures::soho(), &harness.actor).await.unwrap();

        assert_eq!(harness.port.snapshot().await.customers.len(), 2);
    }
}

// ============================================================================
// Bill Total Tests
// ============================================================================

mod bill_total_tests {
    use super::*;

    #[tokio::test]
    async fn test_bill_requires_existing_customer() {
        let harness = BillingHarness::new();
        let err = harness
            .service
            .create_bill(BillBuilder::new(core_kernel::CustomerId::new(404)).build(), &harness.actor)
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(harness.port.snapshot().await.bills.is_empty());
    }

    #[tokio::test]
    async fn test_bill_number_assigned_on_create() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        let bill = harness.service.get_bill(bill_id).await.unwrap().bill;

        let number = bill.bill_number.clone().expect("bill number assigned");
        assert!(number.starts_with("KTL-BL-"));
        assert!(number.ends_with(&format!("-{}-01062025", bill.id)));
        assert!(bill.is_complete());
    }

    #[tokio::test]
    async fn test_bill_without_dates_is_rejected() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let err = harness
            .service
            .create_bill(BillBuilder::new(customer_id).with_billing_date(None).build(), &harness.actor)
            .await
            .unwrap_err();

        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_update_recomputes_flat_total() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;

        let update = BillUpdate {
            usage: Some(ServiceUsage::default().with_line(ServiceComponent::Ggc, dec!(20), dec!(50))),
            discount: Some(dec!(100)),
            total_received: Some(dec!(300)),
            ..Default::default()
        };
        let bill = harness.service.update_bill(bill_id, update, &harness.actor).await.unwrap();

        assert_eq!(bill.total_bill, dec!(900));
        assert_eq!(bill.total_due, dec!(600));
        assert_bill_balanced(&bill);
    }

    #[tokio::test]
    async fn test_periods_override_flat_fields() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .with_line(ServiceComponent::Iig, dec!(10), dec!(100))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();
        assert_eq!(bill.total_bill, dec!(1000));

        let result = harness
            .service
            .add_period(
                bill.id,
                PeriodBuilder::days(1, 15)
                    .with_line(ServiceComponent::Iig, dec!(5), dec!(80))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        assert_eq!(result.periods.len(), 1);
        assert_eq!(result.bill.total_bill, dec!(400));
    }

    #[tokio::test]
    async fn test_invalid_period_leaves_bill_untouched() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .with_line(ServiceComponent::Iig, dec!(10), dec!(100))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let err = harness
            .service
            .add_period(bill.id, PeriodBuilder::days(20, 10).build(), &harness.actor)
            .await
            .unwrap_err();

        assert!(err.is_validation());
        let stored = harness.service.get_bill(bill.id).await.unwrap();
        assert!(stored.periods.is_empty());
        assert_eq!(stored.bill.total_bill, dec!(1000));
        assert_eq!(stored.bill.updated_at, bill.updated_at);
    }

    #[tokio::test]
    async fn test_delete_period_recomputes_total() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;

        harness
            .service
            .add_period(
                bill_id,
                PeriodBuilder::days(1, 15).with_line(ServiceComponent::Iig, dec!(6), dec!(100)).build(),
                &harness.actor,
            )
            .await
            .unwrap();
        let both = harness
            .service
            .add_period(
                bill_id,
                PeriodBuilder::days(16, 30).with_line(ServiceComponent::Iig, dec!(4), dec!(100)).build(),
                &harness.actor,
            )
            .await
            .unwrap();
        assert_eq!(both.bill.total_bill, dec!(1000));

        let first = both.periods.iter().find(|p| p.start_day == 1).unwrap().id;
        let remaining = harness.service.delete_period(bill_id, first, &harness.actor).await.unwrap();

        assert_eq!(remaining.periods.len(), 1);
        assert_eq!(remaining.bill.total_bill, dec!(400));
        assert_eq!(harness.service.get_bill(bill_id).await.unwrap().bill.total_bill, dec!(400));
    }

    #[tokio::test]
    async fn test_update_period_recomputes_total() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        let added = harness
            .service
            .add_period(
                bill_id,
                PeriodBuilder::days(1, 30).with_line(ServiceComponent::Cdn, dec!(10), dec!(10)).build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let period_id = added.periods[0].id;
        let updated = harness
            .service
            .update_period(
                bill_id,
                period_id,
                PeriodBuilder::days(1, 30)
                    .with_line(ServiceComponent::Cdn, dec!(10), dec!(30))
                    .with_discount(dec!(20))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        assert_eq!(updated.bill.total_bill, dec!(280));
    }

    #[tokio::test]
    async fn test_period_of_other_bill_is_not_found() {
        let harness = BillingHarness::new();
        let first = june_bill(&harness).await;
        let second = june_bill(&harness).await;
        let added = harness
            .service
            .add_period(first, PeriodBuilder::days(1, 10).build(), &harness.actor)
            .await
            .unwrap();

        let err = harness
            .service
            .delete_period(second, added.periods[0].id, &harness.actor)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_set_bill_status() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;

        let bill = harness
            .service
            .set_bill_status(bill_id, BillStatus::Inactive, &harness.actor)
            .await
            .unwrap();
        assert_eq!(bill.status, BillStatus::Inactive);
        assert_eq!(bill.updated_by.as_deref(), Some("billing.officer"));
    }
}

// ============================================================================
// Finalize and Delete Tests
// ============================================================================

mod finalize_tests {
    use super::*;

    #[tokio::test]
    async fn test_finalize_summarises_periods() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        for (start, end, qty) in [(16, 30, dec!(4)), (1, 15, dec!(6))] {
            harness
                .service
                .add_period(
                    bill_id,
                    PeriodBuilder::days(start, end).with_line(ServiceComponent::Iig, qty, dec!(100)).build(),
                    &harness.actor,
                )
                .await
                .unwrap();
        }

        let outcome = harness.service.finalize_bill(bill_id, &harness.actor).await.unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.summary.period_count, 2);
        assert_eq!(outcome.summary.periods[0].start_day, 1);
        assert_eq!(outcome.summary.periods[0].period_total, dec!(600));
        assert_eq!(outcome.summary.total_bill, dec!(1000));
        assert_eq!(outcome.summary.total_due, dec!(1000));
    }

    #[tokio::test]
    async fn test_finalize_without_periods_fails() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;

        let err = harness.service.finalize_bill(bill_id, &harness.actor).await.unwrap_err();
        assert!(err.is_validation());
    }

    #[tokio::test]
    async fn test_delete_bill_cascades() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        harness
            .service
            .add_period(bill_id, PeriodBuilder::days(1, 30).build(), &harness.actor)
            .await
            .unwrap();
        harness
            .service
            .calculate_daily_amounts(bill_id, false, &harness.actor)
            .await
            .unwrap();

        harness.service.delete_bill(bill_id, &harness.actor).await.unwrap();

        let state = harness.port.snapshot().await;
        assert!(state.bills.is_empty());
        assert!(state.periods.is_empty());
        assert!(state.daily_amounts.is_empty());
    }

    #[tokio::test]
    async fn test_delete_invoiced_bill_is_conflict() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(500)).await;
        let bill_id = harness.service.get_invoice(invoice_id).await.unwrap().bill_id;

        let err = harness.service.delete_bill(bill_id, &harness.actor).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(harness.service.get_bill(bill_id).await.is_ok());
    }
}

// ============================================================================
// Daily Amount Tests
// ============================================================================

mod daily_tests {
    use super::*;

    #[tokio::test]
    async fn test_prorated_days_sum_to_period_total() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .active_between(DateFixtures::june_start(), Some(DateFixtures::ymd(2025, 6, 10)))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();
        let added = harness
            .service
            .add_period(
                bill.id,
                PeriodBuilder::days(1, 10).with_line(ServiceComponent::Iig, dec!(100), dec!(5)).build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let report = harness
            .service
            .calculate_daily_amounts(bill.id, false, &harness.actor)
            .await
            .unwrap();
        assert_eq!(report.created_count, 10);
        assert!(!report.has_errors());

        let rows = harness.service.list_daily_amounts(bill.id).await.unwrap();
        assert_eq!(rows.len(), 10);
        for row in &rows {
            assert_eq!(row.daily_amount, Some(dec!(50)));
            assert_eq!(row.pricing_period_id, Some(added.periods[0].id));
            let iig = &row.service_breakdown[&ServiceComponent::Iig];
            assert_eq!(iig.usage, dec!(10));
            assert_eq!(iig.amount, dec!(50));
        }
        let sum: Decimal = rows.iter().filter_map(|r| r.daily_amount).sum();
        assert_decimal_close(sum, added.periods[0].period_total(), dec!(0.10));
    }

    #[tokio::test]
    async fn test_uncovered_days_are_reported_not_fatal() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        harness
            .service
            .add_period(
                bill_id,
                PeriodBuilder::days(1, 10).with_line(ServiceComponent::Iig, dec!(10), dec!(3)).build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let report = harness
            .service
            .calculate_daily_amounts(bill_id, false, &harness.actor)
            .await
            .unwrap();

        assert_eq!(report.created_count, 10);
        assert_eq!(report.errors.len(), 20);
        assert_eq!(report.errors[0].date, DateFixtures::ymd(2025, 6, 11));
    }

    #[tokio::test]
    async fn test_existing_days_skipped_unless_recalculating() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .with_line(ServiceComponent::Bdix, dec!(2), dec!(10))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let first = harness
            .service
            .calculate_daily_amounts(bill.id, false, &harness.actor)
            .await
            .unwrap();
        assert_eq!(first.created_count, 30);

        let second = harness
            .service
            .calculate_daily_amounts(bill.id, false, &harness.actor)
            .await
            .unwrap();
        assert_eq!(second.created_count, 0);
        assert_eq!(second.updated_count, 0);

        let third = harness
            .service
            .calculate_daily_amounts(bill.id, true, &harness.actor)
            .await
            .unwrap();
        assert_eq!(third.updated_count, 30);
        assert_eq!(harness.port.snapshot().await.daily_amounts.len(), 30);
    }

    #[tokio::test]
    async fn test_flat_day_uses_bill_fields() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .with_line(ServiceComponent::Fna, dec!(3), dec!(7))
                    .with_discount(dec!(5))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let row = harness
            .service
            .save_daily_amount(bill.id, DailyAmountInput::calculated(DateFixtures::june_issue()), &harness.actor)
            .await
            .unwrap();

        assert_eq!(row.pricing_period_id, None);
        assert_eq!(row.daily_amount, Some(dec!(21)));
    }

    #[tokio::test]
    async fn test_manual_amount_is_kept() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;

        let input = DailyAmountInput {
            daily_amount: Some(dec!(42.50)),
            is_calculated: false,
            notes: Some("adjusted after outage".to_string()),
            ..DailyAmountInput::calculated(DateFixtures::june_issue())
        };
        let row = harness.service.save_daily_amount(bill_id, input, &harness.actor).await.unwrap();
        assert_eq!(row.daily_amount, Some(dec!(42.50)));

        let updated = harness
            .service
            .save_daily_amount(bill_id, DailyAmountInput::calculated(DateFixtures::june_issue()), &harness.actor)
            .await
            .unwrap();
        assert_eq!(updated.id, row.id);
        assert_eq!(updated.daily_amount, Some(Decimal::ZERO));
    }
}

// ============================================================================
// Invoice Tests
// ============================================================================

mod invoice_tests {
    use super::*;

    #[tokio::test]
    async fn test_sequence_counts_per_month_across_bills() {
        let harness = BillingHarness::new();
        let first = invoice_for_total(&harness, dec!(100)).await;
        let second = invoice_for_total(&harness, dec!(200)).await;

        let first = harness.service.get_invoice(first).await.unwrap();
        let second = harness.service.get_invoice(second).await.unwrap();
        assert_eq!(first.invoice_number, "KTL 6 2025/1");
        assert_eq!(second.invoice_number, "KTL 6 2025/2");
        assert_ne!(first.bill_id, second.bill_id);
    }

    #[tokio::test]
    async fn test_second_invoice_for_bill_is_conflict() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(100)).await;
        let bill_id = harness.service.get_invoice(invoice_id).await.unwrap().bill_id;

        let err = harness
            .service
            .generate_invoice(bill_id, InvoiceRequest::new(InvoiceFormat::Int), &harness.actor)
            .await
            .unwrap_err();

        assert!(matches!(err, BillingError::InvoiceAlreadyExists { .. }));
        assert_eq!(harness.port.snapshot().await.invoices.len(), 1);
    }

    #[tokio::test]
    async fn test_collision_is_retried_with_fresh_sequence() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        harness.port.inject_invoice_number_collisions(2);

        let invoice = harness
            .service
            .generate_invoice(
                bill_id,
                InvoiceRequest::new(InvoiceFormat::Its).with_issue_date(DateFixtures::june_issue()),
                &harness.actor,
            )
            .await
            .unwrap();

        assert_eq!(invoice.invoice_number, "KTL 6 2025/1");
        assert_eq!(harness.port.snapshot().await.invoices.len(), 1);
    }

    #[tokio::test]
    async fn test_collisions_exhaust_attempts() {
        let harness = BillingHarness::with_settings(BillingSettings {
            invoice_number_attempts: 2,
            ..Default::default()
        });
        let bill_id = june_bill(&harness).await;
        harness.port.inject_invoice_number_collisions(5);

        let err = harness
            .service
            .generate_invoice(
                bill_id,
                InvoiceRequest::new(InvoiceFormat::Its).with_issue_date(DateFixtures::june_issue()),
                &harness.actor,
            )
            .await
            .unwrap_err();

        match err {
            BillingError::InvoiceNumberExhausted { prefix, attempts } => {
                assert_eq!(prefix, "KTL 6 2025/");
                assert_eq!(attempts, 2);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(harness.port.snapshot().await.invoices.is_empty());
    }

    #[tokio::test]
    async fn test_int_invoice_adds_vat() {
        let harness = BillingHarness::new();
        let customer_id = harness.customer().await;
        let bill = harness
            .service
            .create_bill(
                BillBuilder::new(customer_id)
                    .with_line(ServiceComponent::Iig, dec!(10), dec!(100))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        let invoice = harness
            .service
            .generate_invoice(
                bill.id,
                InvoiceRequest::new(InvoiceFormat::Int).with_issue_date(DateFixtures::june_issue()),
                &harness.actor,
            )
            .await
            .unwrap();

        assert_eq!(invoice.tax_amount, dec!(50));
        assert_eq!(invoice.total_amount, dec!(1050));
        assert_eq!(invoice.items[0].unit, "Mbps/Month");
        assert_invoice_balanced(&invoice);
    }

    #[tokio::test]
    async fn test_status_transitions() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(300)).await;

        let issued = harness.service.mark_invoice_issued(invoice_id, &harness.actor).await.unwrap();
        assert_eq!(issued.status, InvoiceStatus::Issued);
        assert!(issued.issued_at.is_some());

        let paid = harness
            .service
            .mark_invoice_paid(invoice_id, None, &harness.actor)
            .await
            .unwrap();
        assert_eq!(paid.status, InvoiceStatus::Paid);
        assert_eq!(paid.balance_due, Decimal::ZERO);

        let err = harness.service.cancel_invoice(invoice_id, &harness.actor).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_invoice_for_bill_lookup() {
        let harness = BillingHarness::new();
        let bill_id = june_bill(&harness).await;
        assert!(harness.service.get_invoice_for_bill(bill_id).await.unwrap().is_none());

        let invoice = harness
            .service
            .generate_invoice(bill_id, InvoiceRequest::new(InvoiceFormat::Its).without_items(), &harness.actor)
            .await
            .unwrap();
        let found = harness.service.get_invoice_for_bill(bill_id).await.unwrap();
        assert_eq!(found.map(|i| i.id), Some(invoice.id));
    }
}

// ============================================================================
// Payment Tests
// ============================================================================

mod payment_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_payment_marks_paid() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(1000)).await;

        let receipt = harness
            .service
            .record_payment(
                PaymentBuilder::for_invoice(invoice_id)
                    .with_detail(dec!(700))
                    .with_detail(dec!(300))
                    .build(),
                &harness.actor,
            )
            .await
            .unwrap();

        assert_eq!(receipt.details.len(), 2);
        assert_eq!(receipt.reconciliation.status, InvoiceStatus::Paid);
        assert_eq!(receipt.reconciliation.balance_due, Decimal::ZERO);
        assert_eq!(receipt.reconciliation.previous_status, InvoiceStatus::Draft);
    }

    #[tokio::test]
    async fn test_partial_then_remaining_payment() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(1000)).await;

        let receipt = harness
            .service
            .record_payment(PaymentBuilder::for_invoice(invoice_id).with_detail(dec!(400)).build(), &harness.actor)
            .await
            .unwrap();
        assert_eq!(receipt.reconciliation.status, InvoiceStatus::PartiallyPaid);
        assert_eq!(receipt.reconciliation.balance_due, dec!(600));

        let invoice = harness.service.get_invoice(invoice_id).await.unwrap();
        assert_eq!(invoice.status.as_str(), "partial");
        assert_eq!(invoice.paid_amount, dec!(400));

        let detail = harness
            .service
            .add_payment_detail(receipt.payment.id, PaymentDetailInput::new(dec!(600)), &harness.actor)
            .await
            .unwrap();
        assert_eq!(detail.reconciliation.status, InvoiceStatus::Paid);
        assert_eq!(detail.reconciliation.total_paid, dec!(1000));
    }

    #[tokio::test]
    async fn test_updating_detail_reprojects_invoice() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(1000)).await;
        let receipt = harness
            .service
            .record_payment(PaymentBuilder::for_invoice(invoice_id).with_detail(dec!(1000)).build(), &harness.actor)
            .await
            .unwrap();

        let corrected = PaymentDetailInput {
            status: PaymentDetailStatus::Completed,
            ..PaymentDetailInput::new(dec!(250))
        };
        let updated = harness
            .service
            .update_payment_detail(receipt.details[0].id, corrected, &harness.actor)
            .await
            .unwrap();

        assert_eq!(updated.detail.pay_amount, dec!(250));
        assert_eq!(updated.reconciliation.balance_due, dec!(750));
        assert_eq!(updated.reconciliation.previous_status, InvoiceStatus::Paid);
        assert_eq!(updated.reconciliation.status, InvoiceStatus::PartiallyPaid);

        let invoice = harness.service.get_invoice(invoice_id).await.unwrap();
        assert!(invoice.paid_at.is_none());
    }

    #[tokio::test]
    async fn test_get_payment_lists_every_detail() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(1000)).await;
        let receipt = harness
            .service
            .record_payment(PaymentBuilder::for_invoice(invoice_id).with_detail(dec!(300)).build(), &harness.actor)
            .await
            .unwrap();
        harness
            .service
            .add_payment_detail(receipt.payment.id, PaymentDetailInput::new(dec!(200)), &harness.actor)
            .await
            .unwrap();

        let record = harness.service.get_payment(receipt.payment.id).await.unwrap();
        assert_eq!(record.payment.invoice_id, invoice_id);
        let amounts: Vec<Decimal> = record.details.iter().map(|d| d.pay_amount).collect();
        assert_eq!(amounts, vec![dec!(300), dec!(200)]);

        let missing = harness.service.get_payment(core_kernel::PaymentMasterId::new(999)).await;
        assert!(missing.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_payment_for_missing_invoice_writes_nothing() {
        let harness = BillingHarness::new();
        let err = harness
            .service
            .record_payment(
                PaymentBuilder::for_invoice(InvoiceId::new(999)).with_detail(dec!(10)).build(),
                &harness.actor,
            )
            .await
            .unwrap_err();

        assert!(err.is_not_found());
        let state = harness.port.snapshot().await;
        assert!(state.payment_masters.is_empty());
        assert!(state.payment_details.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_detail_rejected() {
        let harness = BillingHarness::new();
        let invoice_id = invoice_for_total(&harness, dec!(1000)).await;

        let err = harness
            .service
            .record_payment(PaymentBuilder::for_invoice(invoice_id).with_detail(Decimal::ZERO).build(), &harness.actor)
            .await
            .unwrap_err();
        assert!(err.is_validation());
    }
}

// ============================================================================
// End-to-End Scenario
// ============================================================================

#[tokio::test]
async fn test_bill_to_paid_invoice() {
    let harness = BillingHarness::new();
    let customer_id = harness.customer().await;

    let bill = harness
        .service
        .create_bill(
            BillBuilder::new(customer_id)
                .with_line(ServiceComponent::Iig, dec!(10), dec!(100))
                .with_discount(dec!(50))
                .build(),
            &harness.actor,
        )
        .await
        .unwrap();
    assert_eq!(bill.total_bill, dec!(950));
    assert_eq!(bill.total_due, dec!(950));

    let invoice = harness
        .service
        .generate_invoice(
            bill.id,
            InvoiceRequest::new(InvoiceFormat::Its).with_issue_date(DateFixtures::june_issue()),
            &harness.actor,
        )
        .await
        .unwrap();
    assert_eq!(invoice.items.len(), 1);
    let item = &invoice.items[0];
    assert_eq!(item.service_type, Some(ServiceComponent::Iig));
    assert_eq!(item.quantity, dec!(10));
    assert_eq!(item.unit_price, dec!(100));
    assert_eq!(item.line_total, dec!(1000));
    assert_eq!(item.description, "IIG Bandwidth charge for 1st June to 30th June-2025");
    assert_eq!(invoice.subtotal, dec!(1000));
    assert_eq!(invoice.discount_amount, dec!(50));
    assert_eq!(invoice.total_amount, dec!(950));
    assert_invoice_balanced(&invoice);

    let receipt = harness
        .service
        .record_payment(PaymentBuilder::for_invoice(invoice.id).with_detail(dec!(950)).build(), &harness.actor)
        .await
        .unwrap();
    assert_eq!(receipt.reconciliation.status, InvoiceStatus::Paid);
    assert_eq!(receipt.reconciliation.balance_due, Decimal::ZERO);
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_flat_total_matches_lines(usage in service_usage_strategy(), discount in discount_strategy()) {
        let bill = runtime().block_on(async {
            let harness = BillingHarness::new();
            let customer_id = harness.customer().await;
            harness
                .service
                .create_bill(
                    BillBuilder::new(customer_id).with_usage(usage).with_discount(discount).build(),
                    &harness.actor,
                )
                .await
                .unwrap()
        });

        let expected: Decimal = usage.iter().map(|(_, line)| line.quantity * line.price).sum::<Decimal>() - discount;
        prop_assert_eq!(bill.total_bill, expected);
        prop_assert_eq!(bill.total_due, bill.total_bill - bill.total_received);
    }

    #[test]
    fn prop_period_order_does_not_matter(layout in period_layout_strategy()) {
        let (forward, backward, expected) = runtime().block_on(async {
            let harness = BillingHarness::new();
            let a = june_bill(&harness).await;
            let b = june_bill(&harness).await;
            for period in &layout {
                harness.service.add_period(a, period.clone(), &harness.actor).await.unwrap();
            }
            for period in layout.iter().rev() {
                harness.service.add_period(b, period.clone(), &harness.actor).await.unwrap();
            }
            let a = harness.service.get_bill(a).await.unwrap();
            let b = harness.service.get_bill(b).await.unwrap();
            let expected: Decimal = a.periods.iter().map(|p| p.period_total()).sum();
            (a.bill.total_bill, b.bill.total_bill, expected)
        });

        prop_assert_eq!(forward, expected);
        prop_assert_eq!(backward, expected);
    }

    #[test]
    fn prop_finalize_is_idempotent(layout in period_layout_strategy()) {
        let (first, second) = runtime().block_on(async {
            let harness = BillingHarness::new();
            let bill_id = june_bill(&harness).await;
            for period in layout {
                harness.service.add_period(bill_id, period, &harness.actor).await.unwrap();
            }
            let first = harness.service.finalize_bill(bill_id, &harness.actor).await.unwrap();
            let second = harness.service.finalize_bill(bill_id, &harness.actor).await.unwrap();
            (first.summary.total_bill, second.summary.total_bill)
        });

        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_inverted_period_rejected(start in 2i32..=31, gap in 1i32..=30) {
        let end = (start - gap).max(1);
        prop_assume!(end < start);
        let input = PeriodInput { start_day: start, end_day: end, ..Default::default() };
        prop_assert!(input.validate().is_err());
    }
}
