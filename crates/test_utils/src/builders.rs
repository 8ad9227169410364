//! Test Data Builders
//!
//! Provides builder patterns for constructing billing payloads with sensible
//! defaults. Tests specify only the fields that matter to them.

use chrono::NaiveDate;
use core_kernel::{CustomerId, EntitlementId, InvoiceId};
use domain_billing::{
    NewBill, NewPayment, PaymentDetailInput, PeriodInput, ServiceComponent, ServiceUsage,
};
use rust_decimal::Decimal;

use crate::fixtures::DateFixtures;

/// Builder for bill payloads
pub struct BillBuilder {
    bill: NewBill,
}

impl BillBuilder {
    /// Creates a June 2025 bill for `customer_id` with no usage
    pub fn new(customer_id: CustomerId) -> Self {
        Self {
            bill: NewBill {
                customer_id,
                billing_date: Some(DateFixtures::june_start()),
                ..Default::default()
            },
        }
    }

    /// Sets one service's quantity and price
    pub fn with_line(mut self, component: ServiceComponent, quantity: Decimal, price: Decimal) -> Self {
        self.bill.usage = self.bill.usage.with_line(component, quantity, price);
        self
    }

    /// Replaces all service lines
    pub fn with_usage(mut self, usage: ServiceUsage) -> Self {
        self.bill.usage = usage;
        self
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.bill.discount = discount;
        self
    }

    pub fn with_received(mut self, received: Decimal) -> Self {
        self.bill.total_received = received;
        self
    }

    pub fn with_billing_date(mut self, date: Option<NaiveDate>) -> Self {
        self.bill.billing_date = date;
        self
    }

    /// Sets the service window
    pub fn active_between(mut self, start: NaiveDate, end: Option<NaiveDate>) -> Self {
        self.bill.active_date = Some(start);
        self.bill.termination_date = end;
        self
    }

    pub fn build(self) -> NewBill {
        self.bill
    }
}

/// Builder for pricing period payloads
pub struct PeriodBuilder {
    period: PeriodInput,
}

impl PeriodBuilder {
    /// Creates a period covering `start_day..=end_day` with no usage
    pub fn days(start_day: i32, end_day: i32) -> Self {
        Self {
            period: PeriodInput {
                start_day,
                end_day,
                ..Default::default()
            },
        }
    }

    /// Sets one service's quantity and price
    pub fn with_line(mut self, component: ServiceComponent, quantity: Decimal, price: Decimal) -> Self {
        self.period.usage = self.period.usage.with_line(component, quantity, price);
        self
    }

    pub fn with_discount(mut self, discount: Decimal) -> Self {
        self.period.discount = discount;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.period.notes = Some(notes.into());
        self
    }

    pub fn build(self) -> PeriodInput {
        self.period
    }
}

/// Builder for payment payloads
pub struct PaymentBuilder {
    payment: NewPayment,
}

impl PaymentBuilder {
    /// Creates a payment against `invoice_id` with no details
    pub fn for_invoice(invoice_id: InvoiceId) -> Self {
        Self {
            payment: NewPayment {
                entitlement_id: EntitlementId::new(1),
                invoice_id,
                payment_date: DateFixtures::june_issue(),
                payment_method: Some("bank_transfer".to_string()),
                remarks: None,
                details: Vec::new(),
            },
        }
    }

    /// Adds a completed detail transaction
    pub fn with_detail(mut self, amount: Decimal) -> Self {
        let reference = format!("TXN-{}", self.payment.details.len() + 1);
        self.payment
            .details
            .push(PaymentDetailInput::new(amount).with_transaction_id(reference));
        self
    }

    pub fn with_entitlement(mut self, entitlement_id: EntitlementId) -> Self {
        self.payment.entitlement_id = entitlement_id;
        self
    }

    pub fn build(self) -> NewPayment {
        self.payment
    }
}
