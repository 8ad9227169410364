//! Pre-built Test Fixtures
//!
//! Provides ready-to-use test data for the billing engine. These fixtures are
//! consistent and predictable so expected totals can be written by hand.

use std::sync::Arc;

use chrono::NaiveDate;
use core_kernel::{ActorContext, CustomerId};
use domain_billing::ports::mock::MockBillingPort;
use domain_billing::{BillingService, BillingSettings, CustomerCategory, NewCustomer};
use rust_decimal_macros::dec;

/// Fixture for calendar test data
pub struct DateFixtures;

impl DateFixtures {
    /// Builds a date, panicking on invalid input
    pub fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid fixture date")
    }

    /// First day of the standard billing month (June 2025)
    pub fn june_start() -> NaiveDate {
        Self::ymd(2025, 6, 1)
    }

    /// Last day of the standard billing month
    pub fn june_end() -> NaiveDate {
        Self::ymd(2025, 6, 30)
    }

    /// Issue date used by invoice tests
    pub fn june_issue() -> NaiveDate {
        Self::ymd(2025, 6, 14)
    }
}

/// Fixture for customers of each category
pub struct CustomerFixtures;

impl CustomerFixtures {
    /// Corporate bandwidth customer
    pub fn bandwidth() -> NewCustomer {
        NewCustomer {
            name: "Sky Net Limited".to_string(),
            email: Some("noc@skynet.example".to_string()),
            phone: Some("+8801700000001".to_string()),
            category: CustomerCategory::Bandwidth {
                committed_mbps: Some(dec!(1000)),
                nttn_provider: Some("Summit".to_string()),
            },
        }
    }

    /// Reseller with a commission rate
    pub fn channel_partner() -> NewCustomer {
        NewCustomer {
            name: "Delta Links".to_string(),
            email: Some("accounts@deltalinks.example".to_string()),
            phone: None,
            category: CustomerCategory::ChannelPartner {
                partner_code: "CP-014".to_string(),
                commission_percent: dec!(7.5),
            },
        }
    }

    /// Home subscriber
    pub fn soho() -> NewCustomer {
        NewCustomer {
            name: "Rahim Traders".to_string(),
            email: None,
            phone: Some("+8801800000002".to_string()),
            category: CustomerCategory::Soho {
                package_name: "Home 20".to_string(),
                connection_address: Some("House 12, Road 4, Dhanmondi".to_string()),
            },
        }
    }
}

/// Fixture for operation actors
pub struct ActorFixtures;

impl ActorFixtures {
    /// Billing officer used as the default actor
    pub fn billing_officer() -> ActorContext {
        ActorContext::new("billing.officer").with_correlation_id("test-correlation")
    }

    /// Finance user recording payments
    pub fn accounts() -> ActorContext {
        ActorContext::new("accounts.user")
    }
}

/// A billing service wired to a fresh in-memory port
pub struct BillingHarness {
    pub port: MockBillingPort,
    pub service: BillingService,
    pub actor: ActorContext,
}

impl BillingHarness {
    /// Harness with default settings
    pub fn new() -> Self {
        Self::with_settings(BillingSettings::default())
    }

    /// Harness with custom settings
    pub fn with_settings(settings: BillingSettings) -> Self {
        let port = MockBillingPort::new();
        let service = BillingService::new(Arc::new(port.clone()), settings);
        Self {
            port,
            service,
            actor: ActorFixtures::billing_officer(),
        }
    }

    /// Registers a bandwidth customer without email and returns its id
    ///
    /// Callable repeatedly on one harness.
    pub async fn customer(&self) -> CustomerId {
        let customer = NewCustomer {
            email: None,
            ..CustomerFixtures::bandwidth()
        };
        self.service
            .create_customer(customer, &self.actor)
            .await
            .expect("fixture customer registers")
            .id
    }
}

impl Default for BillingHarness {
    fn default() -> Self {
        Self::new()
    }
}
