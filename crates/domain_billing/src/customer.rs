//! Customers billed by the engine
//!
//! Customers come in three categories with disjoint details. Each category is
//! a variant carrying only its own fields, so a SOHO customer cannot end up
//! with a partner commission rate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use core_kernel::CustomerId;

use crate::error::BillingError;
use crate::numbering;

/// Category-specific customer details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CustomerCategory {
    /// Corporate bandwidth customer
    Bandwidth {
        committed_mbps: Option<Decimal>,
        nttn_provider: Option<String>,
    },
    /// Reseller buying capacity for onward sale
    ChannelPartner {
        partner_code: String,
        commission_percent: Decimal,
    },
    /// Small office / home office subscriber
    Soho {
        package_name: String,
        connection_address: Option<String>,
    },
}

impl CustomerCategory {
    /// Stable name stored alongside the details
    pub fn type_name(&self) -> &'static str {
        match self {
            CustomerCategory::Bandwidth { .. } => "bandwidth",
            CustomerCategory::ChannelPartner { .. } => "channel_partner",
            CustomerCategory::Soho { .. } => "soho",
        }
    }

    fn validate(&self) -> Result<(), BillingError> {
        match self {
            CustomerCategory::ChannelPartner { partner_code, commission_percent } => {
                if partner_code.trim().is_empty() {
                    return Err(BillingError::validation("Channel partner code is required"));
                }
                if *commission_percent < Decimal::ZERO || *commission_percent > Decimal::ONE_HUNDRED {
                    return Err(BillingError::validation(
                        "Commission percent must be between 0 and 100",
                    ));
                }
            }
            CustomerCategory::Soho { package_name, .. } if package_name.trim().is_empty() => {
                return Err(BillingError::validation("SOHO package name is required"));
            }
            _ => {}
        }
        Ok(())
    }
}

/// A registered customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    /// Assigned in the second step of registration
    pub customer_number: Option<String>,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: CustomerCategory,
    pub is_active: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    /// Materialises a freshly inserted row
    pub fn from_new(id: CustomerId, new: NewCustomer, created_by: &str, now: DateTime<Utc>) -> Self {
        Self {
            id,
            customer_number: None,
            name: new.name,
            email: new.email,
            phone: new.phone,
            category: new.category,
            is_active: true,
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Second registration step: derive the public customer number
    ///
    /// The number embeds the row id, so it can only be computed after the
    /// insert. Calling this twice keeps the first number.
    pub fn assign_identifier(&mut self) -> &str {
        if self.customer_number.is_none() {
            self.customer_number = Some(numbering::customer_number(&self.name, self.id));
            self.updated_at = Utc::now();
        }
        self.customer_number.as_deref().unwrap_or_default()
    }
}

/// Registration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub category: CustomerCategory,
}

impl NewCustomer {
    /// Checks required fields and category details
    pub fn validate(&self) -> Result<(), BillingError> {
        if self.name.trim().is_empty() {
            return Err(BillingError::validation("Customer name is required"));
        }
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(BillingError::validation(format!("Invalid email: {}", email)));
            }
        }
        self.category.validate()
    }

    /// Email normalised for uniqueness checks
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.trim().to_ascii_lowercase())
    }
}
