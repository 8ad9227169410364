//! Billable service components
//!
//! Every bill, pricing period and daily record is expressed over the same
//! fixed set of six bandwidth services. [`PerService`] holds one value per
//! component so the six symmetric (quantity, price) pairs are handled by
//! iteration instead of twelve hand-written fields at each call site.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BillingError;

/// A billable bandwidth service
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceComponent {
    /// International Internet Gateway
    Iig,
    /// Facebook Network Appliance cache
    Fna,
    /// Google Global Cache
    Ggc,
    /// Content delivery network
    Cdn,
    /// Bangladesh Internet Exchange
    Bdix,
    /// Baishan cache
    Baishan,
}

impl ServiceComponent {
    /// All components in invoice line order
    pub const ALL: [ServiceComponent; 6] = [
        ServiceComponent::Iig,
        ServiceComponent::Fna,
        ServiceComponent::Ggc,
        ServiceComponent::Cdn,
        ServiceComponent::Bdix,
        ServiceComponent::Baishan,
    ];

    /// Storage/breakdown key ("iig")
    pub fn key(&self) -> &'static str {
        match self {
            ServiceComponent::Iig => "iig",
            ServiceComponent::Fna => "fna",
            ServiceComponent::Ggc => "ggc",
            ServiceComponent::Cdn => "cdn",
            ServiceComponent::Bdix => "bdix",
            ServiceComponent::Baishan => "baishan",
        }
    }

    /// Printed service name ("IIG")
    pub fn label(&self) -> &'static str {
        match self {
            ServiceComponent::Iig => "IIG",
            ServiceComponent::Fna => "FNA",
            ServiceComponent::Ggc => "GGC",
            ServiceComponent::Cdn => "CDN",
            ServiceComponent::Bdix => "BDIX",
            ServiceComponent::Baishan => "BAISHAN",
        }
    }
}

impl fmt::Display for ServiceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ServiceComponent {
    type Err = BillingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ServiceComponent::ALL
            .into_iter()
            .find(|c| c.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| BillingError::validation(format!("Unknown service component: {}", s)))
    }
}

/// One value per service component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerService<T> {
    #[serde(default)]
    pub iig: T,
    #[serde(default)]
    pub fna: T,
    #[serde(default)]
    pub ggc: T,
    #[serde(default)]
    pub cdn: T,
    #[serde(default)]
    pub bdix: T,
    #[serde(default)]
    pub baishan: T,
}

impl<T> PerService<T> {
    /// Returns the value for a component
    pub fn get(&self, component: ServiceComponent) -> &T {
        match component {
            ServiceComponent::Iig => &self.iig,
            ServiceComponent::Fna => &self.fna,
            ServiceComponent::Ggc => &self.ggc,
            ServiceComponent::Cdn => &self.cdn,
            ServiceComponent::Bdix => &self.bdix,
            ServiceComponent::Baishan => &self.baishan,
        }
    }

    /// Returns a mutable reference to the value for a component
    pub fn get_mut(&mut self, component: ServiceComponent) -> &mut T {
        match component {
            ServiceComponent::Iig => &mut self.iig,
            ServiceComponent::Fna => &mut self.fna,
            ServiceComponent::Ggc => &mut self.ggc,
            ServiceComponent::Cdn => &mut self.cdn,
            ServiceComponent::Bdix => &mut self.bdix,
            ServiceComponent::Baishan => &mut self.baishan,
        }
    }

    /// Iterates components with their values in line order
    pub fn iter(&self) -> impl Iterator<Item = (ServiceComponent, &T)> {
        ServiceComponent::ALL.into_iter().map(move |c| (c, self.get(c)))
    }
}

/// Usage quantity and unit price for one component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLine {
    #[serde(default)]
    pub quantity: Decimal,
    #[serde(default)]
    pub price: Decimal,
}

impl ServiceLine {
    pub fn new(quantity: Decimal, price: Decimal) -> Self {
        Self { quantity, price }
    }

    /// quantity × price
    pub fn amount(&self) -> Decimal {
        self.quantity * self.price
    }

    /// True when either side carries a value worth invoicing
    pub fn is_billable(&self) -> bool {
        self.quantity > Decimal::ZERO || self.amount() > Decimal::ZERO
    }
}

/// Quantity/price pairs for all six components
pub type ServiceUsage = PerService<ServiceLine>;

/// Per-component quantities only (daily overrides)
pub type ServiceQuantities = PerService<Decimal>;

impl ServiceUsage {
    /// Σ(quantity_i × price_i) over the six components
    pub fn gross_total(&self) -> Decimal {
        self.iter().map(|(_, line)| line.amount()).sum()
    }

    /// Sets one component's pair, builder style
    pub fn with_line(mut self, component: ServiceComponent, quantity: Decimal, price: Decimal) -> Self {
        *self.get_mut(component) = ServiceLine::new(quantity, price);
        self
    }

    /// Rejects negative quantities or prices
    pub fn validate_non_negative(&self) -> Result<(), BillingError> {
        for (component, line) in self.iter() {
            if line.quantity.is_sign_negative() && !line.quantity.is_zero() {
                return Err(BillingError::validation(format!(
                    "{} quantity must not be negative",
                    component
                )));
            }
            if line.price.is_sign_negative() && !line.price.is_zero() {
                return Err(BillingError::validation(format!(
                    "{} price must not be negative",
                    component
                )));
            }
        }
        Ok(())
    }
}
