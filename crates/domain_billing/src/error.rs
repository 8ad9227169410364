//! Billing domain errors

use core_kernel::{BillId, CoreError, MoneyError, TemporalError};
use thiserror::Error;

/// Errors that can occur in the billing domain
#[derive(Debug, Error)]
pub enum BillingError {
    /// Input rejected before any write
    #[error("Validation error: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    /// One invoice per bill
    #[error("Invoice {invoice_number} already exists for bill {bill_id}")]
    InvoiceAlreadyExists {
        bill_id: BillId,
        invoice_number: String,
    },

    /// Another customer already uses this email address
    #[error("A customer with email '{0}' already exists")]
    DuplicateCustomerEmail(String),

    /// Operation refused because of dependent records
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unique constraint on the invoice number was violated
    #[error("Invoice number already taken: {0}")]
    DuplicateInvoiceNumber(String),

    /// Every retry produced a colliding invoice number
    #[error("Could not assign an invoice number in scope '{prefix}' after {attempts} attempts")]
    InvoiceNumberExhausted {
        prefix: String,
        attempts: u32,
    },

    /// Arithmetic could not be completed
    #[error("Calculation error: {0}")]
    Calculation(String),

    /// The persistence adapter failed
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BillingError {
    pub fn validation(message: impl Into<String>) -> Self {
        BillingError::Validation(message.into())
    }

    pub fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        BillingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        BillingError::Storage(message.into())
    }

    /// Returns true for input errors surfaced before any write
    pub fn is_validation(&self) -> bool {
        matches!(self, BillingError::Validation(_))
    }

    /// Returns true when the caller must resolve a conflicting record
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            BillingError::InvoiceAlreadyExists { .. }
                | BillingError::DuplicateCustomerEmail(_)
                | BillingError::Conflict(_)
        )
    }

    /// Returns true if this error indicates the entity was not found
    pub fn is_not_found(&self) -> bool {
        matches!(self, BillingError::NotFound { .. })
    }

    /// Returns true when the operation may succeed with a freshly computed value
    pub fn is_retryable(&self) -> bool {
        matches!(self, BillingError::DuplicateInvoiceNumber(_))
    }
}

impl From<MoneyError> for BillingError {
    fn from(err: MoneyError) -> Self {
        BillingError::Calculation(err.to_string())
    }
}

impl From<TemporalError> for BillingError {
    fn from(err: TemporalError) -> Self {
        BillingError::Validation(err.to_string())
    }
}

impl From<CoreError> for BillingError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Money(e) => e.into(),
            CoreError::Temporal(e) => e.into(),
            CoreError::Validation(msg) => BillingError::Validation(msg),
            other @ CoreError::InvalidIdentifier { .. } => BillingError::Validation(other.to_string()),
        }
    }
}
