//! Kernel error type shared by the domain crates

use thiserror::Error;
use crate::money::MoneyError;
use crate::temporal::TemporalError;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Money error: {0}")]
    Money(#[from] MoneyError),

    #[error("Temporal error: {0}")]
    Temporal(#[from] TemporalError),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Text that does not parse as the named identifier
    #[error("Invalid {kind} identifier: '{value}'")]
    InvalidIdentifier { kind: &'static str, value: String },
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        CoreError::Validation(message.into())
    }

    pub fn invalid_identifier(kind: &'static str, value: impl Into<String>) -> Self {
        CoreError::InvalidIdentifier {
            kind,
            value: value.into(),
        }
    }
}
