//! Database error types
//!
//! SQLx errors are classified by PostgreSQL SQLSTATE code and then folded
//! into `BillingError` at the port boundary.

use domain_billing::BillingError;
use thiserror::Error;
use tracing::warn;

/// Unique constraint on `invoices.invoice_number`
pub const INVOICE_NUMBER_CONSTRAINT: &str = "invoices_invoice_number_key";

/// Unique constraint on `invoices.bill_id`
pub const INVOICE_BILL_CONSTRAINT: &str = "invoices_bill_id_key";

/// Unique index on `lower(customers.email)`
pub const CUSTOMER_EMAIL_CONSTRAINT: &str = "customers_email_key";

/// Errors that can occur during database operations
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    ConnectionFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    /// SQLSTATE 23505
    #[error("Duplicate entry on {constraint}: {message}")]
    DuplicateEntry { constraint: String, message: String },

    /// SQLSTATE 23503
    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// SQLSTATE 23514
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored value could not be mapped onto the domain type
    #[error("Corrupt column {column}: {message}")]
    CorruptValue { column: String, message: String },

    #[error("Connection pool exhausted")]
    PoolExhausted,
}

impl DatabaseError {
    pub fn corrupt(column: impl Into<String>, message: impl std::fmt::Display) -> Self {
        DatabaseError::CorruptValue {
            column: column.into(),
            message: message.to_string(),
        }
    }

    /// Returns true for a unique violation on the named constraint
    pub fn is_unique_violation_on(&self, name: &str) -> bool {
        matches!(self, DatabaseError::DuplicateEntry { constraint, .. } if constraint == name)
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(self, DatabaseError::ConnectionFailed(_) | DatabaseError::PoolExhausted)
    }
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::RowNotFound => DatabaseError::NotFound("Record not found".to_string()),
            sqlx::Error::PoolTimedOut => DatabaseError::PoolExhausted,
            sqlx::Error::PoolClosed | sqlx::Error::Io(_) | sqlx::Error::Tls(_) => {
                DatabaseError::ConnectionFailed(error.to_string())
            }
            sqlx::Error::ColumnDecode { index, source } => DatabaseError::corrupt(index.as_str(), source),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                // https://www.postgresql.org/docs/current/errcodes-appendix.html
                match db_err.code().as_deref() {
                    Some("23505") => DatabaseError::DuplicateEntry {
                        constraint: db_err.constraint().unwrap_or_default().to_string(),
                        message,
                    },
                    Some("23503") => DatabaseError::ForeignKeyViolation(message),
                    Some("23514") => DatabaseError::ConstraintViolation(message),
                    _ => DatabaseError::QueryFailed(message),
                }
            }
            _ => DatabaseError::QueryFailed(error.to_string()),
        }
    }
}

impl From<DatabaseError> for BillingError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::DuplicateEntry { constraint, message } if constraint == INVOICE_NUMBER_CONSTRAINT => {
                BillingError::DuplicateInvoiceNumber(message)
            }
            DatabaseError::DuplicateEntry { constraint, .. } if constraint == INVOICE_BILL_CONSTRAINT => {
                BillingError::Conflict("An invoice already exists for this bill".to_string())
            }
            DatabaseError::DuplicateEntry { constraint, .. } if constraint == CUSTOMER_EMAIL_CONSTRAINT => {
                BillingError::DuplicateCustomerEmail("email".to_string())
            }
            // Raw PostgreSQL text stays in the log
            DatabaseError::DuplicateEntry { constraint, message } => {
                warn!(%constraint, %message, "Unique violation");
                BillingError::Conflict("The record duplicates an existing record".to_string())
            }
            DatabaseError::ForeignKeyViolation(message) => {
                warn!(%message, "Foreign key violation");
                BillingError::Conflict("The record references a missing or dependent record".to_string())
            }
            DatabaseError::ConstraintViolation(message) => {
                warn!(%message, "Check constraint violation");
                BillingError::Validation("The record violates a data constraint".to_string())
            }
            other => BillingError::Storage(other.to_string()),
        }
    }
}
