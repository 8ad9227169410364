//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;
use validator::{ValidationErrors, ValidationErrorsKind};

use domain_billing::BillingError;

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    Validation(String),

    /// Request body failed field validation
    #[error("Invalid request body")]
    InvalidFields(Vec<String>),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message, details) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::Internal(msg) => {
                error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error", msg, None),
            ApiError::InvalidFields(details) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Invalid request body".to_string(),
                Some(details),
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message,
            details,
        };

        (status, Json(body)).into_response()
    }
}

impl From<BillingError> for ApiError {
    fn from(err: BillingError) -> Self {
        match err {
            BillingError::Validation(_) | BillingError::Calculation(_) => ApiError::Validation(err.to_string()),
            BillingError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            BillingError::InvoiceAlreadyExists { .. }
            | BillingError::DuplicateCustomerEmail(_)
            | BillingError::Conflict(_)
            | BillingError::DuplicateInvoiceNumber(_)
            | BillingError::InvoiceNumberExhausted { .. } => ApiError::Conflict(err.to_string()),
            BillingError::Storage(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let mut details = Vec::new();
        collect_field_errors("", &errors, &mut details);
        details.sort();
        ApiError::InvalidFields(details)
    }
}

fn collect_field_errors(path: &str, errors: &ValidationErrors, out: &mut Vec<String>) {
    for (field, kind) in errors.errors() {
        let name = if path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", path, field)
        };
        match kind {
            ValidationErrorsKind::Field(field_errors) => {
                for e in field_errors {
                    let reason = e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string());
                    out.push(format!("{}: {}", name, reason));
                }
            }
            ValidationErrorsKind::Struct(nested) => collect_field_errors(&name, nested, out),
            ValidationErrorsKind::List(items) => {
                for (index, nested) in items {
                    collect_field_errors(&format!("{}[{}]", name, index), nested, out);
                }
            }
        }
    }
}
