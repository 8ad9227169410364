//! Request/response data transfer objects
//!
//! Request bodies derive `Validate` for shape checks (lengths, ranges,
//! signs); business rules stay in the domain and surface as `BillingError`.

pub mod customers;
pub mod bills;
pub mod daily;
pub mod invoices;
pub mod payments;

use rust_decimal::Decimal;
use validator::{Validate, ValidationError};

use crate::error::ApiError;

/// Runs field validation on a request body
pub fn validated<T: Validate>(request: T) -> Result<T, ApiError> {
    request.validate()?;
    Ok(request)
}

pub(crate) fn non_negative(value: &Decimal) -> Result<(), ValidationError> {
    if value.is_sign_negative() && !value.is_zero() {
        let mut err = ValidationError::new("non_negative");
        err.message = Some("must not be negative".into());
        return Err(err);
    }
    Ok(())
}

pub(crate) fn positive(value: &Decimal) -> Result<(), ValidationError> {
    if *value <= Decimal::ZERO {
        let mut err = ValidationError::new("positive");
        err.message = Some("must be greater than zero".into());
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_sign_validators() {
        assert!(non_negative(&dec!(0)).is_ok());
        assert!(non_negative(&dec!(-0.01)).is_err());
        assert!(positive(&dec!(0.01)).is_ok());
        assert!(positive(&dec!(0)).is_err());
    }
}
