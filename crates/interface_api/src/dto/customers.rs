//! Customer DTOs

use serde::Deserialize;
use validator::Validate;

use domain_billing::{CustomerCategory, NewCustomer};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 255))]
    pub name: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    pub category: CustomerCategory,
}

impl From<CreateCustomerRequest> for NewCustomer {
    fn from(request: CreateCustomerRequest) -> Self {
        NewCustomer {
            name: request.name,
            email: request.email,
            phone: request.phone,
            category: request.category,
        }
    }
}
