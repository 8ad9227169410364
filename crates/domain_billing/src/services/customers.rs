use tracing::{info, instrument};

use core_kernel::{ActorContext, CustomerId};

use super::BillingService;
use crate::customer::{Customer, NewCustomer};
use crate::error::BillingError;

impl BillingService {
    /// Registers a customer and assigns its customer number
    ///
    /// Both steps (insert, then number derived from the new id) run in one
    /// unit of work.
    ///
    /// # Errors
    ///
    /// `DuplicateCustomerEmail` when another customer has the same email.
    #[instrument(skip(self, new, actor), fields(actor = %actor.actor_id))]
    pub async fn create_customer(&self, mut new: NewCustomer, actor: &ActorContext) -> Result<Customer, BillingError> {
        new.validate()?;
        new.email = new.normalized_email();

        let mut uow = self.begin().await?;
        if let Some(email) = new.email.as_deref() {
            if uow.customer_email_exists(email).await? {
                return Err(BillingError::DuplicateCustomerEmail(email.to_string()));
            }
        }

        let mut customer = uow.insert_customer(&new, &actor.actor_id).await?;
        customer.assign_identifier();
        uow.update_customer(&customer).await?;
        uow.commit().await?;

        info!(customer_id = %customer.id, customer_number = ?customer.customer_number, "Customer registered");
        Ok(customer)
    }

    pub async fn get_customer(&self, id: CustomerId) -> Result<Customer, BillingError> {
        let mut uow = self.begin().await?;
        uow.find_customer(id)
            .await?
            .ok_or_else(|| BillingError::not_found("Customer", id))
    }
}
