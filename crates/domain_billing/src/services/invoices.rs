use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

use core_kernel::{ActorContext, BillId, InvoiceId};

use super::{require_bill, require_locked_invoice, BillingService};
use crate::error::BillingError;
use crate::generator::{build_invoice, InvoiceRequest};
use crate::invoice::Invoice;

impl BillingService {
    /// Generates the invoice for a bill
    ///
    /// The number is picked under the month scope lock and inserted in the
    /// same unit of work. Should the insert still hit the unique constraint,
    /// the whole unit is retried with a fresh sequence, up to
    /// `invoice_number_attempts` times.
    ///
    /// # Errors
    ///
    /// - `InvoiceAlreadyExists` if the bill already has an invoice
    /// - `InvoiceNumberExhausted` when every attempt collided
    #[instrument(skip(self, request, actor), fields(actor = %actor.actor_id, bill_id = %bill_id, format = %request.format))]
    pub async fn generate_invoice(
        &self,
        bill_id: BillId,
        request: InvoiceRequest,
        actor: &ActorContext,
    ) -> Result<Invoice, BillingError> {
        let attempts = self.settings.invoice_number_attempts.max(1);
        let mut last_prefix = String::new();

        for attempt in 1..=attempts {
            match self.try_generate_invoice(bill_id, &request, actor).await {
                Err(BillingError::DuplicateInvoiceNumber(number)) => {
                    warn!(attempt, invoice_number = %number, "Invoice number collision, retrying");
                    last_prefix = number
                        .rsplit_once('/')
                        .map(|(prefix, _)| format!("{}/", prefix))
                        .unwrap_or(number);
                }
                other => return other,
            }
        }
        Err(BillingError::InvoiceNumberExhausted {
            prefix: last_prefix,
            attempts,
        })
    }

    async fn try_generate_invoice(
        &self,
        bill_id: BillId,
        request: &InvoiceRequest,
        actor: &ActorContext,
    ) -> Result<Invoice, BillingError> {
        let mut uow = self.begin().await?;
        let bill = require_bill(uow.as_mut(), bill_id).await?;
        if let Some(existing) = uow.find_invoice_by_bill(bill_id).await? {
            return Err(BillingError::InvoiceAlreadyExists {
                bill_id,
                invoice_number: existing.invoice_number,
            });
        }

        let mut draft = build_invoice(&bill, request, &self.settings, self.settings.timezone.today())?;
        let scope = draft.number_scope();
        uow.lock_invoice_scope(&scope).await?;
        let existing = uow.invoice_numbers_in_scope(&scope).await?;
        draft.invoice_number = scope.format(scope.next_sequence(existing.iter().map(String::as_str)));

        let invoice = uow.insert_invoice(&draft, &actor.actor_id).await?;
        uow.commit().await?;

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            items = invoice.items.len(),
            "Invoice generated"
        );
        Ok(invoice)
    }

    /// Invoice with its items
    pub async fn get_invoice(&self, id: InvoiceId) -> Result<Invoice, BillingError> {
        let mut uow = self.begin().await?;
        uow.find_invoice(id)
            .await?
            .ok_or_else(|| BillingError::not_found("Invoice", id))
    }

    /// The invoice generated from a bill, if any
    pub async fn get_invoice_for_bill(&self, bill_id: BillId) -> Result<Option<Invoice>, BillingError> {
        let mut uow = self.begin().await?;
        require_bill(uow.as_mut(), bill_id).await?;
        uow.find_invoice_by_bill(bill_id).await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, invoice_id = %id))]
    pub async fn mark_invoice_issued(&self, id: InvoiceId, actor: &ActorContext) -> Result<Invoice, BillingError> {
        self.transition_invoice(id, |invoice| invoice.mark_as_issued(Utc::now()))
            .await
    }

    /// Marks the invoice paid without going through payment records
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, invoice_id = %id))]
    pub async fn mark_invoice_paid(
        &self,
        id: InvoiceId,
        amount: Option<Decimal>,
        actor: &ActorContext,
    ) -> Result<Invoice, BillingError> {
        self.transition_invoice(id, |invoice| invoice.mark_as_paid(amount, Utc::now()))
            .await
    }

    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, invoice_id = %id))]
    pub async fn cancel_invoice(&self, id: InvoiceId, actor: &ActorContext) -> Result<Invoice, BillingError> {
        self.transition_invoice(id, |invoice| invoice.cancel(Utc::now()))
            .await
    }

    async fn transition_invoice<F>(&self, id: InvoiceId, transition: F) -> Result<Invoice, BillingError>
    where
        F: FnOnce(&mut Invoice) -> Result<(), BillingError> + Send,
    {
        let mut uow = self.begin().await?;
        let mut invoice = require_locked_invoice(uow.as_mut(), id).await?;
        let previous = invoice.status;
        transition(&mut invoice)?;
        uow.update_invoice(&invoice).await?;
        uow.commit().await?;

        info!(from = %previous, to = %invoice.status, "Invoice status changed");
        Ok(invoice)
    }
}
