use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use core_kernel::{ActorContext, InvoiceId, PaymentDetailId, PaymentMasterId};

use super::{require_locked_invoice, BillingService};
use crate::error::BillingError;
use crate::payment::{
    reconcile_invoice, NewPayment, PaymentDetailInput, PaymentDetails, PaymentMaster, ReconciliationOutcome,
};
use crate::ports::BillingUnitOfWork;

/// A recorded payment with its details and the resulting invoice state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment: PaymentMaster,
    pub details: Vec<PaymentDetails>,
    pub reconciliation: ReconciliationOutcome,
}

/// A written payment detail and the resulting invoice state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailReceipt {
    pub detail: PaymentDetails,
    pub reconciliation: ReconciliationOutcome,
}

/// A stored payment with all of its details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment: PaymentMaster,
    pub details: Vec<PaymentDetails>,
}

impl BillingService {
    /// Reads a payment master and its detail transactions
    #[instrument(skip(self))]
    pub async fn get_payment(&self, master_id: PaymentMasterId) -> Result<PaymentRecord, BillingError> {
        let mut uow = self.begin().await?;
        let payment = require_master(uow.as_mut(), master_id).await?;
        let details = uow.list_payment_details(master_id).await?;
        Ok(PaymentRecord { payment, details })
    }

    /// Records a payment master with its initial details
    ///
    /// The invoice is locked first and reconciled once after all details are
    /// written, all in one unit of work.
    #[instrument(skip(self, payment, actor), fields(actor = %actor.actor_id, invoice_id = %payment.invoice_id))]
    pub async fn record_payment(&self, payment: NewPayment, actor: &ActorContext) -> Result<PaymentReceipt, BillingError> {
        payment.validate()?;

        let mut uow = self.begin().await?;
        require_locked_invoice(uow.as_mut(), payment.invoice_id).await?;
        let master = uow.insert_payment_master(&payment, &actor.actor_id).await?;
        let mut details = Vec::with_capacity(payment.details.len());
        for input in &payment.details {
            details.push(uow.insert_payment_detail(master.id, input).await?);
        }
        let reconciliation = reconcile(uow.as_mut(), payment.invoice_id).await?;
        uow.commit().await?;

        Ok(PaymentReceipt {
            payment: master,
            details,
            reconciliation,
        })
    }

    /// Adds a detail transaction to an existing payment
    #[instrument(skip(self, input, actor), fields(actor = %actor.actor_id, payment_id = %master_id))]
    pub async fn add_payment_detail(
        &self,
        master_id: PaymentMasterId,
        input: PaymentDetailInput,
        actor: &ActorContext,
    ) -> Result<DetailReceipt, BillingError> {
        input.validate()?;

        let mut uow = self.begin().await?;
        let master = require_master(uow.as_mut(), master_id).await?;
        require_locked_invoice(uow.as_mut(), master.invoice_id).await?;
        let detail = uow.insert_payment_detail(master_id, &input).await?;
        let reconciliation = reconcile(uow.as_mut(), master.invoice_id).await?;
        uow.commit().await?;

        Ok(DetailReceipt { detail, reconciliation })
    }

    /// Rewrites a detail transaction and re-projects its invoice
    #[instrument(skip(self, input, actor), fields(actor = %actor.actor_id, detail_id = %detail_id))]
    pub async fn update_payment_detail(
        &self,
        detail_id: PaymentDetailId,
        input: PaymentDetailInput,
        actor: &ActorContext,
    ) -> Result<DetailReceipt, BillingError> {
        input.validate()?;

        let mut uow = self.begin().await?;
        let mut detail = uow
            .find_payment_detail(detail_id)
            .await?
            .ok_or_else(|| BillingError::not_found("PaymentDetails", detail_id))?;
        let master = require_master(uow.as_mut(), detail.payment_master_id).await?;
        require_locked_invoice(uow.as_mut(), master.invoice_id).await?;

        detail.apply(input, Utc::now());
        uow.update_payment_detail(&detail).await?;
        let reconciliation = reconcile(uow.as_mut(), master.invoice_id).await?;
        uow.commit().await?;

        Ok(DetailReceipt { detail, reconciliation })
    }
}

async fn require_master(
    uow: &mut dyn BillingUnitOfWork,
    id: PaymentMasterId,
) -> Result<PaymentMaster, BillingError> {
    uow.find_payment_master(id)
        .await?
        .ok_or_else(|| BillingError::not_found("PaymentMaster", id))
}

/// Invoice-scoped reconciliation inside the caller's unit of work
async fn reconcile(
    uow: &mut dyn BillingUnitOfWork,
    invoice_id: InvoiceId,
) -> Result<ReconciliationOutcome, BillingError> {
    let mut invoice = require_locked_invoice(uow, invoice_id).await?;
    let total_paid = uow.sum_payments_for_invoice(invoice_id).await?;
    let outcome = reconcile_invoice(&mut invoice, total_paid, Utc::now());
    uow.update_invoice(&invoice).await?;

    info!(
        invoice_number = %invoice.invoice_number,
        total_paid = %outcome.total_paid,
        balance_due = %outcome.balance_due,
        status = %outcome.status,
        "Invoice reconciled"
    );
    Ok(outcome)
}
