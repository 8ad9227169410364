use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use core_kernel::{ActorContext, BillId, PricingPeriodId};

use super::{require_bill, require_locked_bill, BillingService};
use crate::bill::{BillRecord, BillStatus, BillUpdate, NewBill};
use crate::error::BillingError;
use crate::ports::BillingUnitOfWork;
use crate::pricing::{PeriodInput, PricingPeriod};

/// A bill together with its pricing periods
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BillWithPeriods {
    pub bill: BillRecord,
    pub periods: Vec<PricingPeriod>,
}

/// One period's contribution in a finalize summary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodSummary {
    pub period_id: PricingPeriodId,
    pub start_day: i32,
    pub end_day: i32,
    pub period_total: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeSummary {
    pub period_count: usize,
    pub periods: Vec<PeriodSummary>,
    pub total_bill: Decimal,
    pub total_received: Decimal,
    pub total_due: Decimal,
}

/// `{success, message, summary}` result of finalizing a bill
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalizeOutcome {
    pub success: bool,
    pub message: String,
    pub summary: FinalizeSummary,
}

impl BillingService {
    /// Creates a bill and assigns its bill number
    ///
    /// Creation is two-phase inside one unit of work: the insert yields the
    /// id, then the number derived from it is written back.
    #[instrument(skip(self, new, actor), fields(actor = %actor.actor_id, customer_id = %new.customer_id))]
    pub async fn create_bill(&self, new: NewBill, actor: &ActorContext) -> Result<BillRecord, BillingError> {
        new.validate()?;

        let mut uow = self.begin().await?;
        let customer = uow
            .find_customer(new.customer_id)
            .await?
            .ok_or_else(|| BillingError::not_found("Customer", new.customer_id))?;

        let mut bill = uow.insert_bill(&new, &actor.actor_id).await?;
        bill.assign_identifier(&customer.name);
        bill.recompute_totals(&[]);
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(bill_id = %bill.id, bill_number = ?bill.bill_number, total_bill = %bill.total_bill, "Bill created");
        Ok(bill)
    }

    pub async fn get_bill(&self, id: BillId) -> Result<BillWithPeriods, BillingError> {
        let mut uow = self.begin().await?;
        let bill = require_bill(uow.as_mut(), id).await?;
        let periods = uow.list_periods(id).await?;
        Ok(BillWithPeriods { bill, periods })
    }

    /// Updates flat bill fields and recomputes totals
    #[instrument(skip(self, update, actor), fields(actor = %actor.actor_id, bill_id = %id))]
    pub async fn update_bill(
        &self,
        id: BillId,
        update: BillUpdate,
        actor: &ActorContext,
    ) -> Result<BillRecord, BillingError> {
        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), id).await?;
        bill.apply_update(update, &actor.actor_id, Utc::now())?;
        recompute_bill(uow.as_mut(), &mut bill).await?;
        uow.commit().await?;
        Ok(bill)
    }

    /// Soft activation/deactivation
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, bill_id = %id))]
    pub async fn set_bill_status(
        &self,
        id: BillId,
        status: BillStatus,
        actor: &ActorContext,
    ) -> Result<BillRecord, BillingError> {
        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), id).await?;
        bill.status = status;
        bill.touch(&actor.actor_id, Utc::now());
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        info!(status = %status, "Bill status changed");
        Ok(bill)
    }

    /// Admin delete cascading to periods and daily amounts
    ///
    /// # Errors
    ///
    /// `Conflict` when an invoice has been generated from the bill.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, bill_id = %id))]
    pub async fn delete_bill(&self, id: BillId, actor: &ActorContext) -> Result<(), BillingError> {
        let mut uow = self.begin().await?;
        require_locked_bill(uow.as_mut(), id).await?;
        if let Some(invoice) = uow.find_invoice_by_bill(id).await? {
            return Err(BillingError::Conflict(format!(
                "Bill {} has invoice {} and cannot be deleted",
                id, invoice.invoice_number
            )));
        }
        uow.delete_bill(id).await?;
        uow.commit().await?;

        info!("Bill deleted");
        Ok(())
    }

    /// Adds a pricing period and recomputes the bill totals
    ///
    /// A rejected period leaves the bill untouched.
    #[instrument(skip(self, input, actor), fields(actor = %actor.actor_id, bill_id = %bill_id))]
    pub async fn add_period(
        &self,
        bill_id: BillId,
        input: PeriodInput,
        actor: &ActorContext,
    ) -> Result<BillWithPeriods, BillingError> {
        input.validate()?;

        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), bill_id).await?;
        let period = uow.insert_period(bill_id, &input).await?;
        debug!(period_id = %period.id, "Pricing period added");

        bill.touch(&actor.actor_id, Utc::now());
        let periods = recompute_bill(uow.as_mut(), &mut bill).await?;
        uow.commit().await?;
        Ok(BillWithPeriods { bill, periods })
    }

    /// Replaces a pricing period and recomputes the bill totals
    #[instrument(skip(self, input, actor), fields(actor = %actor.actor_id, bill_id = %bill_id, period_id = %period_id))]
    pub async fn update_period(
        &self,
        bill_id: BillId,
        period_id: PricingPeriodId,
        input: PeriodInput,
        actor: &ActorContext,
    ) -> Result<BillWithPeriods, BillingError> {
        input.validate()?;

        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), bill_id).await?;
        let mut period = require_period(uow.as_mut(), bill_id, period_id).await?;
        period.apply(input, Utc::now());
        uow.update_period(&period).await?;

        bill.touch(&actor.actor_id, Utc::now());
        let periods = recompute_bill(uow.as_mut(), &mut bill).await?;
        uow.commit().await?;
        Ok(BillWithPeriods { bill, periods })
    }

    /// Deletes a pricing period and recomputes the owning bill
    ///
    /// The bill is loaded before the delete so the recomputation runs
    /// against the parent even though the period row is gone.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, bill_id = %bill_id, period_id = %period_id))]
    pub async fn delete_period(
        &self,
        bill_id: BillId,
        period_id: PricingPeriodId,
        actor: &ActorContext,
    ) -> Result<BillWithPeriods, BillingError> {
        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), bill_id).await?;
        require_period(uow.as_mut(), bill_id, period_id).await?;
        uow.delete_period(period_id).await?;

        bill.touch(&actor.actor_id, Utc::now());
        let periods = recompute_bill(uow.as_mut(), &mut bill).await?;
        uow.commit().await?;
        Ok(BillWithPeriods { bill, periods })
    }

    /// Recomputes the bill from its periods and reports the result
    ///
    /// # Errors
    ///
    /// A validation error when the bill has no periods.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, bill_id = %bill_id))]
    pub async fn finalize_bill(&self, bill_id: BillId, actor: &ActorContext) -> Result<FinalizeOutcome, BillingError> {
        let mut uow = self.begin().await?;
        let mut bill = require_locked_bill(uow.as_mut(), bill_id).await?;
        let periods = uow.list_periods(bill_id).await?;
        if periods.is_empty() {
            return Err(BillingError::validation(format!(
                "Bill {} has no pricing periods to finalize",
                bill_id
            )));
        }

        bill.recompute_totals(&periods);
        bill.touch(&actor.actor_id, Utc::now());
        uow.update_bill(&bill).await?;
        uow.commit().await?;

        let summary = FinalizeSummary {
            period_count: periods.len(),
            periods: periods
                .iter()
                .map(|p| PeriodSummary {
                    period_id: p.id,
                    start_day: p.start_day,
                    end_day: p.end_day,
                    period_total: p.period_total(),
                })
                .collect(),
            total_bill: bill.total_bill,
            total_received: bill.total_received,
            total_due: bill.total_due,
        };
        info!(total_bill = %bill.total_bill, periods = summary.period_count, "Bill finalized from periods");
        Ok(FinalizeOutcome {
            success: true,
            message: format!(
                "Bill finalized from {} pricing period(s); total bill {}",
                summary.period_count, summary.total_bill
            ),
            summary,
        })
    }
}

async fn require_period(
    uow: &mut dyn BillingUnitOfWork,
    bill_id: BillId,
    period_id: PricingPeriodId,
) -> Result<PricingPeriod, BillingError> {
    uow.find_period(period_id)
        .await?
        .filter(|p| p.bill_id == bill_id)
        .ok_or_else(|| BillingError::not_found("PricingPeriod", period_id))
}

/// Bill total aggregation step shared by every period and bill mutation
async fn recompute_bill(
    uow: &mut dyn BillingUnitOfWork,
    bill: &mut BillRecord,
) -> Result<Vec<PricingPeriod>, BillingError> {
    let periods = uow.list_periods(bill.id).await?;
    if bill.recompute_totals(&periods) {
        debug!(bill_id = %bill.id, total_bill = %bill.total_bill, total_due = %bill.total_due, "Bill totals recomputed");
    }
    uow.update_bill(bill).await?;
    Ok(periods)
}
