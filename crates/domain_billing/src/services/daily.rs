use chrono::Utc;
use tracing::{info, instrument, warn};

use core_kernel::{ActorContext, BillId};

use super::{require_bill, require_locked_bill, BillingService};
use crate::daily::{resolve_period, DailyAmountInput, DailyBillAmount, DailyCalculationReport};
use crate::error::BillingError;

impl BillingService {
    /// Materialises one daily row per day of the bill's range
    ///
    /// Days already stored are skipped unless `recalculate` is set, in which
    /// case their period link is refreshed and the save rule re-applied.
    /// A day that cannot be matched to exactly one period or cannot be
    /// calculated is recorded in the report and the run continues.
    ///
    /// # Errors
    ///
    /// Only whole-run failures: unknown bill, a bill without start date, or
    /// a storage error.
    #[instrument(skip(self, actor), fields(actor = %actor.actor_id, bill_id = %bill_id))]
    pub async fn calculate_daily_amounts(
        &self,
        bill_id: BillId,
        recalculate: bool,
        actor: &ActorContext,
    ) -> Result<DailyCalculationReport, BillingError> {
        let mut uow = self.begin().await?;
        let bill = require_locked_bill(uow.as_mut(), bill_id).await?;
        let range = bill.billing_range()?;
        let periods = uow.list_periods(bill_id).await?;

        let mut report = DailyCalculationReport::default();
        for date in range.days() {
            let period = match resolve_period(&periods, date) {
                Ok(period) => period,
                Err(err) => {
                    warn!(%date, error = %err, "Skipping day");
                    report.record_error(date, &err);
                    continue;
                }
            };

            match uow.find_daily_amount(bill_id, date).await? {
                Some(_) if !recalculate => {}
                Some(mut existing) => match existing.refresh(&bill, period) {
                    Ok(()) => {
                        existing.updated_at = Utc::now();
                        uow.update_daily_amount(&existing).await?;
                        report.updated_count += 1;
                    }
                    Err(err) => {
                        warn!(%date, error = %err, "Daily recalculation failed");
                        report.record_error(date, &err);
                    }
                },
                None => match DailyAmountInput::calculated(date).into_new(&bill, period) {
                    Ok(new) => {
                        uow.insert_daily_amount(&new).await?;
                        report.created_count += 1;
                    }
                    Err(err) => {
                        warn!(%date, error = %err, "Daily calculation failed");
                        report.record_error(date, &err);
                    }
                },
            }
        }
        uow.commit().await?;

        info!(
            created = report.created_count,
            updated = report.updated_count,
            errors = report.errors.len(),
            "Daily amounts calculated"
        );
        Ok(report)
    }

    /// Creates or updates the row for one (bill, date)
    ///
    /// The covering period is linked when exactly one period covers the
    /// date; otherwise the row falls back to flat mode.
    #[instrument(skip(self, input, actor), fields(actor = %actor.actor_id, bill_id = %bill_id, date = %input.date))]
    pub async fn save_daily_amount(
        &self,
        bill_id: BillId,
        input: DailyAmountInput,
        actor: &ActorContext,
    ) -> Result<DailyBillAmount, BillingError> {
        input.validate()?;

        let mut uow = self.begin().await?;
        let bill = require_bill(uow.as_mut(), bill_id).await?;
        let periods = uow.list_periods(bill_id).await?;
        let period = resolve_period(&periods, input.date).ok().flatten();

        let saved = match uow.find_daily_amount(bill_id, input.date).await? {
            Some(mut existing) => {
                input.apply_to(&mut existing, Utc::now());
                existing.refresh(&bill, period)?;
                uow.update_daily_amount(&existing).await?;
                existing
            }
            None => {
                let new = input.into_new(&bill, period)?;
                uow.insert_daily_amount(&new).await?
            }
        };
        uow.commit().await?;
        Ok(saved)
    }

    /// Daily rows of a bill, ordered by date
    pub async fn list_daily_amounts(&self, bill_id: BillId) -> Result<Vec<DailyBillAmount>, BillingError> {
        let mut uow = self.begin().await?;
        require_bill(uow.as_mut(), bill_id).await?;
        uow.list_daily_amounts(bill_id).await
    }
}
