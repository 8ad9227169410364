//! Daily amount handlers

use axum::{
    extract::{Path, State},
    Extension, Json,
};

use core_kernel::{ActorContext, BillId};
use domain_billing::DailyBillAmount;

use crate::dto::daily::{CalculateDailyRequest, CalculateDailyResponse, DailyAmountsResponse, SaveDailyAmountRequest};
use crate::dto::validated;
use crate::{error::ApiError, AppState};

/// Calculates daily rows over the bill's date range
///
/// Per-day failures are reported in the body; the request still succeeds.
pub async fn calculate_daily_amounts(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    request: Option<Json<CalculateDailyRequest>>,
) -> Result<Json<CalculateDailyResponse>, ApiError> {
    let bill_id = BillId::new(id);
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let report = state
        .service
        .calculate_daily_amounts(bill_id, request.recalculate, &actor)
        .await?;
    Ok(Json(CalculateDailyResponse { bill_id, report }))
}

pub async fn list_daily_amounts(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<DailyAmountsResponse>, ApiError> {
    let bill_id = BillId::new(id);
    let items = state.service.list_daily_amounts(bill_id).await?;
    Ok(Json(DailyAmountsResponse::new(bill_id, items)))
}

/// Creates or updates the row for one date
pub async fn save_daily_amount(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<SaveDailyAmountRequest>,
) -> Result<Json<DailyBillAmount>, ApiError> {
    let input = validated(request)?.into();
    let saved = state.service.save_daily_amount(BillId::new(id), input, &actor).await?;
    Ok(Json(saved))
}
