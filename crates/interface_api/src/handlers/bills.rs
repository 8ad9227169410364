//! Bill and pricing period handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{ActorContext, BillId, PricingPeriodId};
use domain_billing::{BillRecord, BillStatus, BillWithPeriods, FinalizeOutcome};

use crate::dto::bills::{CreateBillRequest, PeriodRequest, SetBillStatusRequest, UpdateBillRequest};
use crate::dto::validated;
use crate::{error::ApiError, AppState};

/// Creates a bill; the bill number is assigned in the same transaction
pub async fn create_bill(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<CreateBillRequest>,
) -> Result<(StatusCode, Json<BillRecord>), ApiError> {
    let new_bill = validated(request)?.into_new_bill()?;
    let bill = state.service.create_bill(new_bill, &actor).await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

/// Gets a bill with its pricing periods
pub async fn get_bill(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<BillWithPeriods>, ApiError> {
    let bill = state.service.get_bill(BillId::new(id)).await?;
    Ok(Json(bill))
}

pub async fn update_bill(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateBillRequest>,
) -> Result<Json<BillRecord>, ApiError> {
    let update = validated(request)?.into();
    let bill = state.service.update_bill(BillId::new(id), update, &actor).await?;
    Ok(Json(bill))
}

/// Soft activate/deactivate
pub async fn set_bill_status(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<SetBillStatusRequest>,
) -> Result<Json<BillRecord>, ApiError> {
    let status: BillStatus = validated(request)?.status.parse()?;
    let bill = state.service.set_bill_status(BillId::new(id), status, &actor).await?;
    Ok(Json(bill))
}

/// Deletes a bill with its periods and daily rows
pub async fn delete_bill(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.service.delete_bill(BillId::new(id), &actor).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_period(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<PeriodRequest>,
) -> Result<(StatusCode, Json<BillWithPeriods>), ApiError> {
    let input = validated(request)?.into();
    let bill = state.service.add_period(BillId::new(id), input, &actor).await?;
    Ok((StatusCode::CREATED, Json(bill)))
}

pub async fn update_period(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((id, period_id)): Path<(i64, i64)>,
    Json(request): Json<PeriodRequest>,
) -> Result<Json<BillWithPeriods>, ApiError> {
    let input = validated(request)?.into();
    let bill = state
        .service
        .update_period(BillId::new(id), PricingPeriodId::new(period_id), input, &actor)
        .await?;
    Ok(Json(bill))
}

pub async fn delete_period(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path((id, period_id)): Path<(i64, i64)>,
) -> Result<Json<BillWithPeriods>, ApiError> {
    let bill = state
        .service
        .delete_period(BillId::new(id), PricingPeriodId::new(period_id), &actor)
        .await?;
    Ok(Json(bill))
}

/// Recomputes the bill from its periods and returns the summary
pub async fn finalize_bill(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
) -> Result<Json<FinalizeOutcome>, ApiError> {
    let outcome = state.service.finalize_bill(BillId::new(id), &actor).await?;
    Ok(Json(outcome))
}
