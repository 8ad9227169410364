//! Payment handlers
//!
//! Every write reconciles the invoice in the same transaction; the
//! reconciliation outcome is returned with the stored rows.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{ActorContext, PaymentDetailId, PaymentMasterId};
use domain_billing::{DetailReceipt, PaymentReceipt, PaymentRecord};

use crate::dto::payments::{PaymentDetailRequest, RecordPaymentRequest};
use crate::dto::validated;
use crate::{error::ApiError, AppState};

/// Records a payment master with its initial details
pub async fn record_payment(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<RecordPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentReceipt>), ApiError> {
    let payment = validated(request)?.into_new_payment()?;
    let receipt = state.service.record_payment(payment, &actor).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PaymentRecord>, ApiError> {
    let record = state.service.get_payment(PaymentMasterId::new(id)).await?;
    Ok(Json(record))
}

pub async fn add_payment_detail(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<PaymentDetailRequest>,
) -> Result<(StatusCode, Json<DetailReceipt>), ApiError> {
    let input = validated(request)?.into_input()?;
    let receipt = state
        .service
        .add_payment_detail(PaymentMasterId::new(id), input, &actor)
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn update_payment_detail(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<PaymentDetailRequest>,
) -> Result<Json<DetailReceipt>, ApiError> {
    let input = validated(request)?.into_input()?;
    let receipt = state
        .service
        .update_payment_detail(PaymentDetailId::new(id), input, &actor)
        .await?;
    Ok(Json(receipt))
}
