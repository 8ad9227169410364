//! Invoice handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{ActorContext, BillId, InvoiceId};
use domain_billing::Invoice;

use crate::dto::invoices::{GenerateInvoiceRequest, MarkPaidRequest};
use crate::dto::validated;
use crate::{error::ApiError, AppState};

/// Generates the invoice for a bill
pub async fn generate_invoice(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    Json(request): Json<GenerateInvoiceRequest>,
) -> Result<(StatusCode, Json<Invoice>), ApiError> {
    let request = validated(request)?.into_request()?;
    let invoice = state.service.generate_invoice(BillId::new(id), request, &actor).await?;
    Ok((StatusCode::CREATED, Json(invoice)))
}

/// Gets the invoice generated for a bill
pub async fn get_bill_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    state
        .service
        .get_invoice_for_bill(BillId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No invoice for bill {}", id)))
}

/// Gets an invoice with its items
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = state.service.get_invoice(InvoiceId::new(id)).await?;
    Ok(Json(invoice))
}

pub async fn mark_issued(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = state.service.mark_invoice_issued(InvoiceId::new(id), &actor).await?;
    Ok(Json(invoice))
}

pub async fn mark_paid(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
    request: Option<Json<MarkPaidRequest>>,
) -> Result<Json<Invoice>, ApiError> {
    let request = validated(request.map(|Json(r)| r).unwrap_or_default())?;
    let invoice = state
        .service
        .mark_invoice_paid(InvoiceId::new(id), request.amount, &actor)
        .await?;
    Ok(Json(invoice))
}

pub async fn cancel(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<i64>,
) -> Result<Json<Invoice>, ApiError> {
    let invoice = state.service.cancel_invoice(InvoiceId::new(id), &actor).await?;
    Ok(Json(invoice))
}
