//! Customer handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use core_kernel::{ActorContext, CustomerId};
use domain_billing::Customer;

use crate::dto::{customers::CreateCustomerRequest, validated};
use crate::{error::ApiError, AppState};

/// Registers a customer and assigns its customer number
pub async fn create_customer(
    State(state): State<AppState>,
    Extension(actor): Extension<ActorContext>,
    Json(request): Json<CreateCustomerRequest>,
) -> Result<(StatusCode, Json<Customer>), ApiError> {
    let request = validated(request)?;
    let customer = state.service.create_customer(request.into(), &actor).await?;
    Ok((StatusCode::CREATED, Json(customer)))
}

/// Gets a customer by ID
pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Customer>, ApiError> {
    let customer = state.service.get_customer(CustomerId::new(id)).await?;
    Ok(Json(customer))
}
