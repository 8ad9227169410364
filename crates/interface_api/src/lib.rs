//! HTTP API Layer
//!
//! This crate provides the REST API for the ISP billing core using Axum.
//!
//! # Architecture
//!
//! - **Handlers**: Request handlers per resource (customers, bills, daily amounts, invoices, payments)
//! - **Middleware**: Actor propagation, request ids, tracing, audit logging
//! - **DTOs**: Request/Response data transfer objects with field validation
//! - **Error Handling**: Consistent JSON error responses
//!
//! Authentication happens upstream; the gateway passes the authenticated
//! user in `x-actor-id`.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::create_router;
//!
//! let service = BillingService::new(port, config.billing.clone());
//! let app = create_router(service, config);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod handlers;
pub mod dto;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use domain_billing::BillingService;

use crate::config::ApiConfig;
use crate::handlers::{bills, customers, daily, health, invoices, payments};
use crate::middleware::{actor_middleware, audit_middleware};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: BillingService,
    pub config: ApiConfig,
}

/// Creates the main API router
///
/// # Arguments
///
/// * `service` - Billing service over the configured storage port
/// * `config` - API configuration
///
/// # Returns
///
/// Configured Axum router with all routes and middleware
pub fn create_router(service: BillingService, config: ApiConfig) -> Router {
    let state = AppState { service, config };

    // Public routes
    let public_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check));

    let customer_routes = Router::new()
        .route("/", post(customers::create_customer))
        .route("/:id", get(customers::get_customer));

    let bill_routes = Router::new()
        .route("/", post(bills::create_bill))
        .route(
            "/:id",
            get(bills::get_bill).put(bills::update_bill).delete(bills::delete_bill),
        )
        .route("/:id/status", put(bills::set_bill_status))
        .route("/:id/periods", post(bills::add_period))
        .route(
            "/:id/periods/:period_id",
            put(bills::update_period).delete(bills::delete_period),
        )
        .route("/:id/finalize", post(bills::finalize_bill))
        .route("/:id/daily-amounts/calculate", post(daily::calculate_daily_amounts))
        .route(
            "/:id/daily-amounts",
            get(daily::list_daily_amounts).put(daily::save_daily_amount),
        )
        .route(
            "/:id/invoice",
            post(invoices::generate_invoice).get(invoices::get_bill_invoice),
        );

    let invoice_routes = Router::new()
        .route("/:id", get(invoices::get_invoice))
        .route("/:id/issue", post(invoices::mark_issued))
        .route("/:id/pay", post(invoices::mark_paid))
        .route("/:id/cancel", post(invoices::cancel));

    let payment_routes = Router::new()
        .route("/", post(payments::record_payment))
        .route("/:id", get(payments::get_payment))
        .route("/:id/details", post(payments::add_payment_detail));

    let api_routes = Router::new()
        .nest("/customers", customer_routes)
        .nest("/bills", bill_routes)
        .nest("/invoices", invoice_routes)
        .nest("/payments", payment_routes)
        .route("/payment-details/:id", put(payments::update_payment_detail))
        .layer(axum_middleware::from_fn(audit_middleware))
        .layer(axum_middleware::from_fn(actor_middleware));

    // Combine all routes
    Router::new()
        .merge(public_routes)
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
        .with_state(state)
}
