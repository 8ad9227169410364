//! API middleware

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use chrono::Utc;
use tracing::{info, warn};

use core_kernel::ActorContext;

/// Header set by the upstream authentication gateway
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Header carrying the request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const ANONYMOUS: &str = "anonymous";

/// Actor middleware
///
/// Builds the `ActorContext` for the request from the gateway headers and
/// stores it in the request extensions. The request id becomes the
/// correlation id.
pub async fn actor_middleware(mut request: Request<Body>, next: Next) -> Response {
    let actor_id = request
        .headers()
        .get(ACTOR_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string);

    let actor_id = match actor_id {
        Some(id) => id,
        None => {
            warn!(uri = %request.uri(), "Request without actor header");
            ANONYMOUS.to_string()
        }
    };

    let mut actor = ActorContext::new(actor_id);
    if let Some(request_id) = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|h| h.to_str().ok())
    {
        actor = actor.with_correlation_id(request_id);
    }

    request.extensions_mut().insert(actor);
    next.run(request).await
}

/// Audit logging middleware
///
/// Logs all API requests for compliance and debugging
pub async fn audit_middleware(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let (actor_id, correlation_id) = request
        .extensions()
        .get::<ActorContext>()
        .map(|a| (a.actor_id.clone(), a.correlation_id.clone().unwrap_or_default()))
        .unwrap_or_else(|| (ANONYMOUS.to_string(), String::new()));

    let start = Utc::now();

    let response = next.run(request).await;

    let duration = Utc::now() - start;
    let status = response.status();

    info!(
        method = %method,
        uri = %uri,
        actor = %actor_id,
        request_id = %correlation_id,
        status = %status.as_u16(),
        duration_ms = duration.num_milliseconds(),
        "API request"
    );

    response
}
