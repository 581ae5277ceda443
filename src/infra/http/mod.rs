mod error;
mod middleware;
mod webhook;

pub use error::ApiError;
pub use middleware::{RequestContext, log_responses, set_request_context};
pub use webhook::{SECRET_HEADER, WebhookState, caller_identifier};

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

/// Routes served by the webhook process.
pub fn build_router(state: WebhookState) -> Router {
    Router::new()
        .route("/api/revalidate", post(webhook::revalidate))
        .route("/health", get(webhook::health))
        .with_state(state)
        .layer(axum_middleware::from_fn(log_responses))
        .layer(axum_middleware::from_fn(set_request_context))
}
