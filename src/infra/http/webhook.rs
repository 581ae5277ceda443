use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::body::{Body, to_bytes};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use escriba_api_types::{RevalidateRequest, RevalidateResponse};
use metrics::counter;
use tracing::debug;

use crate::application::rate_limit::RateLimiter;
use crate::application::revalidate::{RevalidateError, RevalidationService};
use crate::infra::telemetry::{
    METRIC_REVALIDATE_RATE_LIMITED, METRIC_REVALIDATE_REQUESTS, METRIC_REVALIDATE_UNAUTHORIZED,
};

use super::error::ApiError;

pub const SECRET_HEADER: &str = "x-revalidate-secret";
const MAX_BODY_BYTES: usize = 64 * 1024;
const ANONYMOUS_CALLER: &str = "anonymous";

#[derive(Clone)]
pub struct WebhookState {
    pub limiter: Arc<RateLimiter>,
    pub revalidation: Arc<RevalidationService>,
    /// Requests allowed per caller and window.
    pub max_requests: u32,
    /// Honour `x-forwarded-for`/`x-real-ip` when identifying callers.
    pub trust_forwarded_headers: bool,
}

pub async fn revalidate(State(state): State<WebhookState>, request: Request<Body>) -> Response {
    counter!(METRIC_REVALIDATE_REQUESTS).increment(1);

    let caller = caller_identifier(&request, state.trust_forwarded_headers);
    if !state.limiter.check_and_consume(&caller, state.max_requests) {
        counter!(METRIC_REVALIDATE_RATE_LIMITED).increment(1);
        return ApiError::rate_limited(state.limiter.retry_after_secs(&caller));
    }

    let (payload, malformed) = read_payload(request).await;
    if let Some(problem) = malformed {
        // Unauthorized callers never see parse diagnostics.
        if let Err(err) = state.revalidation.authorize(payload.secret.as_deref()) {
            return reject(err);
        }
        return problem.into_response();
    }

    match state.revalidation.revalidate(&payload).await {
        Ok(outcome) => {
            debug!(
                target = "infra::http::webhook",
                caller = %caller,
                targets = outcome.targets.len(),
                "revalidation accepted"
            );
            Json(RevalidateResponse {
                revalidated: true,
                targets: outcome.targets,
                now: outcome.now,
            })
            .into_response()
        }
        Err(err) => reject(err),
    }
}

pub async fn health() -> StatusCode {
    StatusCode::NO_CONTENT
}

fn reject(err: RevalidateError) -> Response {
    if matches!(err, RevalidateError::Unauthorized) {
        counter!(METRIC_REVALIDATE_UNAUTHORIZED).increment(1);
    }
    ApiError::from(err).into_response()
}

/// Peer address of the connection. With `trust_forwarded_headers`, the first
/// `x-forwarded-for` hop and then `x-real-ip` take precedence over it.
pub fn caller_identifier(request: &Request<Body>, trust_forwarded_headers: bool) -> String {
    if trust_forwarded_headers && let Some(forwarded) = forwarded_caller(request.headers()) {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| ANONYMOUS_CALLER.to_string())
}

fn forwarded_caller(headers: &HeaderMap) -> Option<&str> {
    header_str(headers, "x-forwarded-for")
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .or_else(|| header_str(headers, "x-real-ip").filter(|value| !value.is_empty()))
}

// Merges body, query string and header into one request. Body fields win over
// query fields; the header wins for the secret. A malformed body or query is
// reported alongside whatever could still be read.
async fn read_payload(request: Request<Body>) -> (RevalidateRequest, Option<ApiError>) {
    let (parts, body) = request.into_parts();
    let mut malformed = None;

    let query = match Query::<RevalidateRequest>::try_from_uri(&parts.uri) {
        Ok(Query(query)) => query,
        Err(err) => {
            malformed = Some(ApiError::bad_request(
                "Invalid query string",
                Some(err.body_text()),
            ));
            RevalidateRequest::default()
        }
    };

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => RevalidateRequest::default(),
        Ok(bytes) => match serde_json::from_slice::<RevalidateRequest>(&bytes) {
            Ok(body) => body,
            Err(err) => {
                malformed = Some(ApiError::bad_request(
                    "Request body must be a JSON object",
                    Some(err.to_string()),
                ));
                RevalidateRequest::default()
            }
        },
        Err(err) => {
            malformed = Some(ApiError::bad_request(
                "Request body could not be read",
                Some(err.to_string()),
            ));
            RevalidateRequest::default()
        }
    };

    let mut payload = body.or(query);
    if let Some(secret) = header_str(&parts.headers, SECRET_HEADER).filter(|s| !s.is_empty()) {
        payload.secret = Some(secret.to_string());
    }
    (payload, malformed)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}
