use axum::Json;
use axum::http::{HeaderValue, StatusCode, header::RETRY_AFTER};
use axum::response::{IntoResponse, Response};
use escriba_api_types::{ApiErrorBody, ApiErrorMessage, codes};

use crate::application::error::ErrorReport;
use crate::application::revalidate::RevalidateError;

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn invalid_input(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::INVALID_INPUT, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Invalid revalidation secret",
            None,
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn rate_limited(retry_after: u64) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: codes::RATE_LIMITED.to_string(),
                message: "Rate limit exceeded".to_string(),
                hint: Some(format!("Retry after {retry_after} seconds")),
            },
        };
        let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
        ErrorReport::from_message(
            "infra::http::webhook::rate_limit",
            StatusCode::TOO_MANY_REQUESTS,
            format!("rate_limited: retry_after={retry_after}"),
        )
        .attach(&mut response);
        response
    }
}

impl From<RevalidateError> for ApiError {
    fn from(err: RevalidateError) -> Self {
        match err {
            RevalidateError::Unauthorized => ApiError::unauthorized(),
            RevalidateError::MissingTarget => ApiError::bad_request(
                "Nothing to revalidate",
                Some("provide `path`, `tag` or `type`".to_string()),
            ),
            err @ RevalidateError::UnknownType { .. } => {
                ApiError::invalid_input("Unknown content type", Some(err.to_string()))
            }
            err @ RevalidateError::InvalidInput { .. } => {
                ApiError::invalid_input("Invalid revalidation target", Some(err.to_string()))
            }
            RevalidateError::Collaborator { target, source } => ApiError::new(
                StatusCode::BAD_GATEWAY,
                codes::REVALIDATION_FAILED,
                "Revalidation failed",
                Some(format!("{target:?}: {source}")),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let hint = self.hint.clone();
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        ErrorReport::from_message(
            "infra::http::webhook",
            self.status,
            format!("{}: {}", self.code, hint.as_deref().unwrap_or(self.message)),
        )
        .attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::revalidate::RevalidatorError;
    use escriba_api_types::RevalidationTarget;

    #[test]
    fn revalidate_errors_map_to_stable_codes() {
        let cases = [
            (RevalidateError::Unauthorized, StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED),
            (RevalidateError::MissingTarget, StatusCode::BAD_REQUEST, codes::BAD_REQUEST),
            (
                RevalidateError::UnknownType {
                    value: "news".to_string(),
                },
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
            ),
            (
                RevalidateError::Collaborator {
                    target: RevalidationTarget::Tag("blog".to_string()),
                    source: RevalidatorError::Status { status: 500 },
                },
                StatusCode::BAD_GATEWAY,
                codes::REVALIDATION_FAILED,
            ),
        ];
        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn rate_limited_sets_retry_after() {
        let response = ApiError::rate_limited(60);
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            response.headers().get(RETRY_AFTER).and_then(|v| v.to_str().ok()),
            Some("60")
        );
        assert!(response.extensions().get::<ErrorReport>().is_some());
    }
}
