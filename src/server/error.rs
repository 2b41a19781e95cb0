use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::gate::{Denial, RateLimitStatus};
use crate::TranscrifyError;

pub const RATE_LIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const RATE_LIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const RATE_LIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

#[derive(Debug)]
pub enum ApiError {
    BadRequest { message: String },
    Unauthorized { message: String },
    Forbidden { message: String },
    RateLimited { message: String, status: RateLimitStatus },
    Internal { message: String },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { message } => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Unauthorized { message } => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Forbidden { message } => {
                (StatusCode::FORBIDDEN, Json(json!({ "error": message }))).into_response()
            }
            ApiError::RateLimited { message, status } => {
                let mut headers = rate_limit_headers(&status);
                headers.insert(RETRY_AFTER, HeaderValue::from(status.retry_after_seconds));
                headers.insert(RATE_LIMIT_RESET, HeaderValue::from(status.reset_epoch_seconds()));

                (
                    StatusCode::TOO_MANY_REQUESTS,
                    headers,
                    Json(json!({
                        "error": message,
                        "retry_after_seconds": status.retry_after_seconds,
                    })),
                )
                    .into_response()
            }
            ApiError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": message })),
            )
                .into_response(),
        }
    }
}

/// `X-RateLimit-Limit` / `X-RateLimit-Remaining` for any gated response
pub fn rate_limit_headers(status: &RateLimitStatus) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(RATE_LIMIT_LIMIT, HeaderValue::from(status.limit));
    headers.insert(RATE_LIMIT_REMAINING, HeaderValue::from(status.remaining));
    headers
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        let message = denial.message();
        match denial {
            Denial::MissingApiKey => ApiError::Unauthorized { message },
            Denial::InvalidApiKey => ApiError::Forbidden { message },
            Denial::RateLimited(status) => ApiError::RateLimited { message, status },
        }
    }
}

impl From<TranscrifyError> for ApiError {
    fn from(error: TranscrifyError) -> Self {
        let message = error.to_string();
        match error {
            TranscrifyError::InvalidRequest(_) => ApiError::BadRequest { message },
            _ => ApiError::Internal { message },
        }
    }
}
