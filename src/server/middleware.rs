use axum::extract::{Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::Instrument;
use uuid::Uuid;

use super::error::{rate_limit_headers, ApiError};
use super::AppState;
use crate::gate::{Decision, RequestIdentity};

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const API_KEY_HEADER: &str = "x-api-key";
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";

#[derive(Clone, Debug)]
pub struct RequestId(pub String);

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request
        .extensions_mut()
        .insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri().path()
    );

    let mut response = next.run(request).instrument(span).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

/// Pull the admission-relevant headers out of a request
pub fn identity_from_headers(headers: &HeaderMap) -> RequestIdentity {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };

    RequestIdentity {
        api_key: header(API_KEY_HEADER),
        forwarded_for: header(FORWARDED_FOR_HEADER),
        real_ip: header(REAL_IP_HEADER),
    }
}

/// API-key check and rate limiting in front of the transcription routes
pub async fn gate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let identity = identity_from_headers(request.headers());

    match state.gate.admit(&identity) {
        Decision::Allowed(status) => {
            let mut response = next.run(request).await;
            response.headers_mut().extend(rate_limit_headers(&status));
            response
        }
        Decision::Denied(denial) => ApiError::from(denial).into_response(),
    }
}
