//! Unified error kinds surfaced by the core (see error handling design).

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    response::Response,
    Json,
};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("order is not cancellable")]
    NotCancellable,

    #[error("insufficient balance")]
    InsufficientBalance,

    #[error("conflicting client order id")]
    ConflictingClientOrderId,

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("authentication required")]
    AuthRequired,

    #[error("invalid authentication")]
    AuthInvalid,

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("not found")]
    NotFound,

    #[error("fatal: {0}")]
    Fatal(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION"),
            AppError::NotCancellable => (StatusCode::BAD_REQUEST, "NOT_CANCELLABLE"),
            AppError::InsufficientBalance => (StatusCode::UNPROCESSABLE_ENTITY, "INSUFFICIENT_BALANCE"),
            AppError::ConflictingClientOrderId => (StatusCode::CONFLICT, "CONFLICTING_CLIENT_ORDER_ID"),
            AppError::RateLimited { .. } => (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED"),
            AppError::AuthRequired => (StatusCode::UNAUTHORIZED, "AUTH_REQUIRED"),
            AppError::AuthInvalid => (StatusCode::UNAUTHORIZED, "AUTH_INVALID"),
            AppError::UpstreamUnavailable(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Fatal(_) => (StatusCode::SERVICE_UNAVAILABLE, "FATAL"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: ErrorDetail,
    timestamp: i64,
}

#[derive(Debug, Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            success: false,
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
            timestamp: chrono::Utc::now().timestamp(),
        };
        let mut response = (status, Json(body)).into_response();
        if let AppError::RateLimited { retry_after_secs } = self {
            if let Ok(value) = HeaderValue::from_str(&retry_after_secs.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
        }
        response
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.to_string())
    }
}
