//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::jobs::{JobError, JobFailure};
use crate::models::InputError;
use crate::pipeline::extraction::ExtractionError;
use crate::pipeline::structuring::StructuringError;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} is not configured")]
    NotConfigured(&'static str),
    #[error("Upstream service rate limited")]
    UpstreamRateLimited { retry_after: Option<u64> },
    #[error("Upstream error: {0}")]
    Upstream(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Service busy: {0}")]
    Busy(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            ApiError::InvalidInput(detail) => {
                (StatusCode::BAD_REQUEST, "INVALID_INPUT", detail.clone())
            }
            ApiError::NotConfigured(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "NOT_CONFIGURED",
                format!("{what} is not configured on this server"),
            ),
            ApiError::UpstreamRateLimited { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                "UPSTREAM_RATE_LIMITED",
                match retry_after {
                    Some(secs) => format!("Upstream service is rate limited. Retry after {secs}s"),
                    None => "Upstream service is rate limited. Retry later".to_string(),
                },
            ),
            ApiError::Upstream(detail) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", detail.clone())
            }
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, "NOT_FOUND", detail.clone()),
            ApiError::Busy(detail) => (StatusCode::SERVICE_UNAVAILABLE, "BUSY", detail.clone()),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL",
                "An internal error occurred".to_string(),
            ),
        }
    }

    /// Error as recorded against a failed background job.
    pub fn to_failure(&self) -> JobFailure {
        let (_, code, message) = self.parts();
        JobFailure { code, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(detail, "API internal error");
        }
        let (status, code, message) = self.parts();
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };

        let mut response = (status, Json(body)).into_response();
        if let ApiError::UpstreamRateLimited {
            retry_after: Some(secs),
        } = &self
        {
            if let Ok(val) = axum::http::HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert("Retry-After", val);
            }
        }
        response
    }
}

impl From<InputError> for ApiError {
    fn from(err: InputError) -> Self {
        ApiError::InvalidInput(err.to_string())
    }
}

impl From<StructuringError> for ApiError {
    fn from(err: StructuringError) -> Self {
        match err {
            StructuringError::RateLimited { retry_after } => {
                ApiError::UpstreamRateLimited { retry_after }
            }
            StructuringError::UpstreamStatus { status, body } => {
                tracing::warn!(status, body = %body, "Text generation service error");
                ApiError::Upstream(format!("Text generation service returned status {status}"))
            }
            StructuringError::HttpClient(detail) | StructuringError::ResponseParsing(detail) => {
                tracing::warn!(detail = %detail, "Text generation transport error");
                ApiError::Upstream(format!("Text generation service unavailable: {detail}"))
            }
        }
    }
}

impl From<ExtractionError> for ApiError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::InvalidImage(detail) => ApiError::InvalidInput(detail),
            ExtractionError::RateLimited { retry_after } => {
                ApiError::UpstreamRateLimited { retry_after }
            }
            ExtractionError::UpstreamStatus { status, body } => {
                tracing::warn!(status, body = %body, "OCR service error");
                ApiError::Upstream(format!("OCR service returned status {status}"))
            }
            ExtractionError::HttpClient(detail) | ExtractionError::ResponseParsing(detail) => {
                tracing::warn!(detail = %detail, "OCR transport error");
                ApiError::Upstream(format!("OCR service unavailable: {detail}"))
            }
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        ApiError::Busy(err.to_string())
    }
}
