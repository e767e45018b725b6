use axum::{
    extract::multipart::{MultipartError, MultipartRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::application::dto::ErrorResponse;
use crate::domain::errors::DomainError;

/// Client faults become 400, anything the detector raises becomes 500.
/// Malformed or oversized multipart bodies keep the status axum assigns them
/// (400, 413). All carry a `{"detail": ...}` body.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Upload(StatusCode, String),
    Detection(DomainError),
}

impl From<DomainError> for ApiError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Detection(other),
        }
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        ApiError::Upload(e.status(), e.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        ApiError::Upload(e.status(), e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Upload(status, msg) => (status, msg),
            ApiError::Detection(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("Detection failed: {}", e))
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
