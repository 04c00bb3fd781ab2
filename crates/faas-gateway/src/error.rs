//! HTTP mapping for the shared [`FaasError`] taxonomy.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use faas_common::FaasError;
use serde::Serialize;

/// Wraps a [`FaasError`] so it can be returned directly from an axum handler.
#[derive(Debug)]
pub struct ApiError(pub FaasError);

impl From<FaasError> for ApiError {
    fn from(e: FaasError) -> Self {
        ApiError(e)
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // `NotImplemented` carries a plain-text body per the error table in
        // §6 ("(text)"), not the `{"error", "message"}` JSON shape the other
        // kinds use.
        if let FaasError::NotImplemented(msg) = &self.0 {
            return (StatusCode::NOT_IMPLEMENTED, msg.clone()).into_response();
        }

        let (status, code) = match &self.0 {
            FaasError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            FaasError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            FaasError::Docker(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DOCKER_ERROR"),
            FaasError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_SERVER_ERROR"),
            FaasError::Unknown(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UNKNOWN_ERROR"),
            FaasError::NotImplemented(_) => unreachable!("handled above"),
        };

        let body = ErrorBody {
            error: code,
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
