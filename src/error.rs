//! Request-level error taxonomy and its HTTP mapping
//!
//! Per-pipeline failures never appear here: they degrade the aggregate
//! through reweighting instead. An `ApiError` means the request as a
//! whole produced no report.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Upload exceeds the configured size limit. Checked before any
    /// pipeline work starts.
    #[error("upload exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    /// Upload is missing, empty, or not a recognizable video container.
    #[error("unsupported upload: {0}")]
    UnsupportedUpload(String),

    /// Malformed request envelope (bad multipart framing and the like).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The overall deadline expired before any pipeline completed.
    #[error("evaluation deadline exceeded before any pipeline completed")]
    DeadlineExceeded,

    /// Every pipeline failed; there is no score to report.
    #[error("all analysis pipelines failed: {0}")]
    EvaluationFailed(String),

    /// Unexpected internal fault.
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::UnsupportedUpload(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
            ApiError::EvaluationFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.to_string();

        if status.is_server_error() {
            tracing::error!(status = %status, %detail, "Request failed");
        } else {
            tracing::debug!(status = %status, %detail, "Request rejected");
        }

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
