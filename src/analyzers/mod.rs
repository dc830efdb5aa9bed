//! Pipeline adapters: uniform clients for the three external analyzers
//!
//! Each adapter wraps one slow analysis service behind the same narrow
//! trait. Adapters translate transport and protocol failures into the
//! shared taxonomy and nothing more -- deadlines and retries belong to
//! the call supervisor, weighting to the aggregator.

pub mod acoustic;
pub mod content;
pub mod visual;

pub use acoustic::AcousticAnalyzer;
pub use content::ContentAnalyzer;
pub use visual::VisualAnalyzer;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{FailureKind, PipelineKind, RawMetrics, Submission};

/// Errors one analyzer call can surface.
#[derive(Debug, Error)]
pub enum AnalyzerError {
    /// Could not reach the analyzer (connect, reset, interrupted body).
    #[error("transport failure: {0}")]
    Transport(String),

    /// Analyzer reachable but refusing service right now.
    #[error("analyzer unavailable (HTTP {status}): {message}")]
    Unavailable { status: u16, message: String },

    /// Analyzer rejected the submission itself. Retrying cannot help.
    #[error("analyzer rejected submission: {0}")]
    Rejected(String),

    /// Analyzer answered outside its documented contract.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

impl AnalyzerError {
    /// Whether the supervisor may retry after this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AnalyzerError::Transport(_) | AnalyzerError::Unavailable { .. }
        )
    }

    pub fn failure_kind(&self) -> FailureKind {
        match self {
            AnalyzerError::Transport(_) => FailureKind::Transport,
            AnalyzerError::Unavailable { .. } => FailureKind::Unavailable,
            AnalyzerError::Rejected(_) => FailureKind::Rejected,
            AnalyzerError::Protocol(_) => FailureKind::Protocol,
        }
    }
}

impl From<reqwest::Error> for AnalyzerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() || err.is_builder() {
            AnalyzerError::Protocol(err.to_string())
        } else {
            AnalyzerError::Transport(err.to_string())
        }
    }
}

/// Uniform surface over the three analysis pipelines.
///
/// Implementations run exactly one attempt per call: no internal retry,
/// no internal deadline, no knowledge of weights.
#[async_trait]
pub trait PipelineAnalyzer: Send + Sync {
    /// Which pipeline this adapter serves.
    fn kind(&self) -> PipelineKind;

    /// Run one analysis attempt against the external service.
    async fn analyze(&self, submission: &Submission) -> Result<RawMetrics, AnalyzerError>;
}

/// Map an analyzer's HTTP error status onto the shared taxonomy.
///
/// 429 and gateway-class statuses are worth retrying; the 4xx statuses
/// that blame the submission are not.
pub(crate) fn classify_status(status: reqwest::StatusCode, body: String) -> AnalyzerError {
    match status.as_u16() {
        429 | 502 | 503 | 504 => AnalyzerError::Unavailable {
            status: status.as_u16(),
            message: body,
        },
        400 | 413 | 415 | 422 => AnalyzerError::Rejected(body),
        code => AnalyzerError::Protocol(format!("unexpected HTTP {}: {}", code, body)),
    }
}

/// Multipart file part carrying the submission payload.
///
/// `Bytes` makes the clone cheap, so three concurrent uploads share one
/// buffer.
pub(crate) fn file_part(submission: &Submission) -> Result<reqwest::multipart::Part, AnalyzerError> {
    let part = reqwest::multipart::Part::stream(reqwest::Body::from(submission.payload.clone()))
        .file_name(submission.file_name.clone())
        .mime_str(&submission.content_type)?;
    Ok(part)
}

/// Read an error body for diagnostics without failing the translation.
pub(crate) async fn error_body(response: reqwest::Response) -> String {
    response
        .text()
        .await
        .unwrap_or_else(|_| "unreadable error body".to_string())
}
