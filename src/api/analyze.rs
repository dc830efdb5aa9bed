//! Lecture evaluation endpoint
//!
//! POST /analyze accepts a multipart form with a video `file` and an
//! optional `topic`, fans the recording out to the three analyzer
//! pipelines, and returns the combined report. Partial pipeline
//! failures degrade the response; only a fully failed evaluation is an
//! error.

use std::sync::Arc;

use axum::{
    extract::multipart::{Multipart, MultipartRejection},
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::services::aggregator::AggregateError;
use crate::services::assembler::{assemble, AnalyzeResponse};
use crate::types::{OutcomeSet, PipelineOutcome, Submission};
use crate::AppState;

/// Fields collected from the upload form.
struct UploadForm {
    file_name: String,
    /// Content type as declared by the client. Informational only; the
    /// payload is sniffed before acceptance.
    declared_type: Option<String>,
    payload: Bytes,
    topic: Option<String>,
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let upload = read_form(multipart, state.config.upload_max_bytes).await?;

    let mime = ensure_video(&upload.file_name, &upload.payload)?;
    if let Some(declared) = upload.declared_type.as_deref() {
        if declared != mime {
            debug!(
                declared = %declared,
                sniffed = %mime,
                "Declared content type disagrees with sniffed type"
            );
        }
    }

    let topic = upload
        .topic
        .unwrap_or_else(|| state.config.default_topic.clone());
    let submission = Arc::new(Submission::new(
        topic,
        upload.file_name,
        mime,
        upload.payload,
    ));
    info!(
        submission_id = %submission.id,
        file = %submission.file_name,
        payload_bytes = submission.payload.len(),
        topic = %submission.topic,
        "Accepted lecture submission"
    );

    let outcomes = state.orchestrator.evaluate(Arc::clone(&submission)).await;
    let scores = state.normalizer.normalize(&outcomes);
    let result = state.aggregator.aggregate(scores).map_err(|err| match err {
        AggregateError::NoUsablePipelines => all_failed_error(&outcomes),
        other => ApiError::Internal(anyhow::anyhow!(other)),
    })?;

    let response = assemble(submission.id, &result);
    info!(
        submission_id = %submission.id,
        overall_score = response.overall_score,
        missing = response.missing_pipelines.len(),
        "Evaluation complete"
    );
    Ok(Json(response))
}

/// Drain the multipart form, enforcing the upload size limit on the
/// file field as it is read.
async fn read_form(mut multipart: Multipart, limit: usize) -> Result<UploadForm, ApiError> {
    let mut file: Option<(String, Option<String>, Bytes)> = None;
    let mut topic: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let declared_type = field.content_type().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                        ApiError::PayloadTooLarge { limit }
                    } else {
                        ApiError::BadRequest(e.body_text())
                    }
                })?;
                if bytes.len() > limit {
                    return Err(ApiError::PayloadTooLarge { limit });
                }
                if bytes.is_empty() {
                    return Err(ApiError::UnsupportedUpload(
                        "uploaded file is empty".to_string(),
                    ));
                }
                file = Some((file_name, declared_type, bytes));
            }
            "topic" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.body_text()))?;
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    topic = Some(trimmed.to_string());
                }
            }
            other => {
                debug!(field = other, "Ignoring unrecognized form field");
            }
        }
    }

    let (file_name, declared_type, payload) = file.ok_or_else(|| {
        ApiError::UnsupportedUpload("form is missing the 'file' field".to_string())
    })?;

    Ok(UploadForm {
        file_name,
        declared_type,
        payload,
        topic,
    })
}

/// Sniff the payload and require a video container. Returns the
/// detected MIME type.
fn ensure_video(file_name: &str, payload: &[u8]) -> Result<&'static str, ApiError> {
    match infer::get(payload) {
        Some(kind) if kind.matcher_type() == infer::MatcherType::Video => Ok(kind.mime_type()),
        Some(kind) => Err(ApiError::UnsupportedUpload(format!(
            "expected a video upload, got {}",
            kind.mime_type()
        ))),
        None => Err(ApiError::UnsupportedUpload(format!(
            "'{}' is not a recognizable media file",
            file_name
        ))),
    }
}

/// Error for an evaluation where no pipeline produced a usable score.
/// A unanimous timeout maps to 504; any other mix is reported as a
/// failed evaluation with a per-pipeline summary.
fn all_failed_error(outcomes: &OutcomeSet) -> ApiError {
    let all_timed_out = outcomes
        .iter()
        .all(|(_, outcome)| matches!(outcome, PipelineOutcome::TimedOut));
    if all_timed_out {
        return ApiError::DeadlineExceeded;
    }

    let summary = outcomes
        .iter()
        .map(|(pipeline, outcome)| match outcome {
            PipelineOutcome::TimedOut => format!("{} timed out", pipeline),
            PipelineOutcome::Failed { kind, message } => {
                format!("{} failed ({}): {}", pipeline, kind, message)
            }
            PipelineOutcome::Success(_) => format!("{} succeeded", pipeline),
        })
        .collect::<Vec<_>>()
        .join("; ");
    ApiError::EvaluationFailed(summary)
}

/// Build evaluation routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FailureKind, RawMetrics, VisualMetrics};

    fn fake_mp4() -> Vec<u8> {
        let mut bytes = vec![0x00, 0x00, 0x00, 0x18];
        bytes.extend_from_slice(b"ftypisom");
        bytes.extend_from_slice(&[0x00, 0x00, 0x02, 0x00]);
        bytes.extend_from_slice(b"isommp41");
        bytes.resize(256, 0);
        bytes
    }

    #[test]
    fn test_ensure_video_accepts_mp4() {
        let mime = ensure_video("lecture.mp4", &fake_mp4()).unwrap();
        assert_eq!(mime, "video/mp4");
    }

    #[test]
    fn test_ensure_video_rejects_image() {
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        let err = ensure_video("slide.png", &png).unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("image/png"));
    }

    #[test]
    fn test_ensure_video_rejects_unrecognized_bytes() {
        let err = ensure_video("notes.txt", b"just some plain text").unwrap_err();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(err.to_string().contains("notes.txt"));
    }

    #[test]
    fn test_unanimous_timeout_maps_to_gateway_timeout() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::TimedOut,
            acoustic: PipelineOutcome::TimedOut,
            visual: PipelineOutcome::TimedOut,
        };
        let err = all_failed_error(&outcomes);
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    #[test]
    fn test_mixed_failures_map_to_internal_error_with_summary() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::TimedOut,
            acoustic: PipelineOutcome::Failed {
                kind: FailureKind::Unavailable,
                message: "503 from analyzer".to_string(),
            },
            visual: PipelineOutcome::TimedOut,
        };
        let err = all_failed_error(&outcomes);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let detail = err.to_string();
        assert!(detail.contains("content timed out"));
        assert!(detail.contains("503 from analyzer"));
    }

    #[test]
    fn test_zero_weight_success_still_reported_in_summary() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::TimedOut,
            acoustic: PipelineOutcome::TimedOut,
            visual: PipelineOutcome::Success(RawMetrics::Visual(VisualMetrics {
                engagement: 7.0,
                energy: 8.0,
                posture_openness: None,
            })),
        };
        let err = all_failed_error(&outcomes);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("visual succeeded"));
    }
}
