//! Content evaluation client
//!
//! Adapter for the external content-evaluation service, which transcribes
//! the lecture audio and has a rubric judge score the transcript against
//! the stated topic.
//!
//! **DATA CAPTURED:** judge scores (accuracy, structure), strength and
//! gap lists, and the transcript itself for the response payload.

use serde::Deserialize;
use tracing::debug;

use super::{classify_status, error_body, file_part, AnalyzerError, PipelineAnalyzer};
use crate::types::{ContentMetrics, PipelineKind, RawMetrics, Submission};

/// Client for the content-evaluation analyzer.
pub struct ContentAnalyzer {
    http_client: reqwest::Client,
    base_url: String,
}

/// Wire schema of `POST {base}/evaluate`.
///
/// The judge pre-normalizes its scores to the 0-10 scale; list fields
/// may be omitted by older analyzer builds.
#[derive(Debug, Clone, Deserialize)]
struct ContentResponse {
    accuracy_score: f64,
    structure_score: f64,
    #[serde(default)]
    key_strengths: Vec<String>,
    #[serde(default)]
    missing_concepts: Vec<String>,
    #[serde(default)]
    transcript: String,
}

impl From<ContentResponse> for ContentMetrics {
    fn from(wire: ContentResponse) -> Self {
        Self {
            accuracy_score: wire.accuracy_score,
            structure_score: wire.structure_score,
            key_strengths: wire.key_strengths,
            missing_concepts: wire.missing_concepts,
            transcript: wire.transcript,
        }
    }
}

impl ContentAnalyzer {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PipelineAnalyzer for ContentAnalyzer {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Content
    }

    async fn analyze(&self, submission: &Submission) -> Result<RawMetrics, AnalyzerError> {
        let url = format!("{}/evaluate", self.base_url);

        debug!(
            submission_id = %submission.id,
            url = %url,
            topic = %submission.topic,
            "Requesting content evaluation"
        );

        let form = reqwest::multipart::Form::new()
            .part("file", file_part(submission)?)
            .text("topic", submission.topic.clone());

        let response = self.http_client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, error_body(response).await));
        }

        let wire: ContentResponse = response.json().await?;

        debug!(
            submission_id = %submission.id,
            accuracy = wire.accuracy_score,
            structure = wire.structure_score,
            transcript_chars = wire.transcript.len(),
            "Content evaluation complete"
        );

        Ok(RawMetrics::Content(wire.into()))
    }
}
