//! Visual engagement client
//!
//! Adapter for the external pose/face landmark analyzer: audience-facing
//! engagement, movement energy, and posture openness on 0-10 scales.

use serde::Deserialize;
use tracing::debug;

use super::{classify_status, error_body, file_part, AnalyzerError, PipelineAnalyzer};
use crate::types::{PipelineKind, RawMetrics, Submission, VisualMetrics};

/// Client for the visual engagement analyzer.
pub struct VisualAnalyzer {
    http_client: reqwest::Client,
    base_url: String,
}

/// Wire schema of `POST {base}/analyze`.
#[derive(Debug, Clone, Deserialize)]
struct VisualResponse {
    engagement: f64,
    energy: f64,
    /// Omitted when no full-body landmarks were detected.
    posture_openness: Option<f64>,
}

impl From<VisualResponse> for VisualMetrics {
    fn from(wire: VisualResponse) -> Self {
        Self {
            engagement: wire.engagement,
            energy: wire.energy,
            posture_openness: wire.posture_openness,
        }
    }
}

impl VisualAnalyzer {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PipelineAnalyzer for VisualAnalyzer {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Visual
    }

    async fn analyze(&self, submission: &Submission) -> Result<RawMetrics, AnalyzerError> {
        let url = format!("{}/analyze", self.base_url);

        debug!(submission_id = %submission.id, url = %url, "Requesting visual analysis");

        let form = reqwest::multipart::Form::new().part("file", file_part(submission)?);

        let response = self.http_client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, error_body(response).await));
        }

        let wire: VisualResponse = response.json().await?;

        debug!(
            submission_id = %submission.id,
            engagement = wire.engagement,
            energy = wire.energy,
            "Visual analysis complete"
        );

        Ok(RawMetrics::Visual(wire.into()))
    }
}
