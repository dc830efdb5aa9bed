//! Prosody analysis client
//!
//! Adapter for the external audio feature extractor: speaking pace,
//! silence fraction, and pitch variability for the delivery score.

use serde::Deserialize;
use tracing::debug;

use super::{classify_status, error_body, file_part, AnalyzerError, PipelineAnalyzer};
use crate::types::{AcousticMetrics, PipelineKind, RawMetrics, Submission};

/// Client for the prosody analyzer.
pub struct AcousticAnalyzer {
    http_client: reqwest::Client,
    base_url: String,
}

/// Wire schema of `POST {base}/analyze`.
#[derive(Debug, Clone, Deserialize)]
struct AcousticResponse {
    pace_bpm: f64,
    silence_ratio: f64,
    /// Present only when the extractor build includes pitch tracking.
    pitch_variability: Option<f64>,
}

impl From<AcousticResponse> for AcousticMetrics {
    fn from(wire: AcousticResponse) -> Self {
        Self {
            pace_bpm: wire.pace_bpm,
            silence_ratio: wire.silence_ratio,
            pitch_variability: wire.pitch_variability,
        }
    }
}

impl AcousticAnalyzer {
    pub fn new(http_client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl PipelineAnalyzer for AcousticAnalyzer {
    fn kind(&self) -> PipelineKind {
        PipelineKind::Acoustic
    }

    async fn analyze(&self, submission: &Submission) -> Result<RawMetrics, AnalyzerError> {
        let url = format!("{}/analyze", self.base_url);

        debug!(submission_id = %submission.id, url = %url, "Requesting prosody analysis");

        let form = reqwest::multipart::Form::new().part("file", file_part(submission)?);

        let response = self.http_client.post(&url).multipart(form).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(status, error_body(response).await));
        }

        let wire: AcousticResponse = response.json().await?;

        debug!(
            submission_id = %submission.id,
            pace_bpm = wire.pace_bpm,
            silence_ratio = wire.silence_ratio,
            "Prosody analysis complete"
        );

        Ok(RawMetrics::Acoustic(wire.into()))
    }
}
