//! Core types for lecture evaluation
//!
//! Domain values shared by the orchestration and scoring layers: the
//! submission itself, raw analyzer measurements, per-pipeline outcomes,
//! and the normalized/aggregated score shapes.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three evaluation pipelines.
///
/// This is a closed set: adding a pipeline means touching the types, the
/// normalizer, and the aggregator together, and the compiler checks all
/// of them. There is no runtime registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineKind {
    Content,
    Acoustic,
    Visual,
}

impl PipelineKind {
    /// Name used in logs and internal diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::Content => "content",
            PipelineKind::Acoustic => "acoustic",
            PipelineKind::Visual => "visual",
        }
    }

    /// Key used in the response JSON. The acoustic pipeline has always
    /// been published under `audio`.
    pub fn wire_name(&self) -> &'static str {
        match self {
            PipelineKind::Content => "content",
            PipelineKind::Acoustic => "audio",
            PipelineKind::Visual => "visual",
        }
    }
}

impl std::fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One accepted upload, immutable for the lifetime of its request.
///
/// The payload is reference-counted so the three pipeline adapters can
/// stream the same bytes concurrently without copying them.
#[derive(Debug, Clone)]
pub struct Submission {
    pub id: Uuid,
    pub topic: String,
    pub file_name: String,
    pub content_type: String,
    pub payload: Bytes,
    pub received_at: DateTime<Utc>,
}

impl Submission {
    pub fn new(
        topic: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        payload: Bytes,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic: topic.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Judge output for the spoken-content pipeline. Scores are on the
/// analyzer's own 0-10 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentMetrics {
    pub accuracy_score: f64,
    pub structure_score: f64,
    pub key_strengths: Vec<String>,
    pub missing_concepts: Vec<String>,
    pub transcript: String,
}

/// Prosody measurements from the audio feature extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcousticMetrics {
    /// Speaking pace in beats per minute.
    pub pace_bpm: f64,
    /// Fraction of the recording spent in silence, 0.0 to 1.0.
    pub silence_ratio: f64,
    /// Pitch variability (f0 standard deviation, Hz). Not every
    /// extractor build reports it.
    pub pitch_variability: Option<f64>,
}

/// Engagement measurements from the pose/face extractor, 0-10 scales.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualMetrics {
    pub engagement: f64,
    pub energy: f64,
    pub posture_openness: Option<f64>,
}

/// Raw measurements from one pipeline.
///
/// Closed tagged union; the scoring core matches on it exhaustively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "pipeline", rename_all = "lowercase")]
pub enum RawMetrics {
    Content(ContentMetrics),
    Acoustic(AcousticMetrics),
    Visual(VisualMetrics),
}

impl RawMetrics {
    pub fn kind(&self) -> PipelineKind {
        match self {
            RawMetrics::Content(_) => PipelineKind::Content,
            RawMetrics::Acoustic(_) => PipelineKind::Acoustic,
            RawMetrics::Visual(_) => PipelineKind::Visual,
        }
    }
}

/// Why a pipeline failed outright, after any retries were spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// Could not reach the analyzer at all.
    Transport,
    /// Analyzer reachable but refusing service.
    Unavailable,
    /// Analyzer rejected the submission as malformed or unsupported.
    Rejected,
    /// Analyzer answered outside its documented contract.
    Protocol,
    /// Task-level fault inside this service.
    Internal,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Transport => "transport",
            FailureKind::Unavailable => "unavailable",
            FailureKind::Rejected => "rejected",
            FailureKind::Protocol => "protocol",
            FailureKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result of one supervised pipeline call.
///
/// Exactly one per pipeline per submission. `TimedOut` is deliberately
/// separate from `Failed`: a timeout is never retried, and deadline
/// problems must stay visible as such downstream.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// Analyzer returned a usable metrics payload.
    Success(RawMetrics),
    /// Analyzer failed outright; retries (if any) are already spent.
    Failed { kind: FailureKind, message: String },
    /// The per-call or overall deadline expired first.
    TimedOut,
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }
}

/// The three pipeline outcomes for one submission, one named slot each.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeSet {
    pub content: PipelineOutcome,
    pub acoustic: PipelineOutcome,
    pub visual: PipelineOutcome,
}

impl OutcomeSet {
    /// Slots in canonical order: content, acoustic, visual.
    pub fn iter(&self) -> impl Iterator<Item = (PipelineKind, &PipelineOutcome)> + '_ {
        [
            (PipelineKind::Content, &self.content),
            (PipelineKind::Acoustic, &self.acoustic),
            (PipelineKind::Visual, &self.visual),
        ]
        .into_iter()
    }
}

/// One pipeline's normalized score with the measurements behind it.
///
/// The score is always within [0, 10] and unrounded; presentation
/// rounding happens at the response boundary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedSubScore<M> {
    pub score: f64,
    pub metrics: M,
}

/// Normalizer output: a typed slot per pipeline, absent where the
/// pipeline produced no usable metrics.
///
/// Absence is an explicit state, not a zero. The aggregator reweights
/// around absent slots; nothing below the response boundary substitutes
/// a default value.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct SubScores {
    pub content: Option<NormalizedSubScore<ContentMetrics>>,
    pub acoustic: Option<NormalizedSubScore<AcousticMetrics>>,
    pub visual: Option<NormalizedSubScore<VisualMetrics>>,
    /// Pipelines excluded from aggregation, in canonical order.
    pub missing: Vec<PipelineKind>,
}

impl SubScores {
    /// Present scores in canonical pipeline order.
    pub fn present(&self) -> impl Iterator<Item = (PipelineKind, f64)> + '_ {
        let content = self.content.as_ref().map(|s| (PipelineKind::Content, s.score));
        let acoustic = self.acoustic.as_ref().map(|s| (PipelineKind::Acoustic, s.score));
        let visual = self.visual.as_ref().map(|s| (PipelineKind::Visual, s.score));
        [content, acoustic, visual].into_iter().flatten()
    }
}

/// Final fused result for one submission, produced exactly once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateResult {
    /// Weighted mean over present pipelines, unrounded.
    pub overall_score: f64,
    pub scores: SubScores,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_kind_names() {
        assert_eq!(PipelineKind::Content.as_str(), "content");
        assert_eq!(PipelineKind::Acoustic.as_str(), "acoustic");
        // The response contract publishes acoustic results under "audio".
        assert_eq!(PipelineKind::Acoustic.wire_name(), "audio");
        assert_eq!(PipelineKind::Visual.wire_name(), "visual");
    }

    #[test]
    fn test_raw_metrics_reports_its_kind() {
        let metrics = RawMetrics::Acoustic(AcousticMetrics {
            pace_bpm: 120.0,
            silence_ratio: 0.1,
            pitch_variability: None,
        });
        assert_eq!(metrics.kind(), PipelineKind::Acoustic);
    }

    #[test]
    fn test_outcome_set_iterates_in_canonical_order() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::TimedOut,
            acoustic: PipelineOutcome::TimedOut,
            visual: PipelineOutcome::TimedOut,
        };
        let kinds: Vec<PipelineKind> = outcomes.iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![PipelineKind::Content, PipelineKind::Acoustic, PipelineKind::Visual]
        );
    }

    #[test]
    fn test_sub_scores_present_skips_absent_slots() {
        let scores = SubScores {
            content: None,
            acoustic: Some(NormalizedSubScore {
                score: 7.0,
                metrics: AcousticMetrics {
                    pace_bpm: 150.0,
                    silence_ratio: 0.05,
                    pitch_variability: None,
                },
            }),
            visual: None,
            missing: vec![PipelineKind::Content, PipelineKind::Visual],
        };
        let present: Vec<(PipelineKind, f64)> = scores.present().collect();
        assert_eq!(present, vec![(PipelineKind::Acoustic, 7.0)]);
    }
}
