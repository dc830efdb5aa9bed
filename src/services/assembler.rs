//! Response assembly: the presentation boundary
//!
//! Everything cosmetic happens here and only here: rounding (scores to
//! one decimal, detail metrics to two), wire naming (`audio` for the
//! acoustic pipeline), display defaults (empty transcript when content
//! is missing), and the delivery advisories. Upstream values stay
//! unrounded and absent values stay absent until this point.

use serde::Serialize;
use uuid::Uuid;

use crate::types::{AggregateResult, SubScores};

/// Pace above which a slow-down advisory is emitted. Strictly greater:
/// exactly 150 BPM draws no advisory.
const PACE_SLOW_DOWN_BPM: f64 = 150.0;
/// Pace below which a speed-up advisory is emitted.
const PACE_SPEED_UP_BPM: f64 = 100.0;
/// Silence fraction above which long pauses are called out.
const SILENCE_ADVISORY_RATIO: f64 = 0.30;

/// The `POST /analyze` success payload.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub submission_id: Uuid,
    pub overall_score: f64,
    pub pipelines: PipelineReports,
    /// Wire names of pipelines that produced no score this run.
    pub missing_pipelines: Vec<&'static str>,
    pub advisories: Vec<String>,
    pub transcript: String,
}

/// Per-pipeline report blocks. A pipeline that produced no score is
/// omitted entirely rather than serialized with placeholder numbers.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReports {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visual: Option<VisualReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<ContentReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualReport {
    pub visual_score: f64,
    pub details: VisualDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct VisualDetails {
    pub engagement: f64,
    pub energy: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posture_openness: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioReport {
    pub prosody_score: f64,
    pub details: AudioDetails,
}

#[derive(Debug, Clone, Serialize)]
pub struct AudioDetails {
    pub pace_bpm: f64,
    pub silence_ratio: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pitch_variability: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContentReport {
    pub content_score: f64,
    pub accuracy_score: f64,
    pub structure_score: f64,
    pub key_strengths: Vec<String>,
    pub missing_concepts: Vec<String>,
}

/// Build the response payload from one aggregate result.
pub fn assemble(submission_id: Uuid, result: &AggregateResult) -> AnalyzeResponse {
    let scores = &result.scores;

    let visual = scores.visual.as_ref().map(|sub| VisualReport {
        visual_score: round_score(sub.score),
        details: VisualDetails {
            engagement: round_metric(sub.metrics.engagement),
            energy: round_metric(sub.metrics.energy),
            posture_openness: sub.metrics.posture_openness.map(round_metric),
        },
    });

    let audio = scores.acoustic.as_ref().map(|sub| AudioReport {
        prosody_score: round_score(sub.score),
        details: AudioDetails {
            pace_bpm: round_metric(sub.metrics.pace_bpm),
            silence_ratio: round_metric(sub.metrics.silence_ratio),
            pitch_variability: sub.metrics.pitch_variability.map(round_metric),
        },
    });

    let content = scores.content.as_ref().map(|sub| ContentReport {
        content_score: round_score(sub.score),
        accuracy_score: round_score(sub.metrics.accuracy_score),
        structure_score: round_score(sub.metrics.structure_score),
        key_strengths: sub.metrics.key_strengths.clone(),
        missing_concepts: sub.metrics.missing_concepts.clone(),
    });

    // Display default only: the scoring core never substituted anything
    // for a missing transcript.
    let transcript = scores
        .content
        .as_ref()
        .map(|sub| sub.metrics.transcript.clone())
        .unwrap_or_default();

    AnalyzeResponse {
        submission_id,
        overall_score: round_score(result.overall_score),
        pipelines: PipelineReports {
            visual,
            audio,
            content,
        },
        missing_pipelines: scores.missing.iter().map(|k| k.wire_name()).collect(),
        advisories: advisories(scores),
        transcript,
    }
}

/// Delivery advisories derived from the raw acoustic measurements.
fn advisories(scores: &SubScores) -> Vec<String> {
    let mut notes = Vec::new();

    if let Some(sub) = &scores.acoustic {
        let m = &sub.metrics;
        if m.pace_bpm > PACE_SLOW_DOWN_BPM {
            notes.push(format!(
                "Speaking pace of {:.0} BPM is above the comfortable range; slow down.",
                m.pace_bpm
            ));
        } else if m.pace_bpm < PACE_SPEED_UP_BPM {
            notes.push(format!(
                "Speaking pace of {:.0} BPM is below the comfortable range; pick up the pace.",
                m.pace_bpm
            ));
        }
        if m.silence_ratio > SILENCE_ADVISORY_RATIO {
            notes.push(format!(
                "{:.0}% of the recording is silence; tighten long pauses.",
                m.silence_ratio * 100.0
            ));
        }
    }

    notes
}

/// One decimal place, the scale scores are published at.
fn round_score(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Two decimal places, so small ratios like 0.05 survive display.
fn round_metric(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
