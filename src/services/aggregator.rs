//! Weighted fusion of the normalized sub-scores
//!
//! The overall score is the weighted mean over the pipelines that
//! actually produced a score: the weights of absent pipelines drop out
//! of the denominator, so a two-pipeline result is a renormalized
//! two-pipeline mean, not a three-pipeline mean with a hidden zero.

use serde::Deserialize;
use thiserror::Error;

use crate::types::{AggregateResult, PipelineKind, SubScores};

/// Aggregation errors.
#[derive(Debug, Error, PartialEq)]
pub enum AggregateError {
    /// Invalid weight configuration (negative weight, zero total).
    #[error("invalid weights: {0}")]
    InvalidWeights(String),

    /// Every pipeline failed or timed out; there is nothing to score.
    #[error("no pipeline produced a usable score")]
    NoUsablePipelines,
}

/// Relative importance of each pipeline.
///
/// Weights need not sum to one; aggregation divides by the weight of
/// whatever is present. Individual weights may be zero, but not
/// negative, and the total must be positive.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct Weights {
    pub content: f64,
    pub acoustic: f64,
    pub visual: f64,
}

impl Default for Weights {
    fn default() -> Self {
        Self {
            content: 0.35,
            acoustic: 0.35,
            visual: 0.30,
        }
    }
}

impl Weights {
    pub fn validate(&self) -> Result<(), AggregateError> {
        for (kind, weight) in self.iter() {
            if weight < 0.0 || !weight.is_finite() {
                return Err(AggregateError::InvalidWeights(format!(
                    "{} weight out of range: {}",
                    kind, weight
                )));
            }
        }
        if self.content + self.acoustic + self.visual <= 0.0 {
            return Err(AggregateError::InvalidWeights(
                "weights must not sum to zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn for_kind(&self, kind: PipelineKind) -> f64 {
        match kind {
            PipelineKind::Content => self.content,
            PipelineKind::Acoustic => self.acoustic,
            PipelineKind::Visual => self.visual,
        }
    }

    fn iter(&self) -> impl Iterator<Item = (PipelineKind, f64)> {
        [
            (PipelineKind::Content, self.content),
            (PipelineKind::Acoustic, self.acoustic),
            (PipelineKind::Visual, self.visual),
        ]
        .into_iter()
    }
}

/// Fuses present sub-scores under a fixed, validated weight set.
#[derive(Debug, Clone, Copy)]
pub struct ScoreAggregator {
    weights: Weights,
}

impl ScoreAggregator {
    /// Weights are validated here, once, at construction; aggregation
    /// itself cannot fail on them afterwards.
    pub fn new(weights: Weights) -> Result<Self, AggregateError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    /// Weighted mean over present pipelines.
    ///
    /// Pure and deterministic: the same sub-scores always produce the
    /// identical result, and nothing is rounded here.
    pub fn aggregate(&self, scores: SubScores) -> Result<AggregateResult, AggregateError> {
        let mut weighted_sum = 0.0;
        let mut weight_total = 0.0;

        for (kind, score) in scores.present() {
            let weight = self.weights.for_kind(kind);
            weighted_sum += weight * score;
            weight_total += weight;
        }

        if weight_total <= 0.0 {
            // Either nothing completed, or everything that did carries
            // zero weight. Both mean there is no defensible score.
            return Err(AggregateError::NoUsablePipelines);
        }

        Ok(AggregateResult {
            overall_score: weighted_sum / weight_total,
            scores,
        })
    }
}
