//! Score normalization onto the shared 0-10 scale
//!
//! Pure, deterministic per-pipeline formulas:
//! - Content: mean of the two judge axes, clamped
//! - Acoustic: pacing curve (plateau across the optimal band, linear
//!   falloff to zero at the floor/ceiling) minus an independent silence
//!   penalty, floored at zero
//! - Visual: mean of engagement and energy, clamped
//!
//! A failed or timed-out pipeline yields an absent slot, never a zero;
//! the aggregator reweights around absences.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::types::{
    AcousticMetrics, ContentMetrics, NormalizedSubScore, OutcomeSet, PipelineKind,
    PipelineOutcome, RawMetrics, SubScores, VisualMetrics,
};

/// Pacing score band edges, in BPM.
///
/// The score is maximal inside `[optimal_low_bpm, optimal_high_bpm]` and
/// falls linearly to zero at `floor_bpm` below and `ceiling_bpm` above.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct PacingBand {
    pub floor_bpm: f64,
    pub optimal_low_bpm: f64,
    pub optimal_high_bpm: f64,
    pub ceiling_bpm: f64,
}

impl Default for PacingBand {
    fn default() -> Self {
        Self {
            floor_bpm: 60.0,
            optimal_low_bpm: 100.0,
            optimal_high_bpm: 140.0,
            ceiling_bpm: 180.0,
        }
    }
}

impl PacingBand {
    /// Band edges must be ordered or the falloff slopes degenerate.
    pub fn validate(&self) -> Result<(), String> {
        let ordered = self.floor_bpm < self.optimal_low_bpm
            && self.optimal_low_bpm <= self.optimal_high_bpm
            && self.optimal_high_bpm < self.ceiling_bpm;
        if !ordered {
            return Err(format!(
                "pacing band edges must satisfy floor < low <= high < ceiling, got {} / {} / {} / {}",
                self.floor_bpm, self.optimal_low_bpm, self.optimal_high_bpm, self.ceiling_bpm
            ));
        }
        Ok(())
    }
}

/// Pure scoring rules, shared by every request.
#[derive(Debug, Clone, Copy)]
pub struct ScoreNormalizer {
    pacing: PacingBand,
}

impl ScoreNormalizer {
    pub fn new(pacing: PacingBand) -> Self {
        Self { pacing }
    }

    /// Normalize one outcome set. Failed and timed-out pipelines become
    /// absent slots and are listed as missing, in canonical order.
    pub fn normalize(&self, outcomes: &OutcomeSet) -> SubScores {
        let mut scores = SubScores::default();

        scores.content = match &outcomes.content {
            PipelineOutcome::Success(RawMetrics::Content(m)) => Some(NormalizedSubScore {
                score: content_score(m),
                metrics: m.clone(),
            }),
            outcome => exclude(PipelineKind::Content, outcome, &mut scores.missing),
        };

        scores.acoustic = match &outcomes.acoustic {
            PipelineOutcome::Success(RawMetrics::Acoustic(m)) => Some(NormalizedSubScore {
                score: self.acoustic_score(m),
                metrics: m.clone(),
            }),
            outcome => exclude(PipelineKind::Acoustic, outcome, &mut scores.missing),
        };

        scores.visual = match &outcomes.visual {
            PipelineOutcome::Success(RawMetrics::Visual(m)) => Some(NormalizedSubScore {
                score: visual_score(m),
                metrics: m.clone(),
            }),
            outcome => exclude(PipelineKind::Visual, outcome, &mut scores.missing),
        };

        scores
    }

    /// Pacing curve minus the silence penalty, floored at zero.
    ///
    /// The two terms are independent: a silence ratio of zero never
    /// changes the pacing score.
    pub fn acoustic_score(&self, metrics: &AcousticMetrics) -> f64 {
        clamp_score(self.pacing_score(metrics.pace_bpm) - silence_penalty(metrics.silence_ratio))
    }

    /// 10.0 inside the optimal band, linear falloff to 0.0 at the floor
    /// and ceiling, 0.0 beyond them.
    pub fn pacing_score(&self, pace_bpm: f64) -> f64 {
        let band = &self.pacing;
        if pace_bpm >= band.optimal_low_bpm && pace_bpm <= band.optimal_high_bpm {
            10.0
        } else if pace_bpm <= band.floor_bpm || pace_bpm >= band.ceiling_bpm {
            0.0
        } else if pace_bpm < band.optimal_low_bpm {
            10.0 * (pace_bpm - band.floor_bpm) / (band.optimal_low_bpm - band.floor_bpm)
        } else {
            10.0 * (band.ceiling_bpm - pace_bpm) / (band.ceiling_bpm - band.optimal_high_bpm)
        }
    }
}

/// Mean of the two judge axes, clamped to the scale.
pub fn content_score(metrics: &ContentMetrics) -> f64 {
    clamp_score((metrics.accuracy_score + metrics.structure_score) / 2.0)
}

/// Mean of engagement and energy, clamped. Posture is reported in the
/// details but does not enter the score.
pub fn visual_score(metrics: &VisualMetrics) -> f64 {
    clamp_score((metrics.engagement + metrics.energy) / 2.0)
}

/// Record an unusable pipeline as missing.
///
/// The generic return lets each match arm above produce its slot type;
/// this always yields `None`.
fn exclude<M>(
    kind: PipelineKind,
    outcome: &PipelineOutcome,
    missing: &mut Vec<PipelineKind>,
) -> Option<NormalizedSubScore<M>> {
    match outcome {
        PipelineOutcome::Failed { kind: failure, message } => {
            debug!(
                pipeline = %kind,
                failure = %failure,
                message = %message,
                "Pipeline excluded from scoring"
            );
        }
        PipelineOutcome::TimedOut => {
            debug!(pipeline = %kind, "Pipeline timed out, excluded from scoring");
        }
        // An adapter returning another pipeline's metrics would be a bug;
        // score nothing rather than something wrong.
        PipelineOutcome::Success(other) => {
            warn!(
                pipeline = %kind,
                got = %other.kind(),
                "Mismatched metrics payload, excluded from scoring"
            );
        }
    }
    missing.push(kind);
    None
}

/// Silence fraction mapped onto the 10-point scale.
fn silence_penalty(silence_ratio: f64) -> f64 {
    silence_ratio.clamp(0.0, 1.0) * 10.0
}

fn clamp_score(value: f64) -> f64 {
    value.clamp(0.0, 10.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FailureKind;

    fn normalizer() -> ScoreNormalizer {
        ScoreNormalizer::new(PacingBand::default())
    }

    fn acoustic(pace_bpm: f64, silence_ratio: f64) -> AcousticMetrics {
        AcousticMetrics {
            pace_bpm,
            silence_ratio,
            pitch_variability: None,
        }
    }

    #[test]
    fn test_pacing_plateau_covers_optimal_band() {
        let n = normalizer();
        assert_eq!(n.pacing_score(100.0), 10.0);
        assert_eq!(n.pacing_score(120.0), 10.0);
        assert_eq!(n.pacing_score(140.0), 10.0);
    }

    #[test]
    fn test_pacing_falls_linearly_outside_band() {
        let n = normalizer();
        // Halfway down the lower slope (60..100).
        assert_eq!(n.pacing_score(80.0), 5.0);
        // 150 BPM sits a quarter of the way down the upper slope (140..180).
        assert_eq!(n.pacing_score(150.0), 7.5);
        assert_eq!(n.pacing_score(60.0), 0.0);
        assert_eq!(n.pacing_score(180.0), 0.0);
        assert_eq!(n.pacing_score(40.0), 0.0);
        assert_eq!(n.pacing_score(200.0), 0.0);
    }

    #[test]
    fn test_pacing_strictly_decreases_away_from_band() {
        let n = normalizer();
        assert!(n.pacing_score(99.0) < n.pacing_score(100.0));
        assert!(n.pacing_score(90.0) < n.pacing_score(99.0));
        assert!(n.pacing_score(141.0) < n.pacing_score(140.0));
        assert!(n.pacing_score(170.0) < n.pacing_score(141.0));
    }

    #[test]
    fn test_zero_silence_never_reduces_pacing() {
        let n = normalizer();
        for pace in [70.0, 100.0, 120.0, 150.0] {
            assert_eq!(
                n.acoustic_score(&acoustic(pace, 0.0)),
                n.pacing_score(pace)
            );
        }
    }

    #[test]
    fn test_silence_penalty_is_floored_at_zero() {
        let n = normalizer();
        // Pacing 5.0 minus penalty 8.0 would go negative.
        assert_eq!(n.acoustic_score(&acoustic(80.0, 0.8)), 0.0);
        // Out-of-range ratios are treated as fully silent, not amplified.
        assert_eq!(n.acoustic_score(&acoustic(120.0, 1.5)), 0.0);
    }

    #[test]
    fn test_acoustic_worked_example() {
        // 150 BPM with 5% silence: 7.5 - 0.5 = 7.0.
        let n = normalizer();
        assert_eq!(n.acoustic_score(&acoustic(150.0, 0.05)), 7.0);
    }

    #[test]
    fn test_content_blend_and_clamp() {
        let m = |accuracy, structure| ContentMetrics {
            accuracy_score: accuracy,
            structure_score: structure,
            key_strengths: vec![],
            missing_concepts: vec![],
            transcript: String::new(),
        };
        assert_eq!(content_score(&m(8.0, 8.0)), 8.0);
        assert_eq!(content_score(&m(7.0, 8.0)), 7.5);
        // Analyzer scores outside 0-10 are clamped, not trusted.
        assert_eq!(content_score(&m(12.0, 12.0)), 10.0);
        assert_eq!(content_score(&m(-3.0, 1.0)), 0.0);
    }

    #[test]
    fn test_visual_mean_ignores_posture() {
        let m = VisualMetrics {
            engagement: 7.0,
            energy: 8.0,
            posture_openness: Some(1.0),
        };
        assert_eq!(visual_score(&m), 7.5);
    }

    #[test]
    fn test_failed_pipeline_is_absent_not_zero() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::Success(RawMetrics::Content(ContentMetrics {
                accuracy_score: 8.0,
                structure_score: 8.0,
                key_strengths: vec![],
                missing_concepts: vec![],
                transcript: String::new(),
            })),
            acoustic: PipelineOutcome::Failed {
                kind: FailureKind::Transport,
                message: "connection refused".into(),
            },
            visual: PipelineOutcome::TimedOut,
        };

        let scores = normalizer().normalize(&outcomes);

        assert!(scores.content.is_some());
        assert!(scores.acoustic.is_none());
        assert!(scores.visual.is_none());
        assert_eq!(
            scores.missing,
            vec![PipelineKind::Acoustic, PipelineKind::Visual]
        );
    }

    #[test]
    fn test_all_success_has_no_missing() {
        let outcomes = OutcomeSet {
            content: PipelineOutcome::Success(RawMetrics::Content(ContentMetrics {
                accuracy_score: 8.0,
                structure_score: 8.0,
                key_strengths: vec![],
                missing_concepts: vec![],
                transcript: String::new(),
            })),
            acoustic: PipelineOutcome::Success(RawMetrics::Acoustic(acoustic(150.0, 0.05))),
            visual: PipelineOutcome::Success(RawMetrics::Visual(VisualMetrics {
                engagement: 7.0,
                energy: 8.0,
                posture_openness: None,
            })),
        };

        let scores = normalizer().normalize(&outcomes);

        assert!(scores.missing.is_empty());
        assert_eq!(scores.content.as_ref().unwrap().score, 8.0);
        assert_eq!(scores.acoustic.as_ref().unwrap().score, 7.0);
        assert_eq!(scores.visual.as_ref().unwrap().score, 7.5);
    }

    #[test]
    fn test_band_validation() {
        assert!(PacingBand::default().validate().is_ok());

        let inverted = PacingBand {
            floor_bpm: 120.0,
            optimal_low_bpm: 100.0,
            optimal_high_bpm: 140.0,
            ceiling_bpm: 180.0,
        };
        assert!(inverted.validate().is_err());
    }
}
