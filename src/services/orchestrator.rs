//! Concurrent pipeline fan-out under one shared deadline
//!
//! One submission becomes three supervised analyzer calls running in
//! parallel. Every call settles to an outcome before this module
//! returns: success, a typed failure, or a forced timeout when the
//! overall deadline expires first. Nothing outlives the request --
//! stragglers are aborted, and a panicking task is contained as an
//! internal failure for its pipeline alone.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::analyzers::{
    AcousticAnalyzer, ContentAnalyzer, PipelineAnalyzer, VisualAnalyzer,
};
use crate::config::EvalConfig;
use crate::services::supervisor::CallSupervisor;
use crate::types::{FailureKind, OutcomeSet, PipelineKind, PipelineOutcome, Submission};

const USER_AGENT: &str = concat!("lectern/", env!("CARGO_PKG_VERSION"));

/// Runs one submission through all three pipelines concurrently.
///
/// The analyzer slots are trait objects so tests can stand in scripted
/// doubles; production wiring comes from `from_config`.
pub struct EvaluationOrchestrator {
    content: Arc<dyn PipelineAnalyzer>,
    acoustic: Arc<dyn PipelineAnalyzer>,
    visual: Arc<dyn PipelineAnalyzer>,
    content_supervisor: CallSupervisor,
    acoustic_supervisor: CallSupervisor,
    visual_supervisor: CallSupervisor,
    overall_deadline: Duration,
}

impl EvaluationOrchestrator {
    /// Build the production orchestrator with HTTP-backed adapters.
    ///
    /// The shared client carries the service user agent and no total
    /// timeout of its own; the supervisors own every deadline.
    pub fn from_config(config: &EvalConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_analyzers(
            Arc::new(ContentAnalyzer::new(
                http_client.clone(),
                config.content.base_url.clone(),
            )),
            Arc::new(AcousticAnalyzer::new(
                http_client.clone(),
                config.acoustic.base_url.clone(),
            )),
            Arc::new(VisualAnalyzer::new(
                http_client,
                config.visual.base_url.clone(),
            )),
            config,
        ))
    }

    /// Assemble from explicit analyzer implementations.
    pub fn with_analyzers(
        content: Arc<dyn PipelineAnalyzer>,
        acoustic: Arc<dyn PipelineAnalyzer>,
        visual: Arc<dyn PipelineAnalyzer>,
        config: &EvalConfig,
    ) -> Self {
        let retries = config.retry.limit;
        let backoff = config.retry.backoff();

        Self {
            content,
            acoustic,
            visual,
            content_supervisor: CallSupervisor::new(config.content_deadline(), retries, backoff),
            acoustic_supervisor: CallSupervisor::new(config.acoustic_deadline(), retries, backoff),
            visual_supervisor: CallSupervisor::new(config.visual_deadline(), retries, backoff),
            overall_deadline: config.overall_deadline(),
        }
    }

    /// Evaluate one submission across all three pipelines.
    ///
    /// Returns once every pipeline has settled or the overall deadline
    /// has expired, whichever comes first. The outcome set depends only
    /// on what each pipeline produced, never on completion order.
    pub async fn evaluate(&self, submission: Arc<Submission>) -> OutcomeSet {
        let deadline = Instant::now() + self.overall_deadline;
        let started = std::time::Instant::now();

        info!(
            submission_id = %submission.id,
            topic = %submission.topic,
            payload_bytes = submission.payload.len(),
            deadline_ms = self.overall_deadline.as_millis() as u64,
            "Starting evaluation fan-out"
        );

        let content = spawn_supervised(
            self.content_supervisor,
            Arc::clone(&self.content),
            Arc::clone(&submission),
        );
        let acoustic = spawn_supervised(
            self.acoustic_supervisor,
            Arc::clone(&self.acoustic),
            Arc::clone(&submission),
        );
        let visual = spawn_supervised(
            self.visual_supervisor,
            Arc::clone(&self.visual),
            Arc::clone(&submission),
        );

        let (content, acoustic, visual) = tokio::join!(
            settle(PipelineKind::Content, content, deadline),
            settle(PipelineKind::Acoustic, acoustic, deadline),
            settle(PipelineKind::Visual, visual, deadline),
        );

        let outcomes = OutcomeSet {
            content,
            acoustic,
            visual,
        };

        info!(
            submission_id = %submission.id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count(),
            "Evaluation settled"
        );

        outcomes
    }
}

fn spawn_supervised(
    supervisor: CallSupervisor,
    analyzer: Arc<dyn PipelineAnalyzer>,
    submission: Arc<Submission>,
) -> JoinHandle<PipelineOutcome> {
    tokio::spawn(async move { supervisor.supervise(analyzer.as_ref(), &submission).await })
}

/// Wait for one pipeline task until the shared deadline.
///
/// A task still running at the deadline is aborted and recorded as
/// timed out. A panicked task becomes an internal failure for that
/// pipeline instead of poisoning the whole request.
async fn settle(
    kind: PipelineKind,
    mut handle: JoinHandle<PipelineOutcome>,
    deadline: Instant,
) -> PipelineOutcome {
    match timeout_at(deadline, &mut handle).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_err)) => {
            warn!(pipeline = %kind, error = %join_err, "Pipeline task faulted");
            PipelineOutcome::Failed {
                kind: FailureKind::Internal,
                message: format!("pipeline task faulted: {}", join_err),
            }
        }
        Err(_) => {
            handle.abort();
            warn!(pipeline = %kind, "Overall deadline expired before pipeline settled");
            PipelineOutcome::TimedOut
        }
    }
}
