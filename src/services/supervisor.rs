//! Per-call supervision: deadline and retry policy around one pipeline
//!
//! The supervisor turns a stream of analyzer attempts into exactly one
//! terminal `PipelineOutcome`.
//!
//! **Algorithm:**
//! 1. Arm one deadline covering the whole supervised call
//! 2. Attempt the analyzer
//! 3. On success, return `Success`
//! 4. On a transient error with attempts and budget remaining:
//!    log WARN, back off, retry
//! 5. On any other error, or with the retry budget spent: return `Failed`
//! 6. If the deadline expires at any point: return `TimedOut` -- a
//!    timeout is terminal and never retried

use std::time::Duration;

use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, warn};

use crate::analyzers::PipelineAnalyzer;
use crate::types::{PipelineOutcome, Submission};

/// Deadline and retry policy for one pipeline's analyzer calls.
///
/// The deadline is a total budget: every attempt and every backoff sleep
/// draws from it, so retries can never stretch a call past its limit.
#[derive(Debug, Clone, Copy)]
pub struct CallSupervisor {
    deadline: Duration,
    retry_limit: u32,
    retry_backoff: Duration,
}

impl CallSupervisor {
    /// # Arguments
    /// * `deadline` - total wall-clock budget for the supervised call
    /// * `retry_limit` - additional attempts after the first, transient
    ///   failures only
    /// * `retry_backoff` - pause between attempts
    pub fn new(deadline: Duration, retry_limit: u32, retry_backoff: Duration) -> Self {
        Self {
            deadline,
            retry_limit,
            retry_backoff,
        }
    }

    /// Drive one pipeline call to a terminal outcome.
    pub async fn supervise(
        &self,
        analyzer: &dyn PipelineAnalyzer,
        submission: &Submission,
    ) -> PipelineOutcome {
        let kind = analyzer.kind();
        let deadline = Instant::now() + self.deadline;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            if attempt > 1 {
                debug!(
                    submission_id = %submission.id,
                    pipeline = %kind,
                    attempt,
                    "Retrying analyzer call"
                );
            }

            match timeout_at(deadline, analyzer.analyze(submission)).await {
                Ok(Ok(metrics)) => {
                    if attempt > 1 {
                        debug!(
                            pipeline = %kind,
                            attempt,
                            "Analyzer call succeeded after retry"
                        );
                    }
                    return PipelineOutcome::Success(metrics);
                }
                Ok(Err(err)) if err.is_transient() && attempt <= self.retry_limit => {
                    // The backoff draws from the same budget; skip the
                    // retry when it cannot finish before the deadline.
                    if Instant::now() + self.retry_backoff >= deadline {
                        warn!(
                            pipeline = %kind,
                            attempt,
                            error = %err,
                            "Transient analyzer failure with no budget left to retry"
                        );
                        return PipelineOutcome::Failed {
                            kind: err.failure_kind(),
                            message: err.to_string(),
                        };
                    }

                    warn!(
                        pipeline = %kind,
                        attempt,
                        error = %err,
                        backoff_ms = self.retry_backoff.as_millis() as u64,
                        "Transient analyzer failure, will retry after backoff"
                    );
                    sleep(self.retry_backoff).await;
                }
                Ok(Err(err)) => {
                    warn!(
                        pipeline = %kind,
                        attempt,
                        error = %err,
                        "Analyzer call failed"
                    );
                    return PipelineOutcome::Failed {
                        kind: err.failure_kind(),
                        message: err.to_string(),
                    };
                }
                Err(_) => {
                    warn!(
                        pipeline = %kind,
                        attempt,
                        deadline_ms = self.deadline.as_millis() as u64,
                        "Analyzer call exceeded its deadline"
                    );
                    return PipelineOutcome::TimedOut;
                }
            }
        }
    }
}
