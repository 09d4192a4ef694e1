//! Step runner
//!
//! Runs steps strictly in order. Once the last step finishes, a step halts,
//! or cancellation is requested, every step that started is cleaned up in
//! reverse order. A failing cleanup is reported and the unwind carries on,
//! but a run that leaves resources behind never counts as succeeded.

use crate::artifact::Artifact;
use crate::error::StepError;
use crate::state::StateBag;
use crate::step::{Step, StepAction};
use tokio_util::sync::CancellationToken;

/// Terminal status of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Succeeded,
    Halted { step: &'static str },
    Cancelled,
    /// Every step ran but the cleanup of `step` (the first to fail) left
    /// resources behind
    CleanupFailed { step: &'static str },
}

/// A cleanup that failed during the unwind
#[derive(Debug)]
pub struct CleanupFailure {
    pub step: &'static str,
    pub error: StepError,
}

/// Result of [`Runner::run`]
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    /// The run's fatal error, if any
    pub error: Option<StepError>,
    /// Produced artifact; kept when only cleanup failed
    pub artifact: Option<Box<dyn Artifact>>,
    pub cleanup_failures: Vec<CleanupFailure>,
}

impl RunOutcome {
    pub fn succeeded(&self) -> bool {
        self.status == RunStatus::Succeeded
    }
}

pub struct Runner {
    steps: Vec<Box<dyn Step>>,
}

impl Runner {
    pub fn new(steps: Vec<Box<dyn Step>>) -> Self {
        Self { steps }
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }

    pub async fn run(&mut self, state: &mut StateBag) -> RunOutcome {
        let mut status = RunStatus::Succeeded;
        // Index one past the last step whose forward action started
        let mut started: usize = 0;

        for step in self.steps.iter_mut() {
            if state.is_cancelled() {
                status = RunStatus::Cancelled;
                break;
            }

            tracing::debug!("Running step '{}'", step.name());
            started += 1;

            match step.run(state).await {
                StepAction::Continue => {}
                StepAction::Halt => {
                    status = if state.is_cancelled() {
                        RunStatus::Cancelled
                    } else {
                        RunStatus::Halted { step: step.name() }
                    };
                    break;
                }
            }
        }

        if status == RunStatus::Succeeded && state.error().is_some() {
            // A step recorded an error but kept going
            let step = started
                .checked_sub(1)
                .and_then(|i| self.steps.get(i))
                .map(|s| s.name())
                .unwrap_or("<none>");
            status = RunStatus::Halted { step };
        }

        if status == RunStatus::Cancelled {
            state.record_error(StepError::Cancelled);
        }

        // Cleanup waits must not be interrupted by the original cancellation.
        let run_token = state.replace_cancel_token(CancellationToken::new());

        let mut cleanup_failures = Vec::new();
        for step in self.steps[..started].iter_mut().rev() {
            tracing::debug!("Cleaning up step '{}'", step.name());
            if let Err(err) = step.cleanup(state).await {
                tracing::warn!("Cleanup of step '{}' failed: {}", step.name(), err);
                state
                    .ui()
                    .error(&format!("Cleanup of '{}' failed: {}", step.name(), err));
                cleanup_failures.push(CleanupFailure {
                    step: step.name(),
                    error: err,
                });
            }
        }

        state.replace_cancel_token(run_token);

        if status == RunStatus::Succeeded
            && let Some(failure) = cleanup_failures.first()
        {
            status = RunStatus::CleanupFailed { step: failure.step };
        }

        let error = state.take_error();
        let artifact = match status {
            RunStatus::Succeeded | RunStatus::CleanupFailed { .. } => {
                state.take_target_artifact()
            }
            _ => None,
        };

        RunOutcome {
            status,
            error,
            artifact,
            cleanup_failures,
        }
    }
}
