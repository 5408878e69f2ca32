//! Reducer actions.

use serde::{Deserialize, Serialize};

use crate::core::{EnabledSteps, StepData, StepId};
use crate::utils::Timestamp;

/// An input to [`reduce`](super::reduce).
///
/// Timestamps travel inside the actions so that reducing stays pure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PipelineAction {
    /// Begin a run with the given steps.
    Start {
        /// Steps taking part in the run.
        enabled_steps: EnabledSteps,
    },
    /// Move a pending step to running.
    StepStart {
        /// Target step.
        step_id: StepId,
        /// Start time.
        at: Timestamp,
    },
    /// Replace a running step's data.
    StepUpdate {
        /// Target step.
        step_id: StepId,
        /// New payload snapshot.
        data: StepData,
    },
    /// Complete a running step.
    StepComplete {
        /// Target step.
        step_id: StepId,
        /// Final payload; `None` keeps whatever the step already holds.
        data: Option<StepData>,
        /// Completion time.
        at: Timestamp,
    },
    /// Fail the run.
    Error {
        /// Message shown to the user.
        error: String,
    },
    /// Finish the run.
    Complete,
    /// Return to the idle state.
    Reset,
}

impl PipelineAction {
    /// Returns the action name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "START",
            Self::StepStart { .. } => "STEP_START",
            Self::StepUpdate { .. } => "STEP_UPDATE",
            Self::StepComplete { .. } => "STEP_COMPLETE",
            Self::Error { .. } => "ERROR",
            Self::Complete => "COMPLETE",
            Self::Reset => "RESET",
        }
    }

    /// Returns the step the action targets, if any.
    #[must_use]
    pub fn step_id(&self) -> Option<StepId> {
        match self {
            Self::StepStart { step_id, .. }
            | Self::StepUpdate { step_id, .. }
            | Self::StepComplete { step_id, .. } => Some(*step_id),
            Self::Start { .. } | Self::Error { .. } | Self::Complete | Self::Reset => None,
        }
    }
}
