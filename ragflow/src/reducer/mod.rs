//! The pipeline state machine.
//!
//! [`reduce`] is the only place [`PipelineState`] changes. It is pure: given
//! the same state and action it always returns the same result, and it never
//! touches the clock, the network or any shared state. Actions whose
//! precondition fails are rejected with a [`TransitionError`] and leave the
//! state untouched; [`PipelineStore`] records those rejections as diagnostics.

mod action;
mod store;

#[cfg(test)]
mod reducer_tests;

pub use action::PipelineAction;
pub use store::{Diagnostic, PipelineStore, DEFAULT_MAX_DIAGNOSTICS, UNDECODABLE_EVENT};

use crate::core::{OverallStatus, PipelineState, PipelineStep, StepData, StepId, StepStatus};
use crate::errors::TransitionError;

/// Applies one action to a state.
///
/// # Errors
///
/// Returns a [`TransitionError`] when the action's precondition does not hold.
/// The input state is never modified.
pub fn reduce(
    state: &PipelineState,
    action: &PipelineAction,
) -> Result<PipelineState, TransitionError> {
    match action {
        PipelineAction::Start { enabled_steps } => {
            if !state.overall_status.can_start() {
                return Err(TransitionError::AlreadyRunning {
                    status: state.overall_status,
                });
            }
            Ok(PipelineState::started(enabled_steps))
        }
        PipelineAction::StepStart { step_id, at } => {
            let mut next = running_copy(state, action)?;
            let step = step_in(&mut next, action.name(), *step_id, StepStatus::Pending)?;
            step.status = StepStatus::Running;
            step.started_at = Some(*at);
            Ok(next)
        }
        PipelineAction::StepUpdate { step_id, data } => {
            check_payload(action.name(), *step_id, Some(data))?;
            let mut next = running_copy(state, action)?;
            let step = step_in(&mut next, action.name(), *step_id, StepStatus::Running)?;
            step.data = Some(data.clone());
            Ok(next)
        }
        PipelineAction::StepComplete { step_id, data, at } => {
            check_payload(action.name(), *step_id, data.as_ref())?;
            let mut next = running_copy(state, action)?;
            let step = step_in(&mut next, action.name(), *step_id, StepStatus::Running)?;
            step.status = StepStatus::Complete;
            step.completed_at = Some(*at);
            if let Some(data) = data {
                step.data = Some(data.clone());
            }
            Ok(next)
        }
        PipelineAction::Error { error } => {
            let mut next = running_copy(state, action)?;
            next.overall_status = OverallStatus::Error;
            next.error = Some(error.clone());
            Ok(next)
        }
        PipelineAction::Complete => {
            let mut next = running_copy(state, action)?;
            next.overall_status = OverallStatus::Complete;
            Ok(next)
        }
        PipelineAction::Reset => Ok(PipelineState::idle()),
    }
}

/// Clones the state if a run is in progress.
fn running_copy(
    state: &PipelineState,
    action: &PipelineAction,
) -> Result<PipelineState, TransitionError> {
    if state.is_running() {
        Ok(state.clone())
    } else {
        Err(TransitionError::PipelineNotRunning {
            action: action.name(),
            status: state.overall_status,
        })
    }
}

fn step_in<'a>(
    state: &'a mut PipelineState,
    action: &'static str,
    step_id: StepId,
    expected: StepStatus,
) -> Result<&'a mut PipelineStep, TransitionError> {
    let step = state
        .step_mut(step_id)
        .ok_or(TransitionError::StepNotEnabled {
            action,
            step: step_id,
        })?;
    if step.status != expected {
        return Err(TransitionError::InvalidStepStatus {
            action,
            step: step_id,
            expected,
            actual: step.status,
        });
    }
    Ok(step)
}

fn check_payload(
    action: &'static str,
    step_id: StepId,
    data: Option<&StepData>,
) -> Result<(), TransitionError> {
    match data {
        Some(data) if data.step_id() != step_id => Err(TransitionError::DataMismatch {
            action,
            step: step_id,
            payload: data.step_id(),
        }),
        _ => Ok(()),
    }
}
