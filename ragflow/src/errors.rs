//! Error types for the ragflow orchestrator.
//!
//! Rejected reducer transitions, transport failures and configuration problems
//! each get their own enum; [`RagflowError`] wraps them for callers that only
//! need one error type.

use thiserror::Error;

use crate::core::{OverallStatus, StepId, StepStatus};

/// The main error type for ragflow operations.
#[derive(Debug, Error)]
pub enum RagflowError {
    /// A run configuration was rejected.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// The reducer rejected an action.
    #[error("{0}")]
    Transition(#[from] TransitionError),

    /// The backend stream could not be opened or failed mid-run.
    #[error("{0}")]
    Transport(#[from] TransportError),

    /// A run was started outside of a tokio runtime.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),

    /// The tracing subscriber could not be installed.
    #[error("Observability setup failed: {0}")]
    Observability(String),
}

/// A reducer action whose precondition does not hold.
///
/// The reducer never mutates state when it returns one of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    /// `START` was issued while a run is still in progress.
    #[error("START rejected: pipeline is already {status}")]
    AlreadyRunning {
        /// The overall status at the time of the action.
        status: OverallStatus,
    },

    /// A step or terminal action arrived while no run is in progress.
    #[error("{action} rejected: pipeline is {status}, expected running")]
    PipelineNotRunning {
        /// The rejected action name.
        action: &'static str,
        /// The overall status at the time of the action.
        status: OverallStatus,
    },

    /// The action targets a step that is not part of the current run.
    #[error("{action} rejected: step '{step}' is not enabled for this run")]
    StepNotEnabled {
        /// The rejected action name.
        action: &'static str,
        /// The targeted step.
        step: StepId,
    },

    /// The targeted step is not in the status the action requires.
    #[error("{action} rejected: step '{step}' is {actual}, expected {expected}")]
    InvalidStepStatus {
        /// The rejected action name.
        action: &'static str,
        /// The targeted step.
        step: StepId,
        /// The status the action requires.
        expected: StepStatus,
        /// The status the step actually has.
        actual: StepStatus,
    },

    /// The payload shape belongs to a different step.
    #[error("{action} rejected: payload for '{payload}' cannot be stored on step '{step}'")]
    DataMismatch {
        /// The rejected action name.
        action: &'static str,
        /// The targeted step.
        step: StepId,
        /// The step the payload belongs to.
        payload: StepId,
    },
}

impl TransitionError {
    /// Returns the step the rejected action targeted, if any.
    #[must_use]
    pub fn step(&self) -> Option<StepId> {
        match self {
            Self::AlreadyRunning { .. } | Self::PipelineNotRunning { .. } => None,
            Self::StepNotEnabled { step, .. }
            | Self::InvalidStepStatus { step, .. }
            | Self::DataMismatch { step, .. } => Some(*step),
        }
    }
}

/// Failures of the backend streaming call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("Transport client error: {0}")]
    Client(String),

    /// The request could not be sent.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// The backend answered with a non-success status.
    #[error("Backend returned status {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, possibly empty.
        body: String,
    },

    /// The body stream failed mid-run.
    #[error("Stream interrupted: {0}")]
    Stream(String),

    /// A frame could not be decoded into a backend event.
    #[error("Undecodable event: {0}")]
    Decode(String),

    /// No event arrived within the configured idle window.
    #[error("No event received for {seconds}s")]
    IdleTimeout {
        /// The idle window that elapsed.
        seconds: f64,
    },

    /// The stream ended without a terminal event.
    #[error("Stream closed before a terminal event")]
    Closed,
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A field holds a value outside its accepted range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },

    /// A step name did not match any known step.
    #[error("Unknown step: {0}")]
    UnknownStep(String),

    /// The configuration document could not be parsed.
    #[error("Configuration parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    /// Creates an invalid value error.
    #[must_use]
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_error_message() {
        let err = TransitionError::InvalidStepStatus {
            action: "STEP_COMPLETE",
            step: StepId::Search,
            expected: StepStatus::Running,
            actual: StepStatus::Pending,
        };

        assert_eq!(
            err.to_string(),
            "STEP_COMPLETE rejected: step 'search' is pending, expected running"
        );
        assert_eq!(err.step(), Some(StepId::Search));
    }

    #[test]
    fn test_pipeline_level_rejection_has_no_step() {
        let err = TransitionError::PipelineNotRunning {
            action: "COMPLETE",
            status: OverallStatus::Idle,
        };

        assert_eq!(err.step(), None);
        assert!(err.to_string().contains("COMPLETE"));
    }

    #[test]
    fn test_wrapping_into_ragflow_error() {
        let err: RagflowError = ConfigError::invalid("limit", "must be at least 1").into();
        assert!(matches!(err, RagflowError::Config(_)));
        assert_eq!(err.to_string(), "Invalid value for 'limit': must be at least 1");

        let err: RagflowError = TransportError::Closed.into();
        assert!(err.to_string().contains("terminal event"));
    }
}
