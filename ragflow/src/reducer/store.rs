//! Stateful wrapper around the reducer that keeps rejected transitions visible.

use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{trace, warn};

use super::{reduce, PipelineAction};
use crate::core::{PipelineState, StepId};
use crate::errors::TransitionError;
use crate::utils::{Clock, SystemClock, Timestamp};

/// Default number of diagnostics kept before the oldest are dropped.
pub const DEFAULT_MAX_DIAGNOSTICS: usize = 256;

/// Source name used for backend events that could not be decoded.
pub const UNDECODABLE_EVENT: &str = "BACKEND_EVENT";

/// A rejected transition or a skipped backend event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// The rejected action name, or [`UNDECODABLE_EVENT`].
    pub action: &'static str,
    /// The step the action targeted, if any.
    pub step: Option<StepId>,
    /// Human-readable reason.
    pub message: String,
    /// The reducer's rejection, for rejected transitions.
    pub error: Option<TransitionError>,
    /// When it was recorded.
    pub at: Timestamp,
}

/// Holds the live [`PipelineState`] and applies actions to it.
///
/// A rejected action never changes the state. It is logged at `warn` and kept
/// in a bounded diagnostics buffer so malformed event sequences can be
/// inspected after the fact.
pub struct PipelineStore {
    state: PipelineState,
    diagnostics: VecDeque<Diagnostic>,
    max_diagnostics: usize,
    applied: u64,
    clock: Arc<dyn Clock>,
}

impl Default for PipelineStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineStore {
    /// Creates a store holding the idle state.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_diagnostics(DEFAULT_MAX_DIAGNOSTICS)
    }

    /// Creates a store that keeps at most `max` diagnostics.
    #[must_use]
    pub fn with_max_diagnostics(max: usize) -> Self {
        Self {
            state: PipelineState::idle(),
            diagnostics: VecDeque::new(),
            max_diagnostics: max.max(1),
            applied: 0,
            clock: Arc::new(SystemClock),
        }
    }

    /// Sets the clock used to stamp diagnostics.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Applies an action.
    ///
    /// # Errors
    ///
    /// Returns the [`TransitionError`] when the reducer rejects the action; the
    /// rejection is also recorded as a [`Diagnostic`].
    pub fn dispatch(&mut self, action: &PipelineAction) -> Result<&PipelineState, TransitionError> {
        match reduce(&self.state, action) {
            Ok(next) => {
                trace!(action = action.name(), step = ?action.step_id(), "Transition applied");
                self.state = next;
                self.applied += 1;
                Ok(&self.state)
            }
            Err(error) => {
                warn!(
                    action = action.name(),
                    step = ?action.step_id(),
                    status = %self.state.overall_status,
                    "Rejected transition: {}", error
                );
                self.push(Diagnostic {
                    action: action.name(),
                    step: action.step_id(),
                    message: error.to_string(),
                    error: Some(error.clone()),
                    at: self.clock.now(),
                });
                Err(error)
            }
        }
    }

    /// Records a backend event that was skipped because it could not be decoded.
    pub fn record_undecodable(&mut self, reason: impl Into<String>) {
        let message = reason.into();
        warn!(reason = %message, "Skipping undecodable backend event");
        self.push(Diagnostic {
            action: UNDECODABLE_EVENT,
            step: None,
            message,
            error: None,
            at: self.clock.now(),
        });
    }

    /// Diagnostics, oldest first.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.iter().cloned().collect()
    }

    /// Discards recorded diagnostics.
    pub fn clear_diagnostics(&mut self) {
        self.diagnostics.clear();
    }

    /// Number of actions applied since creation.
    #[must_use]
    pub fn applied(&self) -> u64 {
        self.applied
    }

    fn push(&mut self, diagnostic: Diagnostic) {
        if self.diagnostics.len() == self.max_diagnostics {
            self.diagnostics.pop_front();
        }
        self.diagnostics.push_back(diagnostic);
    }
}

impl std::fmt::Debug for PipelineStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineStore")
            .field("state", &self.state)
            .field("diagnostics", &self.diagnostics.len())
            .field("max_diagnostics", &self.max_diagnostics)
            .field("applied", &self.applied)
            .finish_non_exhaustive()
    }
}
