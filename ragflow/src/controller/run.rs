//! Run identity and the caller's handle on a run.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::utils::generate_uuid;

/// Identifies one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    /// Creates a fresh random run id.
    #[must_use]
    pub fn new() -> Self {
        Self(generate_uuid())
    }

    /// Gets the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Capability to observe and cancel one run.
///
/// Cancelling stops event delivery for this run only; the state it reached is
/// kept until the next `start` or `reset`.
#[derive(Debug, Clone)]
pub struct RunHandle {
    run_id: RunId,
    token: CancellationToken,
}

impl RunHandle {
    pub(crate) fn new(run_id: RunId, token: CancellationToken) -> Self {
        Self { run_id, token }
    }

    /// The run this handle controls.
    #[must_use]
    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    /// Cancels the run. Returns false if it was already cancelled.
    pub fn cancel(&self) -> bool {
        self.token.cancel("cancelled by caller")
    }

    /// Returns true once the run was cancelled, by this handle or otherwise.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique_and_display_as_uuid() {
        let a = RunId::new();
        let b = RunId::new();
        assert_ne!(a, b);
        assert_eq!(a.to_string(), a.as_uuid().to_string());
        assert_eq!(serde_json::to_value(a).unwrap(), serde_json::json!(a.to_string()));
    }

    #[test]
    fn test_handle_cancel_is_idempotent() {
        let handle = RunHandle::new(RunId::new(), CancellationToken::new());
        assert!(!handle.is_cancelled());
        assert!(handle.cancel());
        assert!(!handle.cancel());
        assert!(handle.is_cancelled());
    }
}
