//! Run lifecycle events.
//!
//! The controller reports each run's lifecycle to an [`EventSink`]:
//! `run.started`, `run.completed`, `run.failed`, `run.cancelled` and
//! `pipeline.reset`. Payloads are JSON objects carrying at least `run_id`.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Emitted when a run has been started.
pub const RUN_STARTED: &str = "run.started";
/// Emitted when a run reached `COMPLETE`.
pub const RUN_COMPLETED: &str = "run.completed";
/// Emitted when a run reached `ERROR`.
pub const RUN_FAILED: &str = "run.failed";
/// Emitted when a run was cancelled before finishing.
pub const RUN_CANCELLED: &str = "run.cancelled";
/// Emitted when the pipeline was reset to idle.
pub const PIPELINE_RESET: &str = "pipeline.reset";
