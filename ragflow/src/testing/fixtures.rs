//! Test fixtures for adapter and reducer tests.

use std::sync::Arc;

use crate::adapter::{BackendEvent, StreamEventAdapter};
use crate::config::{GeneratorConfig, RunConfig};
use crate::core::{Hit, StepId};
use crate::reducer::{PipelineAction, PipelineStore};
use crate::utils::ManualClock;

/// Generator settings used across tests.
#[must_use]
pub fn generator() -> GeneratorConfig {
    GeneratorConfig::new("test-provider", "test-model")
}

/// A run config enabling `steps` on top of search and generation.
#[must_use]
pub fn run_config(steps: &[StepId]) -> RunConfig {
    RunConfig::new(generator()).with_steps(steps.iter().copied())
}

/// A hit with only an id.
#[must_use]
pub fn hit(id: &str) -> Hit {
    Hit::new(id)
}

/// An adapter over [`run_config`] with a deterministic clock.
#[must_use]
pub fn test_adapter(steps: &[StepId]) -> StreamEventAdapter {
    StreamEventAdapter::new(&run_config(steps), Arc::new(ManualClock::ticking()))
}

/// Feeds `events` through a fresh adapter and a store.
///
/// Returns every action the adapter produced, in order, and the store they
/// were dispatched into. Rejected actions show up as store diagnostics.
pub fn drive(
    steps: &[StepId],
    events: impl IntoIterator<Item = BackendEvent>,
) -> (Vec<PipelineAction>, PipelineStore) {
    let mut adapter = test_adapter(steps);
    let mut store = PipelineStore::new();
    let mut actions = adapter.begin();
    for event in events {
        actions.extend(adapter.handle(event));
    }
    for action in &actions {
        let _ = store.dispatch(action);
    }
    (actions, store)
}
