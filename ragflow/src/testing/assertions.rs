//! Test assertions for pipeline state.

use crate::core::{OverallStatus, PipelineState, StepId, StepStatus};
use crate::reducer::PipelineStore;

/// Asserts that the run has the expected overall status.
pub fn assert_overall_status(state: &PipelineState, expected: OverallStatus) {
    assert_eq!(
        state.overall_status, expected,
        "Expected overall status {:?}, got {:?} (error: {:?})",
        expected, state.overall_status, state.error
    );
}

/// Asserts that a step exists and has the expected status.
pub fn assert_step_status(state: &PipelineState, step: StepId, expected: StepStatus) {
    let actual = state.step(step).map(|s| s.status);
    assert_eq!(
        actual,
        Some(expected),
        "Expected step '{}' to be {:?}, got {:?}",
        step,
        expected,
        actual
    );
}

/// Asserts that the run completed and every step in it did too.
pub fn assert_all_steps_complete(state: &PipelineState) {
    assert_overall_status(state, OverallStatus::Complete);
    let unfinished: Vec<_> = state
        .steps
        .iter()
        .filter(|s| !s.is_complete())
        .map(|s| (s.id, s.status))
        .collect();
    assert!(
        unfinished.is_empty(),
        "Expected all steps complete, unfinished: {:?}",
        unfinished
    );
    for step in &state.steps {
        assert!(
            step.started_at.is_some() && step.completed_at.is_some(),
            "Step '{}' completed without both timestamps",
            step.id
        );
    }
}

/// Asserts the start order classification, search, generation, then the
/// post-generation steps.
pub fn assert_start_order(state: &PipelineState) {
    let started = |id: StepId| state.step(id).and_then(|s| s.started_at);
    let chain = [StepId::Classification, StepId::Search, StepId::Generation]
        .into_iter()
        .filter_map(|id| started(id).map(|at| (id, at)))
        .collect::<Vec<_>>();
    for pair in chain.windows(2) {
        assert!(
            pair[0].1 <= pair[1].1,
            "Step '{}' started after '{}'",
            pair[0].0,
            pair[1].0
        );
    }

    let Some(generation) = started(StepId::Generation) else {
        return;
    };
    for late in [StepId::Confidence, StepId::Followup] {
        if let Some(at) = started(late) {
            assert!(
                generation <= at,
                "Step '{}' started before generation",
                late
            );
        }
    }
}

/// Asserts that the store rejected nothing.
pub fn assert_no_diagnostics(store: &PipelineStore) {
    let diagnostics = store.diagnostics();
    assert!(
        diagnostics.is_empty(),
        "Expected no rejected transitions, got: {:?}",
        diagnostics
    );
}
