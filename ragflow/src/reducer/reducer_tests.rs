//! Transition tests for the pipeline reducer.

use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use super::{reduce, PipelineAction};
use crate::core::{
    ConfidenceData, EnabledSteps, GenerationData, Hit, OverallStatus, PipelineState, SearchData,
    StepData, StepId, StepStatus,
};
use crate::errors::TransitionError;
use crate::utils::Timestamp;

fn at(secs: i64) -> Timestamp {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
}

fn start(steps: &[StepId]) -> PipelineAction {
    PipelineAction::Start {
        enabled_steps: EnabledSteps::new(steps.iter().copied()),
    }
}

fn step_start(step_id: StepId, secs: i64) -> PipelineAction {
    PipelineAction::StepStart {
        step_id,
        at: at(secs),
    }
}

fn search_data(ids: &[&str]) -> StepData {
    StepData::Search(SearchData {
        hits: ids.iter().map(|id| Hit::new(*id)).collect(),
    })
}

fn apply(state: PipelineState, actions: &[PipelineAction]) -> PipelineState {
    actions.iter().fold(state, |state, action| {
        reduce(&state, action).unwrap_or_else(|e| panic!("{} failed: {e}", action.name()))
    })
}

fn running_search() -> PipelineState {
    apply(
        PipelineState::idle(),
        &[start(&[]), step_start(StepId::Search, 0)],
    )
}

#[test]
fn test_start_builds_pending_steps() {
    let state = apply(
        PipelineState::idle(),
        &[start(&[StepId::Confidence, StepId::Classification])],
    );

    let ids: Vec<_> = state.steps.iter().map(|s| s.id).collect();
    assert_eq!(
        ids,
        vec![
            StepId::Classification,
            StepId::Search,
            StepId::Generation,
            StepId::Confidence
        ]
    );
    assert!(state.steps.iter().all(|s| s.status == StepStatus::Pending));
    assert_eq!(state.overall_status, OverallStatus::Running);
}

#[test]
fn test_start_clears_previous_error() {
    let failed = apply(
        running_search(),
        &[PipelineAction::Error {
            error: "timeout".to_string(),
        }],
    );
    assert_eq!(failed.error.as_deref(), Some("timeout"));

    let restarted = apply(failed, &[start(&[])]);
    assert_eq!(restarted.error, None);
    assert_eq!(restarted.overall_status, OverallStatus::Running);
    assert!(restarted.steps.iter().all(|s| s.data.is_none()));
}

#[test]
fn test_start_rejected_while_running() {
    let state = running_search();
    let err = reduce(&state, &start(&[])).unwrap_err();
    assert_eq!(
        err,
        TransitionError::AlreadyRunning {
            status: OverallStatus::Running
        }
    );
}

#[test]
fn test_step_start_records_timestamp() {
    let state = running_search();
    let search = state.step(StepId::Search).unwrap();

    assert_eq!(search.status, StepStatus::Running);
    assert_eq!(search.started_at, Some(at(0)));
    assert!(search.data.is_none());
}

#[test]
fn test_step_cannot_start_twice() {
    let state = running_search();
    let err = reduce(&state, &step_start(StepId::Search, 1)).unwrap_err();

    assert_eq!(
        err,
        TransitionError::InvalidStepStatus {
            action: "STEP_START",
            step: StepId::Search,
            expected: StepStatus::Pending,
            actual: StepStatus::Running,
        }
    );
}

#[test]
fn test_step_start_on_disabled_step() {
    let state = running_search();
    let err = reduce(&state, &step_start(StepId::Followup, 1)).unwrap_err();
    assert!(matches!(
        err,
        TransitionError::StepNotEnabled {
            step: StepId::Followup,
            ..
        }
    ));
}

#[test]
fn test_step_update_replaces_data() {
    let state = apply(
        running_search(),
        &[
            PipelineAction::StepUpdate {
                step_id: StepId::Search,
                data: search_data(&["a"]),
            },
            PipelineAction::StepUpdate {
                step_id: StepId::Search,
                data: search_data(&["a", "b"]),
            },
        ],
    );

    let search = state.step(StepId::Search).unwrap();
    assert_eq!(search.data, Some(search_data(&["a", "b"])));
    assert_eq!(search.status, StepStatus::Running);
}

#[test]
fn test_step_update_requires_running() {
    let state = running_search();
    let err = reduce(
        &state,
        &PipelineAction::StepUpdate {
            step_id: StepId::Generation,
            data: StepData::Generation(GenerationData::default()),
        },
    )
    .unwrap_err();

    assert!(matches!(
        err,
        TransitionError::InvalidStepStatus {
            step: StepId::Generation,
            actual: StepStatus::Pending,
            ..
        }
    ));
}

#[test]
fn test_step_update_rejects_foreign_payload() {
    let state = running_search();
    let err = reduce(
        &state,
        &PipelineAction::StepUpdate {
            step_id: StepId::Search,
            data: StepData::Confidence(ConfidenceData::default()),
        },
    )
    .unwrap_err();

    assert_eq!(
        err,
        TransitionError::DataMismatch {
            action: "STEP_UPDATE",
            step: StepId::Search,
            payload: StepId::Confidence,
        }
    );
}

#[test]
fn test_step_complete_sets_final_data() {
    let state = apply(
        running_search(),
        &[PipelineAction::StepComplete {
            step_id: StepId::Search,
            data: Some(search_data(&["a"])),
            at: at(3),
        }],
    );

    let search = state.step(StepId::Search).unwrap();
    assert_eq!(search.status, StepStatus::Complete);
    assert_eq!(search.completed_at, Some(at(3)));
    assert_eq!(search.data, Some(search_data(&["a"])));
    assert_eq!(search.duration(), Some(chrono::Duration::seconds(3)));
}

#[test]
fn test_step_complete_without_data_keeps_existing() {
    let state = apply(
        running_search(),
        &[
            PipelineAction::StepUpdate {
                step_id: StepId::Search,
                data: search_data(&["a"]),
            },
            PipelineAction::StepComplete {
                step_id: StepId::Search,
                data: None,
                at: at(1),
            },
        ],
    );
    assert_eq!(state.hits().len(), 1);
}

#[test]
fn test_duplicate_step_complete_rejected_without_mutation() {
    let state = apply(
        running_search(),
        &[PipelineAction::StepComplete {
            step_id: StepId::Search,
            data: Some(search_data(&["a"])),
            at: at(1),
        }],
    );

    let duplicate = PipelineAction::StepComplete {
        step_id: StepId::Search,
        data: Some(search_data(&["z"])),
        at: at(2),
    };
    let err = reduce(&state, &duplicate).unwrap_err();

    assert!(matches!(
        err,
        TransitionError::InvalidStepStatus {
            actual: StepStatus::Complete,
            ..
        }
    ));
    assert_eq!(state.hits()[0].id, "a");
}

#[test]
fn test_error_freezes_steps() {
    let state = apply(
        running_search(),
        &[PipelineAction::Error {
            error: "timeout".to_string(),
        }],
    );

    assert_eq!(state.overall_status, OverallStatus::Error);
    assert_eq!(state.error.as_deref(), Some("timeout"));
    assert_eq!(state.step(StepId::Search).unwrap().status, StepStatus::Running);
    assert_eq!(
        state.step(StepId::Generation).unwrap().status,
        StepStatus::Pending
    );
}

#[test]
fn test_complete_does_not_touch_steps() {
    let state = apply(running_search(), &[PipelineAction::Complete]);

    assert_eq!(state.overall_status, OverallStatus::Complete);
    assert_eq!(state.step(StepId::Search).unwrap().status, StepStatus::Running);
}

#[test]
fn test_finished_run_is_frozen() {
    let complete = apply(running_search(), &[PipelineAction::Complete]);

    let frozen_actions = [
        step_start(StepId::Generation, 5),
        PipelineAction::StepUpdate {
            step_id: StepId::Search,
            data: search_data(&["late"]),
        },
        PipelineAction::Complete,
        PipelineAction::Error {
            error: "late".to_string(),
        },
    ];
    for action in &frozen_actions {
        let err = reduce(&complete, action).unwrap_err();
        assert!(
            matches!(err, TransitionError::PipelineNotRunning { status: OverallStatus::Complete, .. }),
            "{} should be rejected after completion",
            action.name()
        );
    }
}

#[test]
fn test_status_never_returns_to_running_without_start() {
    let terminal_states = [
        apply(running_search(), &[PipelineAction::Complete]),
        apply(
            running_search(),
            &[PipelineAction::Error {
                error: "boom".to_string(),
            }],
        ),
    ];
    let candidates = [
        step_start(StepId::Generation, 9),
        PipelineAction::Complete,
        PipelineAction::StepComplete {
            step_id: StepId::Search,
            data: None,
            at: at(9),
        },
    ];

    for state in &terminal_states {
        for action in &candidates {
            let after = reduce(state, action).unwrap_or_else(|_| state.clone());
            assert_ne!(after.overall_status, OverallStatus::Running);
        }
        let reset = apply(state.clone(), &[PipelineAction::Reset]);
        assert_eq!(reset.overall_status, OverallStatus::Idle);
    }
}

#[test]
fn test_reset_always_yields_idle() {
    let states = [
        PipelineState::idle(),
        running_search(),
        apply(running_search(), &[PipelineAction::Complete]),
        apply(
            running_search(),
            &[PipelineAction::Error {
                error: "x".to_string(),
            }],
        ),
    ];

    for state in &states {
        let reset = reduce(state, &PipelineAction::Reset).unwrap();
        assert_eq!(reset, PipelineState::idle());
    }
}

#[test]
fn test_rejection_leaves_input_untouched() {
    let state = running_search();
    let snapshot = state.clone();

    let _ = reduce(&state, &step_start(StepId::Search, 7));
    let _ = reduce(&state, &start(&[]));

    assert_eq!(state, snapshot);
}
