//! Scripted event sequences fed through the adapter and the reducer.

use pretty_assertions::assert_eq;

use super::BackendEvent;
use crate::core::{
    ClassificationData, ConfidenceData, OverallStatus, StepData, StepId, StepStatus,
};
use crate::reducer::PipelineAction;
use crate::testing::{
    assert_all_steps_complete, assert_no_diagnostics, assert_overall_status,
    assert_start_order, assert_step_status, drive, hit, test_adapter,
};

fn classification(strategy: &str) -> BackendEvent {
    BackendEvent::Classification(ClassificationData {
        strategy: strategy.to_string(),
        ..ClassificationData::default()
    })
}

fn summary(actions: &[PipelineAction]) -> Vec<String> {
    actions
        .iter()
        .map(|a| match a.step_id() {
            Some(step) => format!("{}({step})", a.name()),
            None => a.name().to_string(),
        })
        .collect()
}

#[test]
fn test_begin_starts_search_without_classification() {
    let mut adapter = test_adapter(&[]);
    let actions = adapter.begin();
    assert_eq!(summary(&actions), vec!["START", "STEP_START(search)"]);
}

#[test]
fn test_begin_starts_classification_when_enabled() {
    let mut adapter = test_adapter(&[StepId::Classification]);
    let actions = adapter.begin();
    assert_eq!(
        summary(&actions),
        vec!["START", "STEP_START(classification)"]
    );
}

#[test]
fn test_hits_then_answer_then_done() {
    let (actions, store) = drive(
        &[],
        vec![
            BackendEvent::Hit(hit("A")),
            BackendEvent::Hit(hit("B")),
            BackendEvent::chunk("Hello "),
            BackendEvent::chunk("world"),
            BackendEvent::Done,
        ],
    );

    assert_eq!(
        summary(&actions),
        vec![
            "START",
            "STEP_START(search)",
            "STEP_UPDATE(search)",
            "STEP_UPDATE(search)",
            "STEP_COMPLETE(search)",
            "STEP_START(generation)",
            "STEP_UPDATE(generation)",
            "STEP_UPDATE(generation)",
            "STEP_COMPLETE(generation)",
            "COMPLETE",
        ]
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_overall_status(state, OverallStatus::Complete);
    assert_all_steps_complete(state);
    let ids: Vec<_> = state.hits().iter().map(|h| h.id.as_str()).collect();
    assert_eq!(ids, vec!["A", "B"]);
    assert_eq!(state.answer_text(), "Hello world");

    match &state.step(StepId::Generation).unwrap().data {
        Some(StepData::Generation(data)) => {
            assert_eq!(data.provider, "test-provider");
            assert_eq!(data.model, "test-model");
        }
        other => panic!("unexpected generation data {other:?}"),
    }
}

#[test]
fn test_classification_then_answer_without_hits() {
    let (actions, store) = drive(
        &[StepId::Classification],
        vec![
            classification("semantic"),
            BackendEvent::chunk("X"),
            BackendEvent::Done,
        ],
    );

    assert_eq!(
        summary(&actions)[..4],
        [
            "START",
            "STEP_START(classification)",
            "STEP_COMPLETE(classification)",
            "STEP_START(search)",
        ]
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_all_steps_complete(state);
    assert_start_order(state);
    assert!(state.hits().is_empty());
    assert_eq!(
        state.step(StepId::Search).unwrap().data,
        Some(StepData::Search(Default::default()))
    );
    assert_eq!(state.answer_text(), "X");

    let classification = state.step(StepId::Classification).unwrap();
    let search = state.step(StepId::Search).unwrap();
    assert!(classification.completed_at <= search.started_at);
}

#[test]
fn test_error_after_hit_freezes_running_step() {
    let (_, store) = drive(
        &[],
        vec![BackendEvent::Hit(hit("A")), BackendEvent::error("timeout")],
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_overall_status(state, OverallStatus::Error);
    assert_eq!(state.error.as_deref(), Some("timeout"));
    assert_step_status(state, StepId::Search, StepStatus::Running);
    assert_step_status(state, StepId::Generation, StepStatus::Pending);
}

#[test]
fn test_events_after_terminal_are_ignored() {
    let mut adapter = test_adapter(&[]);
    adapter.begin();
    assert!(!adapter.handle(BackendEvent::error("boom")).is_empty());
    assert!(adapter.is_finished());

    assert!(adapter.handle(BackendEvent::chunk("late")).is_empty());
    assert!(adapter.handle(BackendEvent::Done).is_empty());
    assert!(adapter.fail("transport").is_empty());
}

#[test]
fn test_followups_interleave_with_answer() {
    let (_, store) = drive(
        &[StepId::Followup],
        vec![
            BackendEvent::chunk("Part one. "),
            BackendEvent::followup("What next?"),
            BackendEvent::chunk("Part two."),
            BackendEvent::followup("Why?"),
            BackendEvent::Done,
        ],
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_all_steps_complete(state);
    assert_start_order(state);
    assert_eq!(state.answer_text(), "Part one. Part two.");
    assert_eq!(
        state.followup_questions(),
        ["What next?".to_string(), "Why?".to_string()]
    );
}

#[test]
fn test_followup_starts_on_first_question() {
    let mut adapter = test_adapter(&[StepId::Followup]);
    adapter.begin();
    adapter.handle(BackendEvent::chunk("A"));

    let first = adapter.handle(BackendEvent::followup("Q1"));
    assert_eq!(
        summary(&first),
        vec!["STEP_START(followup)", "STEP_UPDATE(followup)"]
    );

    let second = adapter.handle(BackendEvent::followup("Q2"));
    assert_eq!(summary(&second), vec!["STEP_UPDATE(followup)"]);
}

#[test]
fn test_search_completes_exactly_once() {
    let mut events: Vec<_> = (0..25).map(|i| BackendEvent::Hit(hit(&format!("h{i}")))).collect();
    events.extend((0..5).map(|i| BackendEvent::chunk(format!("c{i}"))));
    events.push(BackendEvent::Done);

    let (actions, store) = drive(&[], events);

    let completions = actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                PipelineAction::StepComplete {
                    step_id: StepId::Search,
                    ..
                }
            )
        })
        .count();
    assert_eq!(completions, 1);
    assert_eq!(store.state().hits().len(), 25);
}

#[test]
fn test_hit_snapshots_extend_previous() {
    let events: Vec<_> = ["a", "b", "c", "d"]
        .iter()
        .map(|id| BackendEvent::Hit(hit(id)))
        .collect();
    let (actions, _) = drive(&[], events);

    let snapshots: Vec<Vec<String>> = actions
        .iter()
        .filter_map(|a| match a {
            PipelineAction::StepUpdate {
                data: StepData::Search(data),
                ..
            } => Some(data.hits.iter().map(|h| h.id.clone()).collect()),
            _ => None,
        })
        .collect();

    assert_eq!(snapshots.len(), 4);
    for pair in snapshots.windows(2) {
        assert_eq!(pair[1].len(), pair[0].len() + 1);
        assert_eq!(pair[1][..pair[0].len()], pair[0][..]);
    }
}

#[test]
fn test_hit_after_first_chunk_is_dropped() {
    let (_, store) = drive(
        &[],
        vec![
            BackendEvent::Hit(hit("A")),
            BackendEvent::chunk("x"),
            BackendEvent::Hit(hit("late")),
            BackendEvent::Done,
        ],
    );

    assert_no_diagnostics(&store);
    assert_eq!(store.state().hits().len(), 1);
}

#[test]
fn test_confidence_is_single_shot() {
    let scores = ConfidenceData {
        generation_confidence: 0.8,
        context_relevance: 0.6,
    };
    let (actions, store) = drive(
        &[StepId::Confidence],
        vec![
            BackendEvent::chunk("answer"),
            BackendEvent::Confidence(scores),
            BackendEvent::Confidence(ConfidenceData::default()),
            BackendEvent::Done,
        ],
    );

    let starts = actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                PipelineAction::StepStart {
                    step_id: StepId::Confidence,
                    ..
                }
            )
        })
        .count();
    assert_eq!(starts, 1);
    assert_no_diagnostics(&store);
    assert_eq!(store.state().confidence(), Some(scores));
}

#[test]
fn test_confidence_scores_are_clamped() {
    let (_, store) = drive(
        &[StepId::Confidence],
        vec![
            BackendEvent::chunk("a"),
            BackendEvent::Confidence(ConfidenceData {
                generation_confidence: 1.4,
                context_relevance: -0.2,
            }),
            BackendEvent::Done,
        ],
    );

    let confidence = store.state().confidence().unwrap();
    assert!(confidence.is_normalized());
}

#[test]
fn test_late_stage_event_forces_earlier_boundaries() {
    let (_, store) = drive(
        &[StepId::Classification, StepId::Confidence],
        vec![
            BackendEvent::Confidence(ConfidenceData {
                generation_confidence: 0.5,
                context_relevance: 0.5,
            }),
            BackendEvent::Done,
        ],
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_all_steps_complete(state);
    assert_start_order(state);
    assert!(state.step(StepId::Classification).unwrap().data.is_none());
}

#[test]
fn test_done_completes_every_enabled_step() {
    let (_, store) = drive(
        &[StepId::Classification, StepId::Confidence, StepId::Followup],
        vec![BackendEvent::Done],
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_overall_status(state, OverallStatus::Complete);
    assert_all_steps_complete(state);
    assert_start_order(state);
    assert!(state.followup_questions().is_empty());
    assert!(state.confidence().is_none());
    assert_eq!(state.answer_text(), "");
}

#[test]
fn test_events_for_disabled_steps_are_ignored() {
    let mut adapter = test_adapter(&[]);
    adapter.begin();

    assert!(adapter.handle(classification("keyword")).is_empty());
    assert!(adapter.handle(BackendEvent::followup("Q")).is_empty());
    assert!(adapter
        .handle(BackendEvent::Confidence(ConfidenceData::default()))
        .is_empty());
}

#[test]
fn test_duplicate_classification_is_ignored() {
    let (_, store) = drive(
        &[StepId::Classification],
        vec![
            classification("semantic"),
            classification("keyword"),
            BackendEvent::Done,
        ],
    );

    assert_no_diagnostics(&store);
    match &store.state().step(StepId::Classification).unwrap().data {
        Some(StepData::Classification(data)) => assert_eq!(data.strategy, "semantic"),
        other => panic!("unexpected classification data {other:?}"),
    }
}

#[test]
fn test_hit_before_classification_concludes_it() {
    let (_, store) = drive(
        &[StepId::Classification],
        vec![BackendEvent::Hit(hit("A")), BackendEvent::Done],
    );

    let state = store.state();
    assert_no_diagnostics(&store);
    assert_all_steps_complete(state);
    assert_start_order(state);
    assert_eq!(state.hits().len(), 1);
}

#[test]
fn test_fail_emits_single_error() {
    let mut adapter = test_adapter(&[]);
    adapter.begin();
    adapter.handle(BackendEvent::chunk("partial"));

    let actions = adapter.fail("connection lost");
    assert_eq!(
        actions,
        vec![PipelineAction::Error {
            error: "connection lost".to_string()
        }]
    );
    assert!(adapter.fail("again").is_empty());
    assert_eq!(adapter.answer_text(), "partial");
}
