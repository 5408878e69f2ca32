//! Per-run translation of backend events into reducer actions.

use std::sync::Arc;
use tracing::{debug, warn};

use super::BackendEvent;
use crate::config::RunConfig;
use crate::core::{
    ClassificationData, ConfidenceData, EnabledSteps, FollowupData, GenerationData, Hit,
    SearchData, StepData, StepId,
};
use crate::reducer::PipelineAction;
use crate::utils::Clock;

/// Turns one run's backend events into a well-formed action sequence.
///
/// The backend never says when search or generation start and finish, and it
/// only loosely orders its events. The adapter derives those boundaries from
/// the events themselves (the first answer chunk ends retrieval, `done` ends
/// everything) and keeps the accumulation buffers that back each
/// `STEP_UPDATE` snapshot.
///
/// A fresh adapter is created for every run.
pub struct StreamEventAdapter {
    enabled: EnabledSteps,
    provider: String,
    model: String,
    clock: Arc<dyn Clock>,
    hits: Vec<Hit>,
    answer: String,
    questions: Vec<String>,
    search_started: bool,
    search_completed: bool,
    followup_started: bool,
    confidence_reported: bool,
    finished: bool,
}

impl StreamEventAdapter {
    /// Creates an adapter for a run using `config`.
    pub fn new(config: &RunConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            enabled: config.enabled_steps.clone(),
            provider: config.generator_config.provider.clone(),
            model: config.generator_config.model.clone(),
            clock,
            hits: Vec::new(),
            answer: String::new(),
            questions: Vec::new(),
            search_started: false,
            search_completed: false,
            followup_started: false,
            confidence_reported: false,
            finished: false,
        }
    }

    /// Actions that open the run: `START` and the first `STEP_START`.
    pub fn begin(&mut self) -> Vec<PipelineAction> {
        let first = self.enabled.first();
        self.search_started = first == StepId::Search;
        vec![
            PipelineAction::Start {
                enabled_steps: self.enabled.clone(),
            },
            self.step_start(first),
        ]
    }

    /// Translates one backend event.
    ///
    /// Returns no actions once a terminal event has been handled.
    pub fn handle(&mut self, event: BackendEvent) -> Vec<PipelineAction> {
        if self.finished {
            debug!(event = event.kind(), "Ignoring event after terminal event");
            return Vec::new();
        }

        let mut actions = Vec::new();
        match event {
            BackendEvent::Classification(result) => self.on_classification(result, &mut actions),
            BackendEvent::Hit(hit) => self.on_hit(hit, &mut actions),
            BackendEvent::AnswerChunk { text } => self.on_answer_chunk(&text, &mut actions),
            BackendEvent::FollowupQuestion { text } => self.on_followup(text, &mut actions),
            BackendEvent::Confidence(scores) => self.on_confidence(scores, &mut actions),
            BackendEvent::Error { message } => {
                self.finished = true;
                actions.push(PipelineAction::Error { error: message });
            }
            BackendEvent::Done => self.on_done(&mut actions),
        }
        actions
    }

    /// Fails the run because the transport broke.
    ///
    /// Returns no actions if the run already ended.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<PipelineAction> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        vec![PipelineAction::Error {
            error: message.into(),
        }]
    }

    /// Returns true once a terminal event or failure has been handled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Answer text accumulated so far.
    #[must_use]
    pub fn answer_text(&self) -> &str {
        &self.answer
    }

    fn on_classification(&mut self, result: ClassificationData, actions: &mut Vec<PipelineAction>) {
        if !self.enabled.contains(StepId::Classification) {
            warn!("Ignoring classification result: classification is not enabled");
            return;
        }
        if self.search_started {
            warn!("Ignoring classification result: retrieval already started");
            return;
        }
        actions.push(self.step_complete(
            StepId::Classification,
            Some(StepData::Classification(result)),
        ));
        self.search_started = true;
        actions.push(self.step_start(StepId::Search));
    }

    fn on_hit(&mut self, hit: Hit, actions: &mut Vec<PipelineAction>) {
        if self.search_completed {
            warn!(hit = %hit.id, "Ignoring hit received after retrieval concluded");
            return;
        }
        self.ensure_search_started(actions);
        self.hits.push(hit);
        actions.push(PipelineAction::StepUpdate {
            step_id: StepId::Search,
            data: self.search_data(),
        });
    }

    fn on_answer_chunk(&mut self, text: &str, actions: &mut Vec<PipelineAction>) {
        self.ensure_generation_started(actions);
        self.answer.push_str(text);
        actions.push(PipelineAction::StepUpdate {
            step_id: StepId::Generation,
            data: self.generation_data(),
        });
    }

    fn on_followup(&mut self, question: String, actions: &mut Vec<PipelineAction>) {
        if !self.enabled.contains(StepId::Followup) {
            warn!("Ignoring follow-up question: followup is not enabled");
            return;
        }
        self.ensure_generation_started(actions);
        if !self.followup_started {
            self.followup_started = true;
            actions.push(self.step_start(StepId::Followup));
        }
        self.questions.push(question);
        actions.push(PipelineAction::StepUpdate {
            step_id: StepId::Followup,
            data: self.followup_data(),
        });
    }

    fn on_confidence(&mut self, scores: ConfidenceData, actions: &mut Vec<PipelineAction>) {
        if !self.enabled.contains(StepId::Confidence) {
            warn!("Ignoring confidence result: confidence is not enabled");
            return;
        }
        if self.confidence_reported {
            warn!("Ignoring duplicate confidence result");
            return;
        }
        if !scores.is_normalized() {
            warn!(
                generation_confidence = scores.generation_confidence,
                context_relevance = scores.context_relevance,
                "Confidence scores outside [0, 1]; clamping"
            );
        }
        self.ensure_generation_started(actions);
        self.confidence_reported = true;
        actions.push(self.step_start(StepId::Confidence));
        actions.push(self.step_complete(
            StepId::Confidence,
            Some(StepData::Confidence(scores.clamped())),
        ));
    }

    /// Completes every enabled step that is not complete yet, then the run.
    fn on_done(&mut self, actions: &mut Vec<PipelineAction>) {
        self.finished = true;
        self.ensure_generation_started(actions);
        actions.push(self.step_complete(StepId::Generation, Some(self.generation_data())));

        if self.enabled.contains(StepId::Confidence) && !self.confidence_reported {
            self.confidence_reported = true;
            actions.push(self.step_start(StepId::Confidence));
            actions.push(self.step_complete(StepId::Confidence, None));
        }
        if self.enabled.contains(StepId::Followup) {
            if !self.followup_started {
                self.followup_started = true;
                actions.push(self.step_start(StepId::Followup));
            }
            actions.push(self.step_complete(StepId::Followup, Some(self.followup_data())));
        }
        actions.push(PipelineAction::Complete);
    }

    /// Concludes classification (without a result) if it is still running.
    fn ensure_search_started(&mut self, actions: &mut Vec<PipelineAction>) {
        if self.search_started {
            return;
        }
        debug!("Retrieval began before a classification result; concluding classification");
        actions.push(self.step_complete(StepId::Classification, None));
        self.search_started = true;
        actions.push(self.step_start(StepId::Search));
    }

    /// The one-time retrieval → generation boundary.
    fn ensure_generation_started(&mut self, actions: &mut Vec<PipelineAction>) {
        if self.search_completed {
            return;
        }
        self.ensure_search_started(actions);
        self.search_completed = true;
        actions.push(self.step_complete(StepId::Search, Some(self.search_data())));
        actions.push(self.step_start(StepId::Generation));
    }

    fn step_start(&self, step_id: StepId) -> PipelineAction {
        PipelineAction::StepStart {
            step_id,
            at: self.clock.now(),
        }
    }

    fn step_complete(&self, step_id: StepId, data: Option<StepData>) -> PipelineAction {
        PipelineAction::StepComplete {
            step_id,
            data,
            at: self.clock.now(),
        }
    }

    fn search_data(&self) -> StepData {
        StepData::Search(SearchData {
            hits: self.hits.clone(),
        })
    }

    fn generation_data(&self) -> StepData {
        StepData::Generation(GenerationData {
            answer_text: self.answer.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
        })
    }

    fn followup_data(&self) -> StepData {
        StepData::Followup(FollowupData {
            questions: self.questions.clone(),
        })
    }
}

impl std::fmt::Debug for StreamEventAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamEventAdapter")
            .field("enabled", &self.enabled)
            .field("hits", &self.hits.len())
            .field("answer_len", &self.answer.len())
            .field("questions", &self.questions.len())
            .field("search_completed", &self.search_completed)
            .field("finished", &self.finished)
            .finish()
    }
}
