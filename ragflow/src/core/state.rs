//! The pipeline state aggregate.

use serde::{Deserialize, Serialize};

use super::status::{EnabledSteps, OverallStatus, StepId};
use super::step::{ConfidenceData, Hit, PipelineStep, StepData};

/// Everything the UI needs to render one run.
///
/// Steps appear in declared order and only enabled steps are present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineState {
    /// Enabled steps in declared order.
    pub steps: Vec<PipelineStep>,
    /// Status of the run as a whole.
    pub overall_status: OverallStatus,
    /// Backend or transport error message, when the run failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PipelineState {
    /// The idle state with no steps.
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }

    /// A freshly started run: one pending step per enabled step.
    #[must_use]
    pub fn started(enabled: &EnabledSteps) -> Self {
        Self {
            steps: enabled.iter().map(PipelineStep::pending).collect(),
            overall_status: OverallStatus::Running,
            error: None,
        }
    }

    /// Looks up a step.
    #[must_use]
    pub fn step(&self, id: StepId) -> Option<&PipelineStep> {
        self.steps.iter().find(|step| step.id == id)
    }

    pub(crate) fn step_mut(&mut self, id: StepId) -> Option<&mut PipelineStep> {
        self.steps.iter_mut().find(|step| step.id == id)
    }

    /// Returns true while a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.overall_status == OverallStatus::Running
    }

    /// Returns true once the run completed or failed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.overall_status.is_terminal()
    }

    /// Steps currently running.
    pub fn running_steps(&self) -> impl Iterator<Item = &PipelineStep> {
        self.steps.iter().filter(|step| step.is_running())
    }

    /// Hits retrieved so far.
    #[must_use]
    pub fn hits(&self) -> &[Hit] {
        match self.data(StepId::Search) {
            Some(StepData::Search(data)) => &data.hits,
            _ => &[],
        }
    }

    /// Answer text generated so far.
    #[must_use]
    pub fn answer_text(&self) -> &str {
        match self.data(StepId::Generation) {
            Some(StepData::Generation(data)) => &data.answer_text,
            _ => "",
        }
    }

    /// Follow-up questions generated so far.
    #[must_use]
    pub fn followup_questions(&self) -> &[String] {
        match self.data(StepId::Followup) {
            Some(StepData::Followup(data)) => &data.questions,
            _ => &[],
        }
    }

    /// Confidence scores, once reported.
    #[must_use]
    pub fn confidence(&self) -> Option<ConfidenceData> {
        match self.data(StepId::Confidence) {
            Some(StepData::Confidence(data)) => Some(*data),
            _ => None,
        }
    }

    fn data(&self, id: StepId) -> Option<&StepData> {
        self.step(id).and_then(|step| step.data.as_ref())
    }
}
