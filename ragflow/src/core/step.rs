//! Per-step payloads and the pipeline step record.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::status::{StepId, StepStatus};
use crate::utils::Timestamp;

/// A retrieved document.
///
/// Only `id` and `score` are interpreted; every other field the backend sends
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Document identifier.
    pub id: String,
    /// Retrieval score, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Remaining document fields.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl Hit {
    /// Creates a hit with no score and no extra fields.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            score: None,
            fields: serde_json::Map::new(),
        }
    }

    /// Sets the score.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Adds a document field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// Result of query classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClassificationData {
    /// Retrieval strategy chosen by the classifier (e.g. "semantic").
    pub strategy: String,
    /// Semantic matching mode.
    #[serde(default)]
    pub semantic_mode: String,
    /// Rewritten query used for semantic retrieval.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_query: Option<String>,
    /// Classifier explanation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

/// Hits retrieved so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchData {
    /// Hits in backend order.
    pub hits: Vec<Hit>,
}

/// Answer text generated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct GenerationData {
    /// Concatenation of all answer chunks received.
    pub answer_text: String,
    /// Generator provider.
    pub provider: String,
    /// Generator model.
    pub model: String,
}

/// Confidence scores for the generated answer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ConfidenceData {
    /// Confidence in the generated answer, in `[0, 1]`.
    pub generation_confidence: f64,
    /// Relevance of the retrieved context, in `[0, 1]`.
    pub context_relevance: f64,
}

impl ConfidenceData {
    /// Returns a copy with both scores forced into `[0, 1]`. NaN becomes 0.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            generation_confidence: clamp_unit(self.generation_confidence),
            context_relevance: clamp_unit(self.context_relevance),
        }
    }

    /// Returns true if both scores already lie in `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        (0.0..=1.0).contains(&self.generation_confidence)
            && (0.0..=1.0).contains(&self.context_relevance)
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Follow-up questions generated so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct FollowupData {
    /// Questions in arrival order.
    pub questions: Vec<String>,
}

/// Step payload, keyed by the step it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum StepData {
    /// Classification payload.
    Classification(ClassificationData),
    /// Search payload.
    Search(SearchData),
    /// Generation payload.
    Generation(GenerationData),
    /// Confidence payload.
    Confidence(ConfidenceData),
    /// Follow-up payload.
    Followup(FollowupData),
}

impl StepData {
    /// The step this payload belongs to.
    #[must_use]
    pub fn step_id(&self) -> StepId {
        match self {
            Self::Classification(_) => StepId::Classification,
            Self::Search(_) => StepId::Search,
            Self::Generation(_) => StepId::Generation,
            Self::Confidence(_) => StepId::Confidence,
            Self::Followup(_) => StepId::Followup,
        }
    }
}

/// One step of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStep {
    /// Which step this is.
    pub id: StepId,
    /// Current status.
    pub status: StepStatus,
    /// Latest payload; only set once the step is running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<StepData>,
    /// When the step started running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
    /// When the step completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<Timestamp>,
}

impl PipelineStep {
    /// Creates a pending step with no data.
    #[must_use]
    pub fn pending(id: StepId) -> Self {
        Self {
            id,
            status: StepStatus::Pending,
            data: None,
            started_at: None,
            completed_at: None,
        }
    }

    /// Time between start and completion, once both are known.
    #[must_use]
    pub fn duration(&self) -> Option<Duration> {
        match (self.started_at, self.completed_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    /// Returns true if the step is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == StepStatus::Running
    }

    /// Returns true if the step has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.status == StepStatus::Complete
    }
}
