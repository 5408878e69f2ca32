//! Events emitted by the backend streaming call.

use serde::{Deserialize, Serialize};

use crate::core::{ClassificationData, ConfidenceData, Hit};

/// One event of a backend stream.
///
/// A run's stream ends with exactly one terminal event, [`BackendEvent::Done`]
/// or [`BackendEvent::Error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendEvent {
    /// Query classification result.
    Classification(ClassificationData),
    /// One retrieved document.
    Hit(Hit),
    /// A piece of the answer text.
    AnswerChunk {
        /// Text to append.
        text: String,
    },
    /// One follow-up question.
    FollowupQuestion {
        /// The question.
        text: String,
    },
    /// Confidence scores.
    Confidence(ConfidenceData),
    /// Backend-reported failure.
    Error {
        /// Message to show verbatim.
        message: String,
    },
    /// Successful end of stream.
    Done,
}

impl BackendEvent {
    /// Returns true for `done` and `error`.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }

    /// Returns the wire name of the event.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Classification(_) => "classification",
            Self::Hit(_) => "hit",
            Self::AnswerChunk { .. } => "answer_chunk",
            Self::FollowupQuestion { .. } => "followup_question",
            Self::Confidence(_) => "confidence",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Creates an answer chunk event.
    #[must_use]
    pub fn chunk(text: impl Into<String>) -> Self {
        Self::AnswerChunk { text: text.into() }
    }

    /// Creates a follow-up question event.
    #[must_use]
    pub fn followup(text: impl Into<String>) -> Self {
        Self::FollowupQuestion { text: text.into() }
    }

    /// Creates an error event.
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
