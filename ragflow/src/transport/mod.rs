//! The backend streaming call.
//!
//! The orchestrator only sees the backend through [`StreamTransport`]: open a
//! stream for a request, then pull typed events until a terminal one arrives.
//! Dropping the returned stream must stop delivery (for HTTP, it closes the
//! connection).

mod sse;

#[cfg(feature = "http")]
mod http_sse;

pub use sse::SseDecoder;

#[cfg(feature = "http")]
pub use http_sse::HttpSseTransport;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::adapter::BackendEvent;
use crate::config::{GeneratorConfig, RunConfig};
use crate::controller::RunId;
use crate::core::EnabledSteps;
use crate::errors::TransportError;

/// Stream of backend events for one run.
pub type EventStream = BoxStream<'static, Result<BackendEvent, TransportError>>;

/// Opens backend event streams.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Issues the streaming request for one run.
    async fn open(&self, request: RunRequest) -> Result<EventStream, TransportError>;
}

/// Everything the backend needs to execute one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    /// Run this request belongs to.
    pub run_id: RunId,
    /// The user's query.
    pub query: String,
    /// Run options.
    pub config: RunConfig,
}

impl RunRequest {
    /// Creates a request.
    #[must_use]
    pub fn new(run_id: RunId, query: impl Into<String>, config: RunConfig) -> Self {
        Self {
            run_id,
            query: query.into(),
            config,
        }
    }

    /// The request body sent to the backend.
    #[must_use]
    pub fn body(&self) -> RunRequestBody<'_> {
        RunRequestBody {
            run_id: self.run_id.to_string(),
            query: &self.query,
            enabled_steps: &self.config.enabled_steps,
            generator_config: &self.config.generator_config,
            limit: self.config.limit,
            system_prompt: self.config.system_prompt.as_deref(),
            followup_count: self.config.followup_count,
        }
    }
}

/// Wire shape of a run request.
#[derive(Debug, Serialize)]
pub struct RunRequestBody<'a> {
    /// Run identifier.
    pub run_id: String,
    /// The user's query.
    pub query: &'a str,
    /// Steps taking part in the run.
    pub enabled_steps: &'a EnabledSteps,
    /// Generator settings.
    pub generator_config: &'a GeneratorConfig,
    /// Hit limit.
    pub limit: usize,
    /// System prompt override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<&'a str>,
    /// Follow-up question count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub followup_count: Option<u32>,
}
