//! # Ragflow
//!
//! Orchestration for a streaming retrieval-augmented-generation pipeline.
//!
//! A run moves through up to five steps (classification, search,
//! generation, confidence, followup) while a backend streams loosely ordered
//! events. Ragflow turns that stream into a consistent, observable state:
//!
//! - **Pure state machine**: [`reducer::reduce`] applies typed actions to a
//!   [`core::PipelineState`] and rejects malformed sequences without mutation
//! - **Event adapter**: [`adapter::StreamEventAdapter`] derives step
//!   boundaries from backend events
//! - **Run controller**: [`controller::RunController`] owns one active run,
//!   cancels superseded runs and publishes state snapshots
//! - **Transport seam**: [`transport::StreamTransport`], with an HTTP
//!   Server-Sent-Events implementation behind the `http` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragflow::prelude::*;
//!
//! let transport = HttpSseTransport::new(SseTransportConfig::new("http://localhost:8080"))?;
//! let controller = RunController::new(Arc::new(transport));
//!
//! controller.start("What is a vector index?", RunConfig::new(GeneratorConfig::new("openai", "gpt-4o-mini")))?;
//! controller.join().await;
//! println!("{}", controller.state().answer_text());
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod adapter;
pub mod cancellation;
pub mod config;
pub mod controller;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod reducer;
pub mod testing;
pub mod transport;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::adapter::{BackendEvent, StreamEventAdapter};
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{ControllerConfig, GeneratorConfig, RunConfig, SseTransportConfig};
    pub use crate::controller::{RunController, RunHandle, RunId};
    pub use crate::core::{
        ClassificationData, ConfidenceData, EnabledSteps, FollowupData, GenerationData, Hit,
        OverallStatus, PipelineState, PipelineStep, SearchData, StepData, StepId, StepStatus,
    };
    pub use crate::errors::{ConfigError, RagflowError, TransitionError, TransportError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::reducer::{reduce, PipelineAction, PipelineStore};
    #[cfg(feature = "http")]
    pub use crate::transport::HttpSseTransport;
    pub use crate::transport::{EventStream, RunRequest, StreamTransport};
    pub use crate::utils::{generate_uuid, iso_timestamp, Clock, SystemClock, Timestamp};
}
