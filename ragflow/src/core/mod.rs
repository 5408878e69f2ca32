//! Core domain model types for ragflow.
//!
//! This module contains the data the orchestrator works on:
//! - Step identifiers and status enums
//! - Typed per-step payloads
//! - The pipeline state aggregate

mod state;
mod status;
mod step;

pub use state::PipelineState;
pub use status::{EnabledSteps, OverallStatus, StepId, StepStatus};
pub use step::{
    ClassificationData, ConfidenceData, FollowupData, GenerationData, Hit, PipelineStep,
    SearchData, StepData,
};
