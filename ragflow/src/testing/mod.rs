//! Testing utilities for ragflow runs.
//!
//! This module provides:
//! - Fixtures for configs, hits and adapters
//! - Assertions over pipeline state
//! - In-memory transports for driving the controller

mod assertions;
mod fixtures;
mod transports;

pub use assertions::{
    assert_all_steps_complete, assert_no_diagnostics, assert_overall_status, assert_start_order,
    assert_step_status,
};
pub use fixtures::{drive, generator, hit, run_config, test_adapter};
pub use transports::{ChannelTransport, ScriptedTransport, StreamSender};
