//! Backend event stream adaptation.
//!
//! This module provides:
//! - The typed backend event set
//! - The per-run adapter that turns those events into reducer actions

mod events;
mod stream;

#[cfg(test)]
mod adapter_tests;

pub use events::BackendEvent;
pub use stream::StreamEventAdapter;
