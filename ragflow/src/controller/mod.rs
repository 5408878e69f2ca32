//! Run lifecycle: one active run at a time, fed by a backend stream.

mod run_controller;
mod run;


pub use run_controller::RunController;
pub use run::{RunHandle, RunId};
