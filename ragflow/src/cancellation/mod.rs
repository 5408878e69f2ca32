//! Cooperative cancellation of runs.
//!
//! Each run gets its own [`CancellationToken`]. The controller's driver task
//! races the backend stream against the token and drops the stream as soon as
//! the token fires.

mod token;

pub use token::CancellationToken;
