//! Utility types for timestamps, clocks and identifiers.

mod clock;
pub mod timestamps;

pub use clock::{Clock, ManualClock, SystemClock};
pub use timestamps::{iso_timestamp, format_timestamp, Timestamp};

use uuid::Uuid;

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}
