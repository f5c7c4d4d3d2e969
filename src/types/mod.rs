//! Shared types

pub mod clock;
pub mod error;

pub use clock::{format_day, parse_day, Clock, FixedClock, SystemClock, DAY_FORMAT};
pub use error::{HealthError, Result};
