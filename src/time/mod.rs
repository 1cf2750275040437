//! Monotonic timing module
//!
//! Every input event, delayed-classification deadline and watchdog uses the
//! same process-wide epoch so timestamps from different threads compare.

pub mod timebase;

pub use timebase::{Timebase, Timestamp};
