//! Event capture module
//!
//! Raw input events, confirmation signals and duplicate detection. The host
//! delivers events on the GUI thread; nothing here blocks.

pub mod last_event;
pub mod types;

pub use last_event::LastEvent;
pub use types::*;
