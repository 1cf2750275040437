//! Workflow Module
//!
//! Explicitly constructed record and replay sessions, and the bootstrap that
//! picks one from the launch settings.

pub mod bootstrap;
pub mod session;

pub use bootstrap::{Bootstrap, LaunchSettings, Session, LAUNCH_ENV};
pub use session::{RecordSession, ReplaySession, SessionMetadata, SessionMode};
