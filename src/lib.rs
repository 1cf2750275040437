//! # Widget Replay
//!
//! A record-and-replay test automation engine for desktop GUI applications.
//!
//! ## Overview
//!
//! The engine lives inside the target application's process. While recording it
//! mirrors the application's live object graph, classifies raw input events into
//! semantic actions and writes them to a Lua script. While replaying it runs that
//! script on a dedicated thread and drives the live objects through the GUI thread.
//!
//! ## Quick Start
//!
//! ```no_run
//! use widget_replay::gui::GuiLoop;
//! use widget_replay::workflow::Bootstrap;
//!
//! let gui = GuiLoop::new();
//! let bootstrap = Bootstrap::from_env().expect("launch settings");
//! let session = bootstrap.start(gui.handle()).expect("session");
//! # drop(session);
//! ```
//!
//! ## Architecture
//!
//! - [`time`]: Monotonic timestamps for events and deadlines
//! - [`host`]: Live object interface and an in-memory host
//! - [`gui`]: Home-thread event loop and cross-thread calls
//! - [`tracker`]: Object tracker and identity resolver
//! - [`capture`]: Raw input events and confirmation signals
//! - [`classify`]: Event classification engine
//! - [`script`]: Script composer and writer
//! - [`runner`]: Lua script runner and action API
//! - [`workflow`]: Record and replay sessions, bootstrap
//! - [`app`]: CLI and configuration management
//!
//! ## Event Pipeline
//!
//! ```text
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//! │  Lifecycle  │───▶│   Object    │───▶│   Event     │───▶│   Script    │
//! │   hooks     │    │   Tracker   │    │ Classifier  │    │   Writer    │
//! └─────────────┘    └─────────────┘    └─────────────┘    └─────────────┘
//!                           │                                     │
//!                           ▼                                     ▼
//!                    ┌─────────────┐    ┌─────────────┐    ┌─────────────┐
//!                    │   Object    │◀───│   Script    │◀───│  .lua file  │
//!                    │  Registry   │    │   Runner    │    │             │
//!                    └─────────────┘    └─────────────┘    └─────────────┘
//! ```

pub mod time;
pub mod host;
pub mod gui;
pub mod tracker;
pub mod capture;
pub mod classify;
pub mod script;
pub mod runner;
pub mod workflow;
pub mod app;

// Re-export commonly used types
pub use capture::types::{EventKind, InputEvent, Signal, SignalKind};
pub use classify::ClassificationEngine;
pub use host::{LiveObject, ObjectId, Value, WidgetClass};
pub use runner::{RunReport, ScriptRunner};
pub use script::{ScriptItem, ScriptWriter};
pub use time::Timestamp;
pub use tracker::ObjectTracker;
pub use workflow::{Bootstrap, RecordSession, ReplaySession};

/// Result type alias for the replay engine
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the replay engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Object tracker error: {0}")]
    Tracker(String),

    #[error("Classification error: {0}")]
    Classification(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Runner error: {0}")]
    Runner(String),

    #[error("GUI thread error: {0}")]
    Gui(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(String),

    #[error("Lua error: {0}")]
    Lua(#[from] mlua::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
