//! GUI Thread Dispatch
//!
//! The GUI thread owns every live object. Other threads reach it through a
//! [`GuiHandle`]: `post` queues work, `call` blocks until the work has run and
//! returns its result. Timers only ever start on the home thread.

pub mod event_loop;

pub use event_loop::{GuiHandle, GuiLoop};
