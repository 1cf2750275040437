//! Script Generation
//!
//! Turns the classified item stream into a persisted Lua script. The
//! [`composer`] folds repeats and batches comments; the [`writer`] owns the
//! file, its header and footer, and append-mode splicing.

pub mod action;
pub mod composer;
pub mod writer;

pub use action::{ActionLine, ScriptItem};
pub use composer::Composer;
pub use writer::ScriptWriter;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Smallest repeat count that may become a loop
pub const MIN_CYCLE_COUNT: usize = 3;

/// How a new recording is placed in the script file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Replace the file with a fresh `test()` function
    #[default]
    New,
    /// Splice generated lines into an existing script at `append_line`
    Append,
}

/// How item arguments are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TextIndexBehavior {
    /// Item number, with the text as a comment
    #[default]
    Index,
    /// Quoted item text
    Text,
    /// `'text_index'`
    TextIndex,
}

/// Script generation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Output script (`.lua`)
    pub script_path: PathBuf,
    /// New file or append into an existing one
    pub write_mode: WriteMode,
    /// 0-based line index where appended lines go
    pub append_line: usize,
    /// Spaces per indentation level
    pub indent: usize,
    /// Fold repeated lines into `for` loops
    pub cycles: bool,
    /// Repeat count needed for a loop
    pub cycle_min: usize,
    /// Comment batches of at least this many lines use `--[[ ]]` (0 = never)
    pub block_comment_min: usize,
    /// Follow recognized lines with the raw `mouseClick` as a comment
    pub duplicate_mouse_event: bool,
    pub text_index_behavior: TextIndexBehavior,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            script_path: PathBuf::from("recorded.lua"),
            write_mode: WriteMode::New,
            append_line: 0,
            indent: 4,
            cycles: true,
            cycle_min: MIN_CYCLE_COUNT,
            block_comment_min: 0,
            duplicate_mouse_event: false,
            text_index_behavior: TextIndexBehavior::Index,
        }
    }
}

impl GenerationConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.indent == 0 {
            return Err(crate::Error::Config("indent must be > 0".to_string()));
        }
        if self.cycle_min < MIN_CYCLE_COUNT {
            return Err(crate::Error::Config(format!(
                "cycle_min must be >= {}, got {}",
                MIN_CYCLE_COUNT, self.cycle_min
            )));
        }
        Ok(())
    }

    pub fn indent_str(&self, level: usize) -> String {
        " ".repeat(self.indent * level)
    }
}
