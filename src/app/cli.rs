//! Command-Line Interface

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Widget Replay - record and replay GUI interactions as Lua scripts
#[derive(Parser, Debug)]
#[command(name = "widget-replay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a script without running it and list its actions
    Check {
        /// Script to check
        script: PathBuf,
    },

    /// Initialize configuration
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// View or modify configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the launch settings blob for the injected engine
    LaunchBlob {
        /// Session to start
        #[arg(value_enum)]
        mode: LaunchModeArg,

        /// Script to record into or replay (overrides the config)
        #[arg(short, long)]
        script: Option<PathBuf>,
    },
}

/// Session kind for `launch-blob`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchModeArg {
    Record,
    Run,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Set a configuration value
    Set {
        /// Configuration key (e.g., "run.verify_attempts", "generation.indent")
        key: String,

        /// Value to set
        value: String,
    },

    /// Get a specific configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
