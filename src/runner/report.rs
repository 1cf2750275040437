//! Run Reports
//!
//! Log entries, resolved paths and verification outcomes of one replay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Category of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogCategory {
    Info,
    Warning,
    Error,
    Success,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogCategory::Info => "info",
            LogCategory::Warning => "warning",
            LogCategory::Error => "error",
            LogCategory::Success => "success",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub category: LogCategory,
    pub message: String,
}

/// Outcome of one `verify` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub path: String,
    pub property: String,
    pub expected: String,
    /// Last value read; `None` if the property could not be read
    pub actual: Option<String>,
    pub passed: bool,
    pub attempts: u32,
}

/// Everything observed during one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run ID
    pub id: Uuid,
    pub script: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    pub entries: Vec<LogEntry>,
    /// Paths resolved by actions, in call order
    pub resolved_paths: Vec<String>,
    pub verifications: Vec<VerificationRecord>,
}

impl RunReport {
    pub fn new(script: impl Into<PathBuf>) -> Self {
        Self {
            id: Uuid::new_v4(),
            script: script.into(),
            started_at: Utc::now(),
            finished_at: None,
            exit_code: None,
            entries: Vec::new(),
            resolved_paths: Vec::new(),
            verifications: Vec::new(),
        }
    }

    /// Add an entry and mirror it to the tracing log
    pub fn log(&mut self, category: LogCategory, message: impl Into<String>) {
        let message = message.into();
        match category {
            LogCategory::Error => error!(category = category.as_str(), "{}", message),
            LogCategory::Warning => warn!(category = category.as_str(), "{}", message),
            LogCategory::Info | LogCategory::Success => {
                info!(category = category.as_str(), "{}", message)
            }
        }
        self.entries.push(LogEntry {
            at: Utc::now(),
            category,
            message,
        });
    }

    pub fn record_path(&mut self, path: &str) {
        self.resolved_paths.push(path.to_string());
    }

    pub fn record_verification(&mut self, record: VerificationRecord) {
        self.verifications.push(record);
    }

    pub fn finish(&mut self, exit_code: i32) {
        self.finished_at = Some(Utc::now());
        self.exit_code = Some(exit_code);
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(super::EXIT_SUCCESS)
    }

    /// Entries of one category
    pub fn entries_of(&self, category: LogCategory) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|end| (end - self.started_at).num_milliseconds())
    }

    /// Save as pretty JSON
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}
