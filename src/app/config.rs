//! Configuration Management

use crate::classify::ClassifierConfig;
use crate::runner::RunConfig;
use crate::script::GenerationConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Config {
    /// Script generation settings
    #[serde(default)]
    pub generation: GenerationConfig,
    /// Replay settings
    #[serde(default)]
    pub run: RunConfig,
    /// Event classification timings
    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl Config {
    /// Validate every section.
    /// Returns the first invalid field as an error.
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.generation.validate()?;
        self.run.validate()?;
        self.classifier.validate()?;
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &Path) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self =
            toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<(), crate::Error> {
        let content = self.to_toml()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".widget_replay").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    fn to_table(&self) -> Result<toml::Table, crate::Error> {
        match toml::Value::try_from(self) {
            Ok(toml::Value::Table(table)) => Ok(table),
            Ok(_) => Err(crate::Error::Config("configuration is not a table".to_string())),
            Err(e) => Err(crate::Error::Config(e.to_string())),
        }
    }

    /// Value at a dotted key such as `run.verify_attempts`
    pub fn get(&self, key: &str) -> Result<toml::Value, crate::Error> {
        let (section, field) = split_key(key)?;
        self.to_table()?
            .get(section)
            .and_then(|s| s.get(field))
            .cloned()
            .ok_or_else(|| crate::Error::Config(format!("unknown configuration key '{}'", key)))
    }

    /// Set a dotted key from its text form.
    ///
    /// The text is read as a TOML value when it parses as one, and as a plain
    /// string otherwise. The result must still validate.
    pub fn set(&mut self, key: &str, raw: &str) -> Result<(), crate::Error> {
        let (section, field) = split_key(key)?;
        let mut table = self.to_table()?;
        let slot = table
            .get_mut(section)
            .and_then(|s| s.as_table_mut())
            .and_then(|s| s.get_mut(field))
            .ok_or_else(|| crate::Error::Config(format!("unknown configuration key '{}'", key)))?;
        *slot = parse_value(raw);

        let updated: Config = toml::Value::Table(table)
            .try_into()
            .map_err(|e: toml::de::Error| {
                crate::Error::Config(format!("invalid value for '{}': {}", key, e))
            })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

fn split_key(key: &str) -> Result<(&str, &str), crate::Error> {
    key.split_once('.')
        .filter(|(section, field)| !section.is_empty() && !field.is_empty())
        .ok_or_else(|| {
            crate::Error::Config(format!(
                "configuration keys look like 'section.field', got '{}'",
                key
            ))
        })
}

fn parse_value(raw: &str) -> toml::Value {
    format!("v = {}", raw)
        .parse::<toml::Table>()
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
