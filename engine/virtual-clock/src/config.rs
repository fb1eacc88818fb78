//! Configuration for the virtual clock

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

use crate::error::ClockError;
use crate::host::BindingName;
use crate::job::Millis;
use crate::{DEFAULT_FAKED_BINDINGS, DEFAULT_START_TIME};

/// Configuration for a virtual clock and its installer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockConfig {
    /// Virtual time the clock starts at, and returns to on reset (milliseconds)
    pub start_time: Millis,

    /// Host bindings replaced by `install_with_config`
    pub fake: Vec<BindingName>,

    /// Level handed to the `tracing` subscriber, see [`ClockConfig::level_filter`]
    pub log_level: String,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            start_time: DEFAULT_START_TIME,
            fake: DEFAULT_FAKED_BINDINGS.to_vec(),
            log_level: "info".to_string(),
        }
    }
}

impl ClockConfig {
    /// Configuration starting at `start_time` with every default binding faked
    pub fn starting_at(start_time: Millis) -> Self {
        Self { start_time, ..Default::default() }
    }

    /// Reject duplicate fake names and unknown log levels
    pub fn validate(&self) -> Result<(), ClockError> {
        for (i, name) in self.fake.iter().enumerate() {
            if self.fake[..i].contains(name) {
                return Err(ClockError::Config(format!("binding {name} listed twice")));
            }
        }
        self.level_filter().map(|_| ())
    }

    /// Most verbose level a subscriber should record for this configuration
    pub fn level_filter(&self) -> Result<LevelFilter, ClockError> {
        match self.log_level.to_ascii_lowercase().as_str() {
            "trace" => Ok(LevelFilter::TRACE),
            "debug" => Ok(LevelFilter::DEBUG),
            "info" => Ok(LevelFilter::INFO),
            "warn" => Ok(LevelFilter::WARN),
            "error" => Ok(LevelFilter::ERROR),
            "off" => Ok(LevelFilter::OFF),
            other => Err(ClockError::Config(format!("unknown log level {other:?}"))),
        }
    }

    /// Load configuration from TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClockError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClockError::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: ClockConfig = toml::from_str(&content)
            .map_err(|e| ClockError::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ClockError> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ClockError::Config(format!("failed to serialize config: {e}")))?;
        std::fs::write(path, content)
            .map_err(|e| ClockError::Config(format!("failed to write {}: {e}", path.display())))?;
        Ok(())
    }
}
