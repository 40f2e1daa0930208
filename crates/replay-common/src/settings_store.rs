// SettingsStore: resolves the runner settings from the settings file, the
// REPLAY_INPUT_* environment variables and CLI overrides, then validates them.

use crate::constants::{defaults, env};
use replay_sdk::TraceWriter;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors raised while loading or validating settings.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to read settings from {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse settings file {path:?}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid value '{value}' for setting '{key}'")]
    InvalidValue { key: String, value: String },
    #[error("No command configured; set --command, {} or the settings file.", env::var_name(env::COMMAND))]
    EmptyCommand,
    #[error("Pause range is inverted: minimum {min}s is greater than maximum {max}s")]
    InvertedPauseRange { min: u64, max: u64 },
}

// ---------------------------------------------------------------------------
// ReplaySettings
// ---------------------------------------------------------------------------

/// Fully resolved runner configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplaySettings {
    /// Command line launched once per round.
    #[serde(rename = "Command")]
    pub command: String,

    #[serde(rename = "MinPauseSeconds")]
    pub min_pause_secs: u64,

    #[serde(rename = "MaxPauseSeconds")]
    pub max_pause_secs: u64,

    /// `tracing` filter directive for diagnostics, e.g. `warn` or `replay_runner=debug`.
    #[serde(rename = "LogLevel")]
    pub log_level: String,
}

impl Default for ReplaySettings {
    fn default() -> Self {
        Self {
            command: defaults::COMMAND.to_string(),
            min_pause_secs: defaults::MIN_PAUSE_SECS,
            max_pause_secs: defaults::MAX_PAUSE_SECS,
            log_level: defaults::LOG_LEVEL.to_string(),
        }
    }
}

impl ReplaySettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.command.trim().is_empty() {
            return Err(SettingsError::EmptyCommand);
        }
        if self.min_pause_secs > self.max_pause_secs {
            return Err(SettingsError::InvertedPauseRange {
                min: self.min_pause_secs,
                max: self.max_pause_secs,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// SettingsOverrides
// ---------------------------------------------------------------------------

/// A partial set of settings from one source. `None` leaves the lower
/// priority value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SettingsOverrides {
    pub command: Option<String>,
    pub min_pause_secs: Option<u64>,
    pub max_pause_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl SettingsOverrides {
    /// Read the `REPLAY_INPUT_*` variables from the process environment.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build overrides from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |setting: &str| -> Option<(String, String)> {
            let name = env::var_name(setting);
            lookup(&name)
                .filter(|v| !v.trim().is_empty())
                .map(|v| (name, v))
        };

        let parse_secs = |entry: Option<(String, String)>| -> Result<Option<u64>, SettingsError> {
            match entry {
                None => Ok(None),
                Some((key, value)) => value
                    .trim()
                    .parse()
                    .map(Some)
                    .map_err(|_| SettingsError::InvalidValue { key, value }),
            }
        };

        Ok(Self {
            command: get(env::COMMAND).map(|(_, v)| v),
            min_pause_secs: parse_secs(get(env::MIN_PAUSE))?,
            max_pause_secs: parse_secs(get(env::MAX_PAUSE))?,
            log_level: get(env::LOG_LEVEL).map(|(_, v)| v),
        })
    }

    /// Layer these overrides on top of `base`.
    pub fn apply(self, mut base: ReplaySettings) -> ReplaySettings {
        if let Some(command) = self.command {
            base.command = command;
        }
        if let Some(min) = self.min_pause_secs {
            base.min_pause_secs = min;
        }
        if let Some(max) = self.max_pause_secs {
            base.max_pause_secs = max;
        }
        if let Some(level) = self.log_level {
            base.log_level = level;
        }
        base
    }
}

// ---------------------------------------------------------------------------
// SettingsStore
// ---------------------------------------------------------------------------

/// Loads the JSON settings file and merges the override layers.
pub struct SettingsStore {
    settings_file_path: PathBuf,
    trace: Arc<dyn TraceWriter>,
}

impl SettingsStore {
    pub fn new(settings_file_path: impl Into<PathBuf>, trace: Arc<dyn TraceWriter>) -> Self {
        Self {
            settings_file_path: settings_file_path.into(),
            trace,
        }
    }

    /// Store rooted at `.replay` in the working directory.
    pub fn default_location(trace: Arc<dyn TraceWriter>) -> Self {
        Self::new(defaults::SETTINGS_FILE, trace)
    }

    pub fn settings_file_path(&self) -> &Path {
        &self.settings_file_path
    }

    /// Whether a settings file exists.
    pub fn is_configured(&self) -> bool {
        self.settings_file_path.exists()
    }

    /// Load the settings file. A missing file yields the compiled-in defaults;
    /// keys absent from the file keep their defaults too.
    pub fn load_file(&self) -> Result<ReplaySettings, SettingsError> {
        if !self.is_configured() {
            self.trace.verbose(&format!(
                "No settings file at {:?}; using defaults.",
                self.settings_file_path
            ));
            return Ok(ReplaySettings::default());
        }

        let json = fs::read_to_string(&self.settings_file_path).map_err(|source| {
            SettingsError::Io {
                path: self.settings_file_path.clone(),
                source,
            }
        })?;

        let settings = serde_json::from_str(&json).map_err(|source| SettingsError::Parse {
            path: self.settings_file_path.clone(),
            source,
        })?;

        self.trace.info(&format!(
            "Loaded settings from {:?}.",
            self.settings_file_path
        ));
        Ok(settings)
    }

    /// Resolve settings with precedence CLI > environment > file > defaults,
    /// then validate the result.
    pub fn resolve(
        &self,
        env_overrides: SettingsOverrides,
        cli_overrides: SettingsOverrides,
    ) -> Result<ReplaySettings, SettingsError> {
        let settings = cli_overrides.apply(env_overrides.apply(self.load_file()?));
        settings.validate()?;
        Ok(settings)
    }
}
