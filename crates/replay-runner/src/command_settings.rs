// CommandSettings: command-line flags. Every flag is optional; anything left
// unset falls through to REPLAY_INPUT_* variables, then the settings file.

use clap::Parser;
use replay_common::{SettingsOverrides, SettingsStore};
use replay_sdk::TraceWriter;
use std::path::PathBuf;
use std::sync::Arc;

/// Plays rated Planet Wars matches back to back through the TCP client and
/// keeps a running win/loss/draw tally. Stop with Ctrl+C.
#[derive(Debug, Clone, Parser)]
#[command(name = "replay", version)]
pub struct CommandSettings {
    /// Command line launched for every round, e.g. "./tcp 213.3.30.106 9999 MyBotName ./MyBot".
    #[arg(short, long, value_name = "CMD")]
    pub command: Option<String>,

    /// Shortest pause between rounds, in seconds.
    #[arg(long = "min-pause", value_name = "SECS")]
    pub min_pause: Option<u64>,

    /// Longest pause between rounds, in seconds.
    #[arg(long = "max-pause", value_name = "SECS")]
    pub max_pause: Option<u64>,

    /// JSON settings file. Defaults to `.replay` in the working directory.
    #[arg(long, value_name = "PATH")]
    pub settings: Option<PathBuf>,

    /// Diagnostics filter written to stderr, e.g. "info" or "replay_sdk=debug". RUST_LOG wins when set.
    #[arg(long = "log-level", value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl CommandSettings {
    /// The CLI layer of the settings precedence chain.
    pub fn overrides(&self) -> SettingsOverrides {
        SettingsOverrides {
            command: self.command.clone(),
            min_pause_secs: self.min_pause,
            max_pause_secs: self.max_pause,
            log_level: self.log_level.clone(),
        }
    }

    /// Settings store for `--settings`, or the default location.
    pub fn settings_store(&self, trace: Arc<dyn TraceWriter>) -> SettingsStore {
        match &self.settings {
            Some(path) => SettingsStore::new(path.clone(), trace),
            None => SettingsStore::default_location(trace),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replay_common::constants::defaults;
    use replay_sdk::trace::NullTraceWriter;
    use std::path::Path;

    #[test]
    fn no_flags_means_no_overrides() {
        let settings = CommandSettings::try_parse_from(["replay"]).unwrap();
        assert_eq!(settings.overrides(), SettingsOverrides::default());
        let store = settings.settings_store(Arc::new(NullTraceWriter));
        assert_eq!(store.settings_file_path(), Path::new(defaults::SETTINGS_FILE));
    }

    #[test]
    fn flags_map_to_overrides() {
        let settings = CommandSettings::try_parse_from([
            "replay",
            "--command",
            "./tcp 72.44.46.68 995 bot ./MyBot",
            "--min-pause",
            "35",
            "--max-pause",
            "125",
            "--log-level",
            "debug",
            "--settings",
            "/tmp/replay.json",
        ])
        .unwrap();

        assert_eq!(
            settings.overrides(),
            SettingsOverrides {
                command: Some("./tcp 72.44.46.68 995 bot ./MyBot".into()),
                min_pause_secs: Some(35),
                max_pause_secs: Some(125),
                log_level: Some("debug".into()),
            }
        );
        let store = settings.settings_store(Arc::new(NullTraceWriter));
        assert_eq!(store.settings_file_path(), Path::new("/tmp/replay.json"));
    }

    #[test]
    fn short_command_flag() {
        let settings = CommandSettings::try_parse_from(["replay", "-c", "./MyBot"]).unwrap();
        assert_eq!(settings.command.as_deref(), Some("./MyBot"));
    }

    #[test]
    fn non_numeric_pause_is_rejected() {
        assert!(CommandSettings::try_parse_from(["replay", "--min-pause", "soon"]).is_err());
    }

    #[test]
    fn clap_definition_is_consistent() {
        use clap::CommandFactory;
        CommandSettings::command().debug_assert();
    }
}
