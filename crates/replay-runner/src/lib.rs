// replay-runner: the match loop. Depends on `replay-sdk` and `replay-common`.
//
// Architecture:
//   main → CommandSettings → SettingsStore::resolve → MatchRunner::run
//   MatchRunner::run → run_round (MatchClient + line_classifier) → pause_between_rounds → repeat

pub mod command_settings;
pub mod line_classifier;
pub mod match_client;
pub mod match_runner;
pub mod round_pause;
pub mod session;

pub use command_settings::CommandSettings;
pub use line_classifier::{classify, LineEvent};
pub use match_client::{MatchClient, ProcessMatchClient};
pub use match_runner::{MatchRunner, RoundEnd};
pub use round_pause::{PauseRange, RoundPause};
pub use session::{MatchOutcome, SessionCounters};
