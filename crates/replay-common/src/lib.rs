// replay-common: Shared services for the replay match runner.
// Depends on `replay-sdk`; consumed by the `replay-runner` binary crate.

pub mod constants;
pub mod settings_store;
pub mod terminal;

pub use settings_store::{ReplaySettings, SettingsError, SettingsOverrides, SettingsStore};
pub use terminal::{ConsoleColor, Terminal, TerminalCapture};
