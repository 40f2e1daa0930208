//! Build metadata baked in at compile time.

/// Source control information.
pub struct Source;

impl Source {
    /// The commit hash from which this binary was built.
    /// Set via the `REPLAY_COMMIT_HASH` env var at compile time, or "N/A".
    pub const COMMIT_HASH: &'static str = match option_env!("REPLAY_COMMIT_HASH") {
        Some(h) => h,
        None => "N/A",
    };
}

/// Package metadata for the replay binaries.
#[derive(Debug, Clone)]
pub struct ReplayPackage;

impl ReplayPackage {
    /// Pulled from `CARGO_PKG_VERSION`.
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Name printed in the startup banner.
    pub const DISPLAY_NAME: &'static str = "replay";

    /// `name vVERSION (COMMIT)`, used for `--version` style output and logs.
    pub fn describe() -> String {
        format!(
            "{} v{} ({})",
            Self::DISPLAY_NAME,
            Self::VERSION,
            Source::COMMIT_HASH
        )
    }
}
