// Constants shared across the replay crates.

/// Process exit codes.
pub mod return_code {
    pub const SUCCESS: i32 = 0;
    pub const TERMINATED_ERROR: i32 = 1;
}

/// Values used when neither the CLI, the environment, nor the settings file
/// provide one.
pub mod defaults {
    /// Command launched once per round: the TCP client, server address and
    /// port, bot name, then the bot executable it should drive.
    pub const COMMAND: &str = "./tcp 213.3.30.106 9999 MyBotName ./MyBot";

    /// Inclusive lower bound of the inter-round pause, in seconds.
    pub const MIN_PAUSE_SECS: u64 = 2;

    /// Inclusive upper bound of the inter-round pause, in seconds.
    pub const MAX_PAUSE_SECS: u64 = 29;

    pub const LOG_LEVEL: &str = "warn";

    /// Settings file looked up in the working directory.
    pub const SETTINGS_FILE: &str = ".replay";
}

/// Environment variable names. Each is `ENV_PREFIX` + the upper-cased
/// setting name.
pub mod env {
    pub const ENV_PREFIX: &str = "REPLAY_INPUT_";

    pub const COMMAND: &str = "COMMAND";
    pub const MIN_PAUSE: &str = "MIN_PAUSE";
    pub const MAX_PAUSE: &str = "MAX_PAUSE";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";

    /// Full variable name for a setting, e.g. `REPLAY_INPUT_COMMAND`.
    pub fn var_name(setting: &str) -> String {
        format!("{ENV_PREFIX}{setting}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pause_range_is_ordered() {
        assert!(defaults::MIN_PAUSE_SECS <= defaults::MAX_PAUSE_SECS);
    }

    #[test]
    fn env_var_names_carry_prefix() {
        assert_eq!(env::var_name(env::COMMAND), "REPLAY_INPUT_COMMAND");
        assert_eq!(env::var_name(env::MAX_PAUSE), "REPLAY_INPUT_MAX_PAUSE");
    }
}
