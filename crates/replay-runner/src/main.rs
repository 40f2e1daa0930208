// Entry point for the replay match runner.
//
// Resolves settings, initialises diagnostics, wires Ctrl-C / SIGTERM to a
// cancellation token, and hands control to `MatchRunner` on a single-threaded
// runtime.

use anyhow::{Context, Result};
use clap::Parser;
use replay_common::constants::{defaults, return_code};
use replay_common::{ReplaySettings, SettingsOverrides, Terminal};
use replay_runner::{
    CommandSettings, MatchRunner, PauseRange, ProcessMatchClient, RoundPause, SessionCounters,
};
use replay_sdk::trace::TracingTraceWriter;
use replay_sdk::{ReplayPackage, TraceWriter};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() {
    let command_settings = CommandSettings::parse();

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to build Tokio runtime: {e}");
            std::process::exit(return_code::TERMINATED_ERROR);
        }
    };

    let exit_code = runtime.block_on(run(command_settings));

    std::process::exit(exit_code);
}

fn init_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_settings(command_settings: &CommandSettings) -> Result<ReplaySettings> {
    let trace: Arc<dyn TraceWriter> = Arc::new(TracingTraceWriter::new("SettingsStore"));
    let store = command_settings.settings_store(trace);
    let env_overrides =
        SettingsOverrides::from_env().context("Invalid REPLAY_INPUT_* environment variable")?;

    store
        .resolve(env_overrides, command_settings.overrides())
        .with_context(|| format!("Invalid settings (file {:?})", store.settings_file_path()))
}

/// Cancel `shutdown` on Ctrl-C, or on SIGTERM where available.
fn install_shutdown_handlers(shutdown: &CancellationToken) {
    let on_ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Ctrl-C received, stopping the match loop");
                on_ctrl_c.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let on_sigterm = shutdown.clone();
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::spawn(async move {
                    sigterm.recv().await;
                    tracing::info!("SIGTERM received, stopping the match loop");
                    on_sigterm.cancel();
                });
            }
            Err(e) => tracing::warn!("Failed to listen for SIGTERM: {}", e),
        }
    }
}

async fn run(command_settings: CommandSettings) -> i32 {
    let resolved = resolve_settings(&command_settings);

    let log_level = match &resolved {
        Ok(settings) => settings.log_level.clone(),
        Err(_) => command_settings
            .log_level
            .clone()
            .unwrap_or_else(|| defaults::LOG_LEVEL.to_string()),
    };
    init_tracing(&log_level);

    let settings = match resolved {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("{:#}", e);
            return return_code::TERMINATED_ERROR;
        }
    };

    tracing::info!("{} starting.", ReplayPackage::describe());
    tracing::info!(
        command = %settings.command,
        min_pause_secs = settings.min_pause_secs,
        max_pause_secs = settings.max_pause_secs,
        "Settings resolved"
    );

    let range = match PauseRange::new(settings.min_pause_secs, settings.max_pause_secs) {
        Ok(range) => range,
        Err(e) => {
            tracing::error!("{:#}", e);
            return return_code::TERMINATED_ERROR;
        }
    };

    let shutdown = CancellationToken::new();
    install_shutdown_handlers(&shutdown);

    let runner = MatchRunner::new(
        Arc::new(ProcessMatchClient::new(
            settings.command.clone(),
            Arc::new(TracingTraceWriter::new("ProcessInvoker")),
        )),
        RoundPause::new(range, Arc::new(TracingTraceWriter::new("RoundPause"))),
        Terminal::stdout(),
        Arc::new(TracingTraceWriter::new("MatchRunner")),
    );

    let mut session = SessionCounters::new();
    match runner.run(&mut session, shutdown).await {
        Ok(()) => {
            tracing::info!(
                rounds = session.rounds,
                wins = session.wins,
                losses = session.losses,
                draws = session.draws,
                "Match loop stopped"
            );
            return_code::SUCCESS
        }
        Err(e) => {
            tracing::error!("Match loop failed: {:?}", e);
            return_code::TERMINATED_ERROR
        }
    }
}
