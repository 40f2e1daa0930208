// MatchRunner: plays rounds back to back until cancelled.
//
//   loop: begin round → run_round (stream + classify) → pause_between_rounds
//
// Everything runs on one task. The session counters belong to the caller and
// are threaded through by `&mut`.

use anyhow::Result;
use replay_common::{ConsoleColor, Terminal};
use replay_sdk::{OutputLine, ProcessCompletion, ReplayPackage, TraceWriter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::line_classifier::{classify, LineEvent};
use crate::match_client::MatchClient;
use crate::round_pause::RoundPause;
use crate::session::{MatchOutcome, SessionCounters};

const SEPARATOR: &str = "-----------------------------------------------";

/// How a single round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    /// The client's output stream closed, for whatever reason.
    Completed,
    /// Cancellation arrived mid-match; the client was torn down.
    Cancelled,
}

pub struct MatchRunner {
    client: Arc<dyn MatchClient>,
    pause: RoundPause,
    terminal: Terminal,
    trace: Arc<dyn TraceWriter>,
}

impl MatchRunner {
    pub fn new(
        client: Arc<dyn MatchClient>,
        pause: RoundPause,
        terminal: Terminal,
        trace: Arc<dyn TraceWriter>,
    ) -> Self {
        Self {
            client,
            pause,
            terminal,
            trace,
        }
    }

    /// Play rounds until `cancel` fires, then print the farewell.
    ///
    /// Only a launch failure ends the loop early; it is returned as `Err`
    /// without the farewell.
    pub async fn run(&self, session: &mut SessionCounters, cancel: CancellationToken) -> Result<()> {
        self.terminal
            .write_line(&format!("\t\t\t{} \n", ReplayPackage::DISPLAY_NAME));

        while !cancel.is_cancelled() {
            session.begin_round();

            if self.run_round(session, &cancel).await? == RoundEnd::Cancelled {
                break;
            }

            if !self.pause_between_rounds(&cancel).await {
                break;
            }
        }

        self.trace.info(&format!(
            "Stopping after {} rounds. {}",
            session.rounds, session
        ));
        self.terminal.write_line("\n\nQuitting.");
        Ok(())
    }

    /// Launch one match and classify its output until the stream closes.
    pub async fn run_round(
        &self,
        session: &mut SessionCounters,
        cancel: &CancellationToken,
    ) -> Result<RoundEnd> {
        self.terminal.write_line(SEPARATOR);
        self.terminal.write_line(&format!(
            "------------------- Round {} -------------------",
            session.rounds
        ));
        self.terminal.write_line(&session.to_string());
        self.terminal.write_line("Playing Match...");
        self.trace
            .info(&format!("Round {} starting.", session.rounds));

        let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
        let consume = async {
            while let Some(line) = rx.recv().await {
                self.trace.verbose(&format!("client> {}", line.data));
                for event in classify(&line.data) {
                    self.apply(event, session);
                }
            }
        };

        let (completion, ()) = tokio::join!(self.client.play(tx, cancel.clone()), consume);

        match completion? {
            ProcessCompletion::Cancelled => {
                self.trace
                    .info(&format!("Round {} cancelled mid-match.", session.rounds));
                Ok(RoundEnd::Cancelled)
            }
            ProcessCompletion::Exited { exit_code } => {
                self.trace.info(&format!(
                    "Round {} finished, client exit code {:?}.",
                    session.rounds, exit_code
                ));
                self.terminal.write_line("done");
                Ok(RoundEnd::Completed)
            }
        }
    }

    /// Announce and sleep the randomized pause.
    ///
    /// Returns `true` if the pause elapsed, `false` if it was cancelled.
    pub async fn pause_between_rounds(&self, cancel: &CancellationToken) -> bool {
        let secs = self.pause.next_secs();
        self.terminal
            .write_line("press Ctrl+C to quit now while not in a match");
        self.terminal
            .write_line("sleeping a few seconds between matches.");

        let completed = self.pause.wait(secs, cancel).await;
        if completed {
            self.terminal.write_empty_line();
        }
        completed
    }

    fn apply(&self, event: LineEvent, session: &mut SessionCounters) {
        match event {
            LineEvent::CurrentRating(rating) => {
                self.terminal.write_line(&format!("Current Elo: {rating}"));
            }
            LineEvent::MapName(map) => {
                self.terminal.write_line(&format!("Playing map: {map}"));
            }
            LineEvent::Opponent { name, rating } => {
                let rating = rating.as_deref().unwrap_or("?");
                self.terminal
                    .write_line(&format!("Opponent: {name}  ({rating} elo)"));
            }
            LineEvent::Outcome(outcome) => {
                session.record(outcome);
                let color = match outcome {
                    MatchOutcome::Win => ConsoleColor::Green,
                    MatchOutcome::Loss => ConsoleColor::Red,
                    MatchOutcome::Draw => ConsoleColor::Yellow,
                };
                self.terminal
                    .write_colored_line(outcome.notice(), Some(color));
            }
        }
    }
}
