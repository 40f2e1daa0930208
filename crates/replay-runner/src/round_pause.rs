// RoundPause: the randomized wait between rounds. Spreading rounds out keeps
// the matchmaker from pairing the bot with the same opponent over and over.

use anyhow::Result;
use rand::Rng;
use replay_sdk::TraceWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Granularity of the wait; cancellation is also observed between ticks.
const TICK: Duration = Duration::from_secs(1);

/// Inclusive bounds, in whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseRange {
    min_secs: u64,
    max_secs: u64,
}

impl PauseRange {
    pub fn new(min_secs: u64, max_secs: u64) -> Result<Self> {
        anyhow::ensure!(
            min_secs <= max_secs,
            "pause range minimum {min_secs}s exceeds maximum {max_secs}s"
        );
        Ok(Self { min_secs, max_secs })
    }

    /// Uniformly pick a whole number of seconds within the bounds.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min_secs..=self.max_secs)
    }
}

/// Picks and sleeps the inter-round pause.
pub struct RoundPause {
    range: PauseRange,
    trace: Arc<dyn TraceWriter>,
}

impl RoundPause {
    pub fn new(range: PauseRange, trace: Arc<dyn TraceWriter>) -> Self {
        Self { range, trace }
    }

    /// Draw the next pause length from the thread-local RNG.
    pub fn next_secs(&self) -> u64 {
        self.range.sample(&mut rand::thread_rng())
    }

    /// Sleep `secs` seconds, one tick at a time.
    ///
    /// Returns `true` if the delay completed normally, `false` if cancelled.
    pub async fn wait(&self, secs: u64, cancel: &CancellationToken) -> bool {
        self.trace
            .info(&format!("Pausing {secs}s before the next round."));

        for elapsed in 0..secs {
            let completed = tokio::select! {
                _ = tokio::time::sleep(TICK) => true,
                _ = cancel.cancelled() => false,
            };
            if !completed {
                self.trace.info(&format!(
                    "Pause cancelled after {elapsed}s of {secs}s."
                ));
                return false;
            }
        }

        !cancel.is_cancelled()
    }
}
