//! In-memory tally for one run of the program.

use std::fmt;

/// Result of a single match, as announced by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Win,
    Loss,
    Draw,
}

impl MatchOutcome {
    /// Console notice printed when the outcome line is seen.
    pub fn notice(&self) -> &'static str {
        match self {
            MatchOutcome::Win => "You WIN this match",
            MatchOutcome::Loss => "You LOSE this match",
            MatchOutcome::Draw => "You DRAW this match",
        }
    }
}

/// Rounds played and outcomes recorded since start-up.
///
/// `rounds` counts launches, so it can run ahead of `wins + losses + draws`
/// whenever a round ends without a recognised outcome line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCounters {
    pub rounds: u32,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start the next round and return its ordinal (1-based).
    pub fn begin_round(&mut self) -> u32 {
        self.rounds += 1;
        self.rounds
    }

    pub fn record(&mut self, outcome: MatchOutcome) {
        match outcome {
            MatchOutcome::Win => self.wins += 1,
            MatchOutcome::Loss => self.losses += 1,
            MatchOutcome::Draw => self.draws += 1,
        }
    }

    /// Rounds that produced a recognised outcome.
    pub fn decided(&self) -> u32 {
        self.wins + self.losses + self.draws
    }
}

impl fmt::Display for SessionCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Wins: {},  Losses: {},  Draws: {}",
            self.wins, self.losses, self.draws
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(SessionCounters::new(), SessionCounters::default());
        assert_eq!(SessionCounters::new().decided(), 0);
    }

    #[test]
    fn begin_round_returns_ordinal() {
        let mut session = SessionCounters::new();
        assert_eq!(session.begin_round(), 1);
        assert_eq!(session.begin_round(), 2);
        assert_eq!(session.rounds, 2);
    }

    #[test]
    fn record_only_touches_matching_counter() {
        let mut session = SessionCounters::new();
        session.record(MatchOutcome::Win);
        session.record(MatchOutcome::Win);
        session.record(MatchOutcome::Draw);
        assert_eq!((session.wins, session.losses, session.draws), (2, 0, 1));
        assert_eq!(session.rounds, 0);
        assert_eq!(session.decided(), 3);
    }

    #[test]
    fn display_is_the_round_tally_line() {
        let session = SessionCounters {
            rounds: 9,
            wins: 4,
            losses: 3,
            draws: 1,
        };
        assert_eq!(session.to_string(), "Wins: 4,  Losses: 3,  Draws: 1");
    }
}
