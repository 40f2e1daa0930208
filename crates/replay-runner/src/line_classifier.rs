//! Recognises the handful of status lines the TCP client prints during a match.
//!
//! Classification is table driven: every entry of the rule table whose prefix
//! matches a line fires, in table order. Token positions are 1-based in the
//! comments below and refer to whitespace-separated words of the full line.
//!
//! Ratings are read from their usual position. When the word there is not a
//! number, the first numeric word after that position is used instead, and
//! failing that the positional word is reported verbatim.

use crate::session::MatchOutcome;

/// Something worth reporting, extracted from one line of client output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    CurrentRating(String),
    MapName(String),
    Opponent {
        name: String,
        /// Missing when the line is cut short after the name.
        rating: Option<String>,
    },
    Outcome(MatchOutcome),
}

#[derive(Debug, Clone, Copy)]
enum LineRule {
    /// "You currently have 1500 Elo points": 4th token.
    CurrentRating,
    /// "Your map is TinyMap-4": 4th token.
    MapName,
    /// "Your opponent is Bob with 1400 elo": 4th and 6th tokens.
    Opponent,
    Outcome(MatchOutcome),
}

const RULES: &[(&str, LineRule)] = &[
    ("You currently", LineRule::CurrentRating),
    ("Your map is", LineRule::MapName),
    ("Your opponent", LineRule::Opponent),
    ("You LOSE", LineRule::Outcome(MatchOutcome::Loss)),
    ("You WIN", LineRule::Outcome(MatchOutcome::Win)),
    ("You DRAW", LineRule::Outcome(MatchOutcome::Draw)),
];

impl LineRule {
    fn extract(self, line: &str) -> Option<LineEvent> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let token = |n: usize| tokens.get(n - 1).map(|t| t.to_string());

        match self {
            LineRule::CurrentRating => rating_at(&tokens, 4).map(LineEvent::CurrentRating),
            LineRule::MapName => token(4).map(LineEvent::MapName),
            LineRule::Opponent => token(4).map(|name| LineEvent::Opponent {
                name,
                rating: rating_at(&tokens, 6),
            }),
            LineRule::Outcome(outcome) => Some(LineEvent::Outcome(outcome)),
        }
    }
}

/// Rating word at 1-based `position`, falling forward to the first numeric word.
fn rating_at(tokens: &[&str], position: usize) -> Option<String> {
    let positional = tokens.get(position - 1)?;
    if looks_like_rating(positional) {
        return Some(positional.to_string());
    }
    let found = tokens[position..]
        .iter()
        .find(|t| looks_like_rating(t))
        .unwrap_or(positional);
    Some(found.to_string())
}

fn looks_like_rating(word: &str) -> bool {
    let digits = word.strip_prefix('-').unwrap_or(word);
    digits.chars().any(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Classify one line of client output. Unrecognised lines, and recognised
/// lines missing the token they should carry, yield nothing.
pub fn classify(line: &str) -> Vec<LineEvent> {
    RULES
        .iter()
        .filter(|(prefix, _)| line.starts_with(prefix))
        .filter_map(|(_, rule)| rule.extract(line))
        .collect()
}

/// The prefixes the classifier reacts to, in evaluation order.
pub fn recognised_prefixes() -> impl Iterator<Item = &'static str> {
    RULES.iter().map(|(prefix, _)| *prefix)
}
