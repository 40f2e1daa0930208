// Terminal: the human-readable progress transcript. Every line is flushed as
// soon as it is written so a watcher sees a live match as it happens.

use parking_lot::Mutex;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;

/// Console color codes for terminal output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleColor {
    Red,
    Green,
    Yellow,
}

impl ConsoleColor {
    fn ansi_code(&self) -> &'static str {
        match self {
            ConsoleColor::Red => "\x1b[31m",
            ConsoleColor::Green => "\x1b[32m",
            ConsoleColor::Yellow => "\x1b[33m",
        }
    }

    fn reset() -> &'static str {
        "\x1b[0m"
    }
}

enum Sink {
    Stdout { colored: bool },
    Capture(Arc<Mutex<Vec<String>>>),
}

/// Line-oriented console writer.
///
/// Writes to stdout in production. `Terminal::capture` records lines in
/// memory instead, which is how the runner's transcript is asserted in tests.
pub struct Terminal {
    sink: Sink,
}

/// Read side of a capturing `Terminal`.
#[derive(Clone)]
pub struct TerminalCapture {
    lines: Arc<Mutex<Vec<String>>>,
}

impl TerminalCapture {
    /// Every line written so far, without terminators or color codes.
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    /// Number of captured lines equal to `line`.
    pub fn count(&self, line: &str) -> usize {
        self.lines.lock().iter().filter(|l| *l == line).count()
    }
}

impl Terminal {
    /// Stdout terminal; colors are only emitted when stdout is a tty.
    pub fn stdout() -> Self {
        Self {
            sink: Sink::Stdout {
                colored: io::stdout().is_terminal(),
            },
        }
    }

    pub fn capture() -> (Self, TerminalCapture) {
        let lines = Arc::new(Mutex::new(Vec::new()));
        let terminal = Self {
            sink: Sink::Capture(lines.clone()),
        };
        (terminal, TerminalCapture { lines })
    }

    /// Write a line and flush.
    pub fn write_line(&self, line: &str) {
        self.write_colored_line(line, None);
    }

    /// Write a line in `color` (when the sink supports it) and flush.
    pub fn write_colored_line(&self, line: &str, color: Option<ConsoleColor>) {
        match &self.sink {
            Sink::Stdout { colored } => {
                let mut out = io::stdout().lock();
                // A closed stdout must not take the match loop down with it.
                let _ = match color {
                    Some(color) if *colored => writeln!(
                        out,
                        "{}{}{}",
                        color.ansi_code(),
                        line,
                        ConsoleColor::reset()
                    ),
                    _ => writeln!(out, "{line}"),
                };
                let _ = out.flush();
            }
            Sink::Capture(lines) => {
                lines.lock().extend(line.split('\n').map(str::to_string));
            }
        }
    }

    pub fn write_empty_line(&self) {
        self.write_line("");
    }
}

impl Default for Terminal {
    fn default() -> Self {
        Self::stdout()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_records_lines_in_order() {
        let (terminal, capture) = Terminal::capture();
        terminal.write_line("Playing Match...");
        terminal.write_colored_line("You WIN this match", Some(ConsoleColor::Green));
        terminal.write_empty_line();
        assert_eq!(
            capture.lines(),
            vec!["Playing Match...", "You WIN this match", ""]
        );
    }

    #[test]
    fn embedded_newlines_become_separate_lines() {
        let (terminal, capture) = Terminal::capture();
        terminal.write_line("\n\nQuitting.");
        assert_eq!(capture.lines(), vec!["", "", "Quitting."]);
        assert_eq!(capture.count(""), 2);
    }

    #[test]
    fn ansi_codes_wrap_text() {
        assert_eq!(ConsoleColor::Red.ansi_code(), "\x1b[31m");
        assert_eq!(ConsoleColor::reset(), "\x1b[0m");
    }
}
