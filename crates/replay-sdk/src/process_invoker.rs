use crate::trace::TraceWriter;
use anyhow::Result;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The duration to wait after sending SIGINT before escalating to SIGTERM.
const SIGINT_TIMEOUT: Duration = Duration::from_millis(2000);
/// The duration to wait after sending SIGTERM before escalating to SIGKILL.
const SIGTERM_TIMEOUT: Duration = Duration::from_millis(1000);
/// After this long a child that closed its stdout but is still running gets
/// a warning. It is never killed for it.
const LINGER_NOTICE: Duration = Duration::from_secs(2);

/// Shell program and the flag that makes it run a single command string.
#[cfg(not(windows))]
const SHELL: (&str, &str) = ("sh", "-c");
#[cfg(windows)]
const SHELL: (&str, &str) = ("cmd", "/C");

/// Exit codes the shell reserves for a command it could not find or execute.
#[cfg(not(windows))]
const SHELL_NOT_RUNNABLE_CODES: &[i32] = &[126, 127];
#[cfg(windows)]
const SHELL_NOT_RUNNABLE_CODES: &[i32] = &[9009];

/// Failures that prevent the command from ever running.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Command line is empty; there is nothing to launch.")]
    EmptyCommand,
    #[error("Failed to start shell '{shell}' for command '{command_line}'")]
    Spawn {
        shell: String,
        command_line: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Shell could not run command '{command_line}' (exit code {exit_code})")]
    NotRunnable { command_line: String, exit_code: i32 },
}

/// One line of child stdout, without its line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub data: String,
}

/// How a launched child finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessCompletion {
    /// Stdout reached EOF and the child was reaped. `exit_code` is `None`
    /// when the child died from a signal.
    Exited { exit_code: Option<i32> },
    /// The cancellation token fired; the child was terminated and reaped.
    Cancelled,
}

enum StreamEnd {
    Closed,
    Cancelled,
}

/// Runs a command line through the platform shell (`sh -c` / `cmd /C`),
/// forwards its stdout line by line as it is produced, and guarantees the
/// child is reaped on every exit path.
///
/// On unix the shell leads its own process group, so signals reach the whole
/// pipeline it starts. Cancellation escalates SIGINT → SIGTERM → SIGKILL. The
/// child is also spawned with `kill_on_drop`, so dropping an in-flight
/// `execute` future never leaves it orphaned.
pub struct ProcessInvoker {
    trace: Arc<dyn TraceWriter>,
}

impl ProcessInvoker {
    pub fn new(trace: Arc<dyn TraceWriter>) -> Self {
        Self { trace }
    }

    /// Run `command_line` to completion.
    ///
    /// Every stdout line is sent on `stdout_tx` in order; the sender is
    /// dropped once the stream closes, so a receiver loop ends naturally.
    /// Stderr is inherited and stdin is closed.
    ///
    /// Returns `Err` only when the command could not be launched: the shell
    /// failed to start, or it exited with a "not found" / "not executable"
    /// code before printing anything. Any other exit code is reported in
    /// `ProcessCompletion::Exited`, not as an error.
    pub async fn execute(
        &self,
        command_line: &str,
        stdout_tx: mpsc::UnboundedSender<OutputLine>,
        cancellation_token: CancellationToken,
    ) -> Result<ProcessCompletion> {
        let command_line = command_line.trim();
        if command_line.is_empty() {
            return Err(LaunchError::EmptyCommand.into());
        }

        let (shell, flag) = SHELL;
        self.trace.info("Starting process:");
        self.trace.info(&format!("  Shell: '{shell} {flag}'"));
        self.trace.info(&format!("  Command line: '{command_line}'"));

        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(command_line)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        {
            cmd.process_group(0);
        }

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
            shell: shell.to_string(),
            command_line: command_line.to_string(),
            source,
        })?;

        let pid = child.id().unwrap_or(0);
        self.trace.info(&format!(
            "Process started with process id {pid}, streaming stdout."
        ));

        let (stream_end, line_count) = match child.stdout.take() {
            Some(stdout) => {
                self.pump_stdout(stdout, stdout_tx, &cancellation_token)
                    .await
            }
            None => {
                drop(stdout_tx);
                (StreamEnd::Closed, 0)
            }
        };

        let completion = match stream_end {
            StreamEnd::Cancelled => {
                self.trace.info("Cancellation requested.");
                self.cancel_and_kill_process(&mut child).await;
                ProcessCompletion::Cancelled
            }
            StreamEnd::Closed => self.reap(&mut child, &cancellation_token).await,
        };

        let elapsed = start.elapsed();
        self.trace.info(&format!(
            "Finished process {pid} ({completion:?}), elapsed time {elapsed:.2?}."
        ));

        if let ProcessCompletion::Exited {
            exit_code: Some(code),
        } = completion
        {
            if line_count == 0 && SHELL_NOT_RUNNABLE_CODES.contains(&code) {
                return Err(LaunchError::NotRunnable {
                    command_line: command_line.to_string(),
                    exit_code: code,
                }
                .into());
            }
        }

        Ok(completion)
    }

    /// Forward stdout lines until EOF, a read error, or cancellation.
    /// Also returns how many lines were forwarded.
    async fn pump_stdout(
        &self,
        stdout: ChildStdout,
        stdout_tx: mpsc::UnboundedSender<OutputLine>,
        cancellation_token: &CancellationToken,
    ) -> (StreamEnd, u64) {
        let mut reader = BufReader::new(stdout);
        let mut buf = Vec::new();
        let mut line_count: u64 = 0;

        let end = loop {
            buf.clear();
            tokio::select! {
                biased;
                _ = cancellation_token.cancelled() => break StreamEnd::Cancelled,
                read = reader.read_until(b'\n', &mut buf) => match read {
                    Ok(0) => break StreamEnd::Closed,
                    Ok(_) => {
                        line_count += 1;
                        let line = OutputLine { data: decode_line(&buf) };
                        if stdout_tx.send(line).is_err() {
                            self.trace.verbose("Stdout receiver dropped; discarding line.");
                        }
                    }
                    Err(e) => {
                        self.trace.warning(&format!(
                            "STDOUT read failed, treating it as end of stream: {e}"
                        ));
                        break StreamEnd::Closed;
                    }
                }
            }
        };

        self.trace.info(&format!(
            "STDOUT stream read finished after {line_count} lines."
        ));
        (end, line_count)
    }

    /// Wait for a child whose stdout already closed. Only cancellation
    /// interrupts the wait.
    async fn reap(
        &self,
        child: &mut Child,
        cancellation_token: &CancellationToken,
    ) -> ProcessCompletion {
        let mut warned = false;
        loop {
            tokio::select! {
                status = child.wait() => return match status {
                    Ok(s) => ProcessCompletion::Exited { exit_code: s.code() },
                    Err(e) => {
                        self.trace.warning(&format!("Failed to wait for process: {e}"));
                        ProcessCompletion::Exited { exit_code: None }
                    }
                },
                _ = cancellation_token.cancelled() => {
                    self.trace.info("Cancellation requested while reaping.");
                    self.cancel_and_kill_process(child).await;
                    return ProcessCompletion::Cancelled;
                }
                _ = tokio::time::sleep(LINGER_NOTICE), if !warned => {
                    warned = true;
                    self.trace.warning(&format!(
                        "Process still running {:.1}s after closing stdout; waiting for it to exit.",
                        LINGER_NOTICE.as_secs_f64()
                    ));
                }
            }
        }
    }

    /// Attempt graceful cancellation: SIGINT → SIGTERM → SIGKILL.
    async fn cancel_and_kill_process(&self, child: &mut Child) -> Option<i32> {
        if self
            .send_signal_and_wait(child, Signal::Int, SIGINT_TIMEOUT)
            .await
        {
            self.trace
                .info("Process cancelled successfully through SIGINT.");
            return wait_code(child).await;
        }

        if self
            .send_signal_and_wait(child, Signal::Term, SIGTERM_TIMEOUT)
            .await
        {
            self.trace
                .info("Process terminated successfully through SIGTERM.");
            return wait_code(child).await;
        }

        self.trace
            .info("Killing process since both interrupt and terminate signals were ignored.");
        self.kill_and_wait(child).await
    }

    async fn kill_and_wait(&self, child: &mut Child) -> Option<i32> {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                // Take down anything the shell started along with it.
                let _ = nix::sys::signal::killpg(
                    nix::unistd::Pid::from_raw(pid as i32),
                    nix::sys::signal::Signal::SIGKILL,
                );
            }
        }
        if let Err(e) = child.kill().await {
            self.trace.warning(&format!("Failed to kill process: {e}"));
        }
        wait_code(child).await
    }

    /// Send a signal to the child's process group and wait up to `timeout`
    /// for the child to exit. Returns `true` if it exited within the timeout.
    #[cfg(unix)]
    async fn send_signal_and_wait(
        &self,
        child: &mut Child,
        signal: Signal,
        timeout: Duration,
    ) -> bool {
        let pid = match child.id() {
            Some(id) => id,
            None => return true,
        };

        let sig = match signal {
            Signal::Int => nix::sys::signal::Signal::SIGINT,
            Signal::Term => nix::sys::signal::Signal::SIGTERM,
        };

        self.trace
            .info(&format!("Sending {sig:?} to process group {pid}."));

        let send_result = nix::sys::signal::killpg(nix::unistd::Pid::from_raw(pid as i32), sig);
        if send_result.is_err() {
            self.trace
                .info(&format!("{sig:?} signal failed to send to process group {pid}."));
            return false;
        }

        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => {
                self.trace.info(&format!(
                    "Process did not honor {sig:?} within {:.1}s.",
                    timeout.as_secs_f64()
                ));
                false
            }
        }
    }

    #[cfg(not(unix))]
    async fn send_signal_and_wait(
        &self,
        child: &mut Child,
        _signal: Signal,
        timeout: Duration,
    ) -> bool {
        // No POSIX signals; give the child the same grace before the kill.
        tokio::select! {
            result = child.wait() => result.is_ok(),
            _ = tokio::time::sleep(timeout) => false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Int,
    Term,
}

async fn wait_code(child: &mut Child) -> Option<i32> {
    child.wait().await.ok().and_then(|s| s.code())
}

/// Lossy UTF-8 decode with the trailing `\n` / `\r\n` removed.
fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trace::{CollectingTraceWriter, NullTraceWriter, TraceLevel};

    fn make_invoker() -> ProcessInvoker {
        ProcessInvoker::new(Arc::new(NullTraceWriter))
    }

    async fn run_and_collect(
        invoker: &ProcessInvoker,
        command_line: &str,
        cancel: CancellationToken,
    ) -> (Result<ProcessCompletion>, Vec<String>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
        let collect = async {
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                lines.push(line.data);
            }
            lines
        };
        tokio::join!(invoker.execute(command_line, tx, cancel), collect)
    }

    #[test]
    fn decode_line_strips_terminators() {
        assert_eq!(decode_line(b"You WIN\r\n"), "You WIN");
        assert_eq!(decode_line(b"no newline"), "no newline");
        assert_eq!(decode_line(b"bad \xff byte\n"), "bad \u{FFFD} byte");
    }

    #[tokio::test]
    async fn empty_command_is_a_launch_error() {
        let invoker = make_invoker();
        let (result, lines) = run_and_collect(&invoker, "  ", CancellationToken::new()).await;
        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LaunchError>(),
            Some(LaunchError::EmptyCommand)
        ));
        assert!(lines.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_executable_is_a_launch_error() {
        let invoker = make_invoker();
        let (result, lines) = run_and_collect(
            &invoker,
            "nonexistent_command_xyz_123 --flag",
            CancellationToken::new(),
        )
        .await;
        let err = result.unwrap_err();
        match err.downcast_ref::<LaunchError>() {
            Some(LaunchError::NotRunnable {
                command_line,
                exit_code,
            }) => {
                assert_eq!(command_line, "nonexistent_command_xyz_123 --flag");
                assert_eq!(*exit_code, 127);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(lines.is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_127_after_output_is_a_normal_end() {
        let invoker = make_invoker();
        let (result, lines) =
            run_and_collect(&invoker, "echo You WIN; exit 127", CancellationToken::new()).await;
        assert_eq!(
            result.unwrap(),
            ProcessCompletion::Exited {
                exit_code: Some(127)
            }
        );
        assert_eq!(lines, vec!["You WIN"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn streams_lines_in_order() {
        let invoker = make_invoker();
        let (result, lines) = run_and_collect(
            &invoker,
            "echo one; echo two; printf three",
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            result.unwrap(),
            ProcessCompletion::Exited { exit_code: Some(0) }
        );
        assert_eq!(lines, vec!["one", "two", "three"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn command_line_runs_through_the_shell() {
        let invoker = make_invoker();
        let (result, lines) = run_and_collect(
            &invoker,
            r#"cd / && GREETING="You WIN" && test -n x && echo "$GREETING" | cat; pwd"#,
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            result.unwrap(),
            ProcessCompletion::Exited { exit_code: Some(0) }
        );
        assert_eq!(lines, vec!["You WIN", "/"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn non_zero_exit_is_not_an_error() {
        let invoker = make_invoker();
        let (result, lines) =
            run_and_collect(&invoker, "echo You LOSE; exit 3", CancellationToken::new()).await;
        assert_eq!(
            result.unwrap(),
            ProcessCompletion::Exited { exit_code: Some(3) }
        );
        assert_eq!(lines, vec!["You LOSE"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn crlf_and_invalid_utf8_are_tolerated() {
        let invoker = make_invoker();
        let (result, lines) = run_and_collect(
            &invoker,
            r#"printf "a\r\nb\377c\n""#,
            CancellationToken::new(),
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(lines, vec!["a".to_string(), "b\u{FFFD}c".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn child_that_lingers_after_eof_is_waited_for() {
        let trace = Arc::new(CollectingTraceWriter::new());
        let invoker = ProcessInvoker::new(trace.clone());
        let (result, lines) = run_and_collect(
            &invoker,
            "echo You DRAW; exec >&-; sleep 3; exit 4",
            CancellationToken::new(),
        )
        .await;
        assert_eq!(
            result.unwrap(),
            ProcessCompletion::Exited { exit_code: Some(4) }
        );
        assert_eq!(lines, vec!["You DRAW"]);
        assert!(trace.contains(TraceLevel::Warning, "still running"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cancellation_terminates_a_hung_child() {
        let invoker = make_invoker();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let start = Instant::now();

        let (outcome, ()) = tokio::join!(
            run_and_collect(&invoker, "sleep 30; echo too late", cancel),
            async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                trigger.cancel();
            }
        );

        let (result, lines) = outcome;
        assert_eq!(result.unwrap(), ProcessCompletion::Cancelled);
        assert!(lines.is_empty());
        assert!(start.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn traces_process_lifecycle() {
        let trace = Arc::new(CollectingTraceWriter::new());
        let invoker = ProcessInvoker::new(trace.clone());
        let (result, _) = run_and_collect(&invoker, "echo hi", CancellationToken::new()).await;
        assert!(result.is_ok());
        assert!(trace.contains(TraceLevel::Info, "Shell: 'sh -c'"));
        assert!(trace.contains(TraceLevel::Info, "Command line: 'echo hi'"));
        assert!(trace.contains(TraceLevel::Info, "Process started with process id"));
        assert!(trace.contains(TraceLevel::Info, "finished after 1 lines"));
    }
}
