// MatchClient: the seam between the match loop and whatever actually plays a
// match. Production launches the TCP client command; tests script the output.

use anyhow::Result;
use async_trait::async_trait;
use replay_sdk::{OutputLine, ProcessCompletion, ProcessInvoker, TraceWriter};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Plays one match, streaming the client's stdout as it is produced.
#[async_trait]
pub trait MatchClient: Send + Sync {
    /// Run one match to completion. Lines go out on `output` in order and the
    /// sender is dropped when the stream ends. `Err` means nothing could be
    /// launched at all.
    async fn play(
        &self,
        output: mpsc::UnboundedSender<OutputLine>,
        cancellation_token: CancellationToken,
    ) -> Result<ProcessCompletion>;
}

/// Launches the configured command line as a child process per match.
pub struct ProcessMatchClient {
    command_line: String,
    invoker: ProcessInvoker,
}

impl ProcessMatchClient {
    pub fn new(command_line: impl Into<String>, trace: Arc<dyn TraceWriter>) -> Self {
        Self {
            command_line: command_line.into(),
            invoker: ProcessInvoker::new(trace),
        }
    }
}

#[async_trait]
impl MatchClient for ProcessMatchClient {
    async fn play(
        &self,
        output: mpsc::UnboundedSender<OutputLine>,
        cancellation_token: CancellationToken,
    ) -> Result<ProcessCompletion> {
        self.invoker
            .execute(&self.command_line, output, cancellation_token)
            .await
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use replay_sdk::trace::NullTraceWriter;

    #[tokio::test]
    async fn forwards_child_output() {
        let client = ProcessMatchClient::new(
            r#"echo "Your map is map42"; echo "You DRAW""#,
            Arc::new(NullTraceWriter),
        );
        let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
        let collect = async {
            let mut lines = Vec::new();
            while let Some(line) = rx.recv().await {
                lines.push(line.data);
            }
            lines
        };

        let (completion, lines) = tokio::join!(client.play(tx, CancellationToken::new()), collect);
        assert_eq!(
            completion.unwrap(),
            ProcessCompletion::Exited { exit_code: Some(0) }
        );
        assert_eq!(lines, vec!["Your map is map42", "You DRAW"]);
    }
}
