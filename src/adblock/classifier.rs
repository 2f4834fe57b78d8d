//! External classifier pipe adapter
//!
//! Drives the blocking oracle over its stdin/stdout: one JSON request per
//! line in, one verdict line out, correlated positionally with no request
//! id in the response.

use super::sink_backend::{ClassifierProcess, ClassifyRequest, SinkError};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{ChildStdout, Command};

/// Classifier backend that spawns the oracle binary per dump call
pub struct PipeClassifier {
    command: String,
    timeout: Duration,
}

impl PipeClassifier {
    pub fn new(command: impl Into<String>, timeout: Duration) -> Self {
        Self {
            command: command.into(),
            timeout,
        }
    }
}

#[async_trait]
impl ClassifierProcess for PipeClassifier {
    async fn classify(&mut self, requests: &[ClassifyRequest]) -> Result<Vec<bool>, SinkError> {
        // Serialize the batch up front so the writer task owns plain strings
        let mut lines = Vec::with_capacity(requests.len());
        for request in requests {
            lines.push(serde_json::to_string(request)?);
        }

        let mut child = Command::new(&self.command)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(SinkError::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SinkError::Process("classifier stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SinkError::Process("classifier stdout not captured".to_string()))?;

        log::debug!(
            "📤 Sending {} classification requests to {}",
            requests.len(),
            self.command
        );

        let expected = requests.len();
        let result = tokio::time::timeout(self.timeout, async {
            // The write side runs on its own task. Writing the whole batch
            // from this task and reading afterwards deadlocks once both
            // pipe buffers fill. Dropping stdin after the last line signals
            // end-of-requests to the oracle.
            let writer = tokio::spawn(async move {
                let mut stdin = stdin;
                for line in lines {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.write_all(b"\n").await?;
                }
                stdin.shutdown().await?;
                Ok::<(), std::io::Error>(())
            });

            let verdicts = read_verdicts(stdout, expected).await;

            // A write failure here means the oracle stopped reading early;
            // the affected verdicts already defaulted to "not blocked"
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::warn!("⚠️  Classifier stopped reading requests: {}", e),
                Err(e) => log::warn!("⚠️  Classifier writer task failed: {}", e),
            }

            let _ = child.wait().await;

            verdicts
        })
        .await;

        match result {
            Ok(verdicts) => Ok(verdicts),
            Err(_) => {
                let _ = child.kill().await;
                let secs = self.timeout.as_secs();
                log::error!("❌ Classifier timed out after {}s", secs);
                Err(SinkError::ProcessTimeout(secs))
            }
        }
    }

    fn backend_type(&self) -> &'static str {
        "Pipe"
    }
}

/// Read exactly one verdict line per request, in request order
///
/// A line of exactly `1` means blocked. Anything else, including premature
/// end-of-stream or a read error, means not blocked for that entry.
async fn read_verdicts(stdout: ChildStdout, expected: usize) -> Vec<bool> {
    let mut lines = BufReader::new(stdout).lines();
    let mut verdicts = Vec::with_capacity(expected);

    for _ in 0..expected {
        match lines.next_line().await {
            Ok(Some(line)) => verdicts.push(line == "1"),
            Ok(None) => verdicts.push(false),
            Err(e) => {
                log::warn!("⚠️  Failed to read classifier verdict: {}", e);
                verdicts.push(false);
            }
        }
    }

    verdicts
}
