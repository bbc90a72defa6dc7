//! External programs standing in for the delta-apply engine and the
//! integrity verifier.

use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use segsync::{DeltaApplier, IntegrityError, IntegrityVerifier, ProgressChannel};
use tokio::io::AsyncReadExt;
use tokio::process::Command;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A program plus leading arguments, as configured by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    program: String,
    args: Vec<String>,
}

impl Invocation {
    fn from_argv(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        if program.is_empty() {
            return None;
        }
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn command(&self, trailing: &[&Path]) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(trailing)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn describe_failure(&self, status: ExitStatus, stderr: &str) -> String {
        let stderr = stderr.trim();
        if stderr.is_empty() {
            format!("{} exited with {status}", self.program)
        } else {
            format!("{} exited with {status}: {stderr}", self.program)
        }
    }
}

/// Runs `argv... <base> <delta> <output>` to reconstruct a segment.
///
/// The cancellation flag is polled while the child runs; on cancellation
/// the child is killed and an [`io::ErrorKind::Interrupted`] error returned.
#[derive(Debug, Clone)]
pub struct CommandDeltaApplier {
    invocation: Invocation,
    poll_interval: Duration,
}

impl CommandDeltaApplier {
    /// `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        Some(Self {
            invocation: Invocation::from_argv(argv)?,
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[async_trait::async_trait]
impl DeltaApplier for CommandDeltaApplier {
    async fn apply(
        &self,
        base: &Path,
        delta: &Path,
        output: &Path,
        channel: &ProgressChannel,
    ) -> io::Result<()> {
        let mut child = self.invocation.command(&[base, delta, output]).spawn()?;
        tracing::debug!(program = %self.invocation.program, "delta tool started");

        let stderr = child.stderr.take();
        let collector = tokio::spawn(async move {
            let mut text = String::new();
            if let Some(mut pipe) = stderr {
                let _ = pipe.read_to_string(&mut text).await;
            }
            text
        });

        let status = loop {
            tokio::select! {
                status = child.wait() => break status?,
                _ = tokio::time::sleep(self.poll_interval) => {
                    if channel.is_cancelled() {
                        child.kill().await?;
                        collector.abort();
                        return Err(io::Error::new(
                            io::ErrorKind::Interrupted,
                            "delta apply cancelled",
                        ));
                    }
                }
            }
        };

        let stderr = collector.await.unwrap_or_default();
        if !status.success() {
            return Err(io::Error::other(
                self.invocation.describe_failure(status, &stderr),
            ));
        }
        Ok(())
    }
}

/// Runs `argv... <file>`; a non-zero exit rejects the file.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    invocation: Invocation,
}

impl CommandVerifier {
    /// `None` when `argv` is empty.
    pub fn from_argv(argv: &[String]) -> Option<Self> {
        Some(Self {
            invocation: Invocation::from_argv(argv)?,
        })
    }
}

#[async_trait::async_trait]
impl IntegrityVerifier for CommandVerifier {
    async fn verify(&self, path: &Path) -> Result<(), IntegrityError> {
        let output = self.invocation.command(&[path]).output().await?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(IntegrityError::Invalid(
            self.invocation.describe_failure(output.status, &stderr),
        ))
    }
}
