//! A generic, cancellable subprocess command builder shared by every VCS gateway.
//!
//! A fluent builder that records argv, working directory, and env before spawning, kept
//! separately testable from any real VCS binary, and generic over any program name, since
//! the solver drives `git`, `hg`, `bzr`, and `svn` subprocesses through the same shape.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::core::error::{Cancelled, ResolverError};

/// Builds and executes a subprocess, honoring a timeout and a cancellation token.
///
/// Every VCS gateway method that shells out constructs one of these rather than calling
/// `tokio::process::Command` directly, so timeout handling, cancellation, and structured
/// error reporting stay uniform across `git`/`hg`/`bzr`/`svn`.
pub struct ProcessCommand {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

/// Captured stdout/stderr from a completed subprocess.
pub struct ProcessOutput {
    /// Standard output, UTF-8 (lossily converted).
    pub stdout: String,
    /// Standard error, UTF-8 (lossily converted).
    pub stderr: String,
}

/// Outcome of running a [`ProcessCommand`]: success, a resolver error, or cancellation.
pub enum ProcessOutcome {
    /// The subprocess exited successfully.
    Ok(ProcessOutput),
    /// The subprocess failed, or could not be spawned.
    Err(ResolverError),
    /// Cancellation fired before the subprocess completed; it has been killed.
    Cancelled,
}

impl ProcessCommand {
    /// Starts building a command invoking `program` (e.g. `"git"`, `"hg"`).
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), args: Vec::new(), current_dir: None, timeout: Some(Duration::from_secs(300)) }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends many arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the working directory the subprocess runs in.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Overrides the default five-minute timeout. `None` disables the timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the command to completion, racing it against `cancel`.
    ///
    /// On cancellation the child process is killed (Unix: `SIGTERM` then reap; Windows:
    /// `Child::kill`) and [`ProcessOutcome::Cancelled`] is returned instead of an error —
    /// per the design's rule that cancellation is never surfaced as a resolution error.
    pub async fn run(self, cancel: &CancellationToken) -> ProcessOutcome {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);

        tracing::debug!(target: "vcs", program = %self.program, args = ?self.args, "executing");

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return ProcessOutcome::Err(ResolverError::ExecutableNotFound { program: self.program });
            }
            Err(e) => {
                return ProcessOutcome::Err(ResolverError::Other(anyhow::anyhow!(
                    "failed to spawn `{}`: {e}",
                    self.program
                )));
            }
        };

        let wait = async {
            match self.timeout {
                Some(duration) => match tokio::time::timeout(duration, child.wait_with_output()).await {
                    Ok(result) => result.map_err(|e| anyhow::anyhow!("failed to read `{}` output: {e}", self.program)),
                    Err(_) => Err(anyhow::anyhow!("`{}` timed out after {:?}", self.program, duration)),
                },
                None => child
                    .wait_with_output()
                    .await
                    .map_err(|e| anyhow::anyhow!("failed to read `{}` output: {e}", self.program)),
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(target: "vcs", program = %self.program, "cancelled");
                ProcessOutcome::Cancelled
            }
            result = wait => match result {
                Ok(output) => {
                    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
                    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
                    if output.status.success() {
                        ProcessOutcome::Ok(ProcessOutput { stdout, stderr })
                    } else {
                        ProcessOutcome::Err(ResolverError::Other(anyhow::anyhow!(
                            "`{} {}` failed: {}",
                            self.program,
                            self.args.join(" "),
                            if stderr.trim().is_empty() { stdout.trim() } else { stderr.trim() }
                        )))
                    }
                }
                Err(e) => ProcessOutcome::Err(ResolverError::Other(e)),
            },
        }
    }

    /// Runs the command and returns trimmed stdout, collapsing cancellation into
    /// [`Cancelled`] rather than keeping it as a third outcome — used by gateway methods
    /// whose callers already operate inside a context where cancellation propagates via
    /// `?`.
    pub async fn run_stdout(self, cancel: &CancellationToken) -> Result<String, CancelOr<ResolverError>> {
        match self.run(cancel).await {
            ProcessOutcome::Ok(out) => Ok(out.stdout.trim().to_string()),
            ProcessOutcome::Err(e) => Err(CancelOr::Err(e)),
            ProcessOutcome::Cancelled => Err(CancelOr::Cancelled(Cancelled)),
        }
    }
}

/// Either a resolver error or cancellation, for call sites that want `?` to propagate
/// both through a single error type.
#[derive(Debug)]
pub enum CancelOr<E> {
    /// A resolver-level failure.
    Err(E),
    /// The operation was cancelled.
    Cancelled(Cancelled),
}

impl<E: std::fmt::Display> std::fmt::Display for CancelOr<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CancelOr::Err(e) => write!(f, "{e}"),
            CancelOr::Cancelled(c) => write!(f, "{c}"),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for CancelOr<E> {}

impl From<ResolverError> for CancelOr<ResolverError> {
    fn from(e: ResolverError) -> Self {
        CancelOr::Err(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_executable_reports_dedicated_error() {
        let cancel = CancellationToken::new();
        let outcome = ProcessCommand::new("definitely-not-a-real-binary-xyz").run(&cancel).await;
        assert!(matches!(outcome, ProcessOutcome::Err(ResolverError::ExecutableNotFound { .. })));
    }

    #[tokio::test]
    async fn cancellation_before_spawn_completes_is_observed() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let outcome = ProcessCommand::new("sleep").arg("5").run(&cancel).await;
        assert!(matches!(outcome, ProcessOutcome::Cancelled));
    }

    #[tokio::test]
    async fn successful_command_captures_stdout() {
        let cancel = CancellationToken::new();
        let outcome = ProcessCommand::new("echo").arg("hello").run(&cancel).await;
        match outcome {
            ProcessOutcome::Ok(out) => assert_eq!(out.stdout.trim(), "hello"),
            _ => panic!("expected success"),
        }
    }
}
