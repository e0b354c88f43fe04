//! Command executor for system probes.
//!
//! Every external tool the audit touches goes through [`CommandRunner`]:
//! one spawn per call, captured stdout, a per-call deadline, and
//! cancellation through the run-wide token. The runner never retries and
//! never writes to disk.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::{Error, Result};

/// Maximum stderr bytes carried inside a [`Error::CommandFailed`].
const STDERR_TAIL_BYTES: usize = 512;

/// Spawns external tools with a deadline and cancellation support.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CommandRunner {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    /// The token this runner races every call against.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Returns true when `program` resolves on PATH.
    pub fn tool_available(&self, program: &str) -> bool {
        which::which(program).is_ok()
    }

    /// Runs `program` with `args` under the default deadline, returning
    /// captured stdout.
    pub async fn run(&self, program: &str, args: &[&str]) -> Result<String> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    /// Runs `program` with `args` under a caller-supplied deadline.
    ///
    /// Error mapping:
    /// - spawn `NotFound` → [`Error::ToolMissing`]
    /// - spawn EACCES, or non-zero exit whose stderr reports a permission
    ///   problem → [`Error::PermissionDenied`]
    /// - deadline exceeded → [`Error::Timeout`] (child is killed)
    /// - other non-zero exit → [`Error::CommandFailed`] with the first
    ///   512 bytes of stderr
    pub async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<String> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolMissing(program.to_string()),
                std::io::ErrorKind::PermissionDenied => {
                    Error::PermissionDenied(program.to_string())
                }
                _ => Error::Io(e),
            })?;

        debug!(program, ?args, "spawned probe");

        // kill_on_drop terminates the child when either branch abandons
        // the wait future.
        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            waited = tokio::time::timeout(timeout, child.wait_with_output()) => match waited {
                Err(_) => return Err(Error::timeout(program, timeout.as_secs())),
                Ok(Err(e)) => return Err(Error::Io(e)),
                Ok(Ok(output)) => output,
            },
        };

        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
        }

        let stderr = stderr_tail(&output.stderr);
        if stderr.contains("Permission denied") || stderr.contains("Operation not permitted") {
            return Err(Error::PermissionDenied(format!("{program}: {stderr}")));
        }
        Err(Error::CommandFailed {
            command: program.to_string(),
            code: output.status.code().unwrap_or(-1),
            stderr,
        })
    }
}

/// Captured output of a probe that is allowed to exit non-zero.
#[derive(Debug, Clone)]
pub struct ProbeOutput {
    pub stdout: String,
    pub stderr: String,
    pub code: i32,
}

impl CommandRunner {
    /// Like [`CommandRunner::run`], but a non-zero exit is part of the
    /// result instead of an error. Scanners such as `rkhunter` signal
    /// findings through their exit code while the findings themselves are
    /// on stdout.
    pub async fn run_unchecked(&self, program: &str, args: &[&str]) -> Result<ProbeOutput> {
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => Error::ToolMissing(program.to_string()),
                std::io::ErrorKind::PermissionDenied => {
                    Error::PermissionDenied(program.to_string())
                }
                _ => Error::Io(e),
            })?;

        let output = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(Error::Cancelled),
            waited = tokio::time::timeout(self.timeout, child.wait_with_output()) => match waited {
                Err(_) => return Err(Error::timeout(program, self.timeout.as_secs())),
                Ok(Err(e)) => return Err(Error::Io(e)),
                Ok(Ok(output)) => output,
            },
        };

        Ok(ProbeOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: stderr_tail(&output.stderr),
            code: output.status.code().unwrap_or(-1),
        })
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let end = stderr.len().min(STDERR_TAIL_BYTES);
    String::from_utf8_lossy(&stderr[..end]).trim().to_string()
}
