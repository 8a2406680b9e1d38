//! Command execution with timeout and capped output capture.

use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tokio::time::{timeout, Instant};
use tracing::{debug, warn};

use minicron_core::RunStatus;

/// Marker appended when captured output exceeds the configured cap.
const TRUNCATION_MARKER: &str = "\n... [truncated]";

/// Infrastructure failures; command failure is never one of these.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be started at all.
    #[error("Failed to spawn command: {0}")]
    Spawn(String),

    /// The process could not be waited on or its output collected.
    #[error("Failed to reap command: {0}")]
    Reap(String),
}

/// Outcome of one command execution.
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit code; `None` when the process was killed on timeout.
    pub exit_code: Option<i32>,
    /// Whether the timeout fired.
    pub timed_out: bool,
    /// Captured stdout, capped with a truncation marker.
    pub stdout: String,
    /// Captured stderr, capped with a truncation marker.
    pub stderr: String,
    /// Wall-clock duration.
    pub duration: Duration,
}

impl ExecutionResult {
    /// Whether the command completed with exit code zero.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Map the outcome onto a job run status.
    pub fn status(&self) -> RunStatus {
        if self.timed_out {
            RunStatus::TimedOut
        } else if self.success() {
            RunStatus::Success
        } else {
            RunStatus::Failed
        }
    }
}

/// Runs job commands through the platform shell.
///
/// Each command gets its own process group so a timeout kills the whole
/// tree, not just the shell.
#[derive(Debug, Clone)]
pub struct Executor {
    timeout: Duration,
    max_output_bytes: usize,
}

impl Executor {
    /// Create an executor with the given per-run timeout and per-stream
    /// output cap.
    pub fn new(timeout: Duration, max_output_bytes: usize) -> Self {
        Self {
            timeout,
            max_output_bytes,
        }
    }

    /// Per-run timeout currently in force.
    pub fn run_timeout(&self) -> Duration {
        self.timeout
    }

    /// Execute `command` to completion or timeout.
    pub async fn run(&self, command: &str) -> Result<ExecutionResult, ExecError> {
        let (shell, flag) = if cfg!(target_os = "windows") {
            ("cmd", "/C")
        } else {
            ("sh", "-c")
        };

        let mut cmd = Command::new(shell);
        cmd.arg(flag)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd.spawn().map_err(|e| ExecError::Spawn(e.to_string()))?;
        let pid = child.id();

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let cap = self.max_output_bytes;
        let stdout_task = tokio::spawn(capture(stdout_pipe, cap));
        let stderr_task = tokio::spawn(capture(stderr_pipe, cap));

        let (exit_code, timed_out) = match timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => (status.code(), false),
            Ok(Err(e)) => return Err(ExecError::Reap(e.to_string())),
            Err(_) => {
                warn!("Command exceeded {:?} timeout, killing process group", self.timeout);
                kill_process_group(pid);
                let _ = child.kill().await;
                let _ = child.wait().await;
                (None, true)
            }
        };

        let stdout = stdout_task
            .await
            .map_err(|e| ExecError::Reap(e.to_string()))?;
        let stderr = stderr_task
            .await
            .map_err(|e| ExecError::Reap(e.to_string()))?;

        let duration = started.elapsed();
        debug!(
            "Command finished in {:?} (exit: {:?}, timed_out: {})",
            duration, exit_code, timed_out
        );

        Ok(ExecutionResult {
            exit_code,
            timed_out,
            stdout,
            stderr,
            duration,
        })
    }
}

/// Read a pipe to EOF, keeping at most `cap` bytes. The pipe is always
/// drained so the child never stalls on a full buffer.
async fn capture(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
    cap: usize,
) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };

    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    let mut truncated = false;

    loop {
        match pipe.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                if buf.len() < cap {
                    let take = n.min(cap - buf.len());
                    buf.extend_from_slice(&chunk[..take]);
                    if take < n {
                        truncated = true;
                    }
                } else {
                    truncated = true;
                }
            }
            Err(_) => break,
        }
    }

    let mut text = String::from_utf8_lossy(&buf).into_owned();
    if truncated {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = pid {
        if let Err(e) = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL) {
            warn!("Failed to kill process group {}: {}", pid, e);
        }
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
