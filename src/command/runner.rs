//! Subprocess execution.
//!
//! [`CommandRunner`] is the seam between orchestration and the operating
//! system. [`ProcessRunner`] is the production implementation; it spawns one
//! child per call, waits for it, and never retries.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::ExecError;

use super::builder::Invocation;

/// Captured output of a successful process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Output {
    /// Standard output, empty unless captured.
    pub stdout: Vec<u8>,
    /// Standard error, empty unless captured.
    pub stderr: Vec<u8>,
}

impl Output {
    /// Returns standard output as text, replacing invalid UTF-8.
    #[must_use]
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }
}

/// Runs invocations as subprocesses.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs one invocation to completion.
    ///
    /// With `capture_output` the child's stdout and stderr are collected and
    /// returned; otherwise they go straight to this process's streams. When
    /// `stdin` is given it is written to the child and the pipe closed.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError::Spawn`] if the process cannot start and
    /// [`ExecError::Failed`] if it exits with a nonzero status.
    async fn run(
        &self,
        invocation: &Invocation,
        capture_output: bool,
        stdin: Option<&[u8]>,
    ) -> Result<Output, ExecError>;
}

/// Runs invocations with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    /// Creates a new process runner.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(
        &self,
        invocation: &Invocation,
        capture_output: bool,
        stdin: Option<&[u8]>,
    ) -> Result<Output, ExecError> {
        debug!("Running: {invocation}");

        let program = invocation.program().to_string();
        let mut cmd = Command::new(&program);
        cmd.args(invocation.to_args());
        if let Some(dir) = invocation.current_dir() {
            cmd.current_dir(dir);
        }

        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::inherit()
        });
        if capture_output {
            cmd.stdout(Stdio::piped()).stderr(Stdio::piped());
        } else {
            cmd.stdout(Stdio::inherit()).stderr(Stdio::inherit());
        }

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

        // Feed stdin concurrently so a child filling its stdout pipe cannot
        // stall on us.
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => {
                let input = input.to_vec();
                Some(tokio::spawn(async move {
                    let written = pipe.write_all(&input).await;
                    drop(pipe);
                    written
                }))
            }
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|source| ExecError::Spawn {
                program: program.clone(),
                source,
            })?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("Could not write all input to '{program}': {e}"),
                Err(e) => warn!("Input writer for '{program}' did not complete: {e}"),
            }
        }

        if output.status.success() {
            debug!("'{program}' exited successfully");
            Ok(Output {
                stdout: output.stdout,
                stderr: output.stderr,
            })
        } else {
            Err(ExecError::Failed {
                program,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            })
        }
    }
}
