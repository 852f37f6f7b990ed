//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution with guaranteed timeout and kill on all platforms.

use std::process::{ExitStatus, Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

use crate::application::ports::CommandRunner;

/// Production `CommandRunner`.
///
/// On Windows, `tokio::time::timeout` around `.output().await` does NOT kill
/// the child process when the timeout fires; the future is dropped but the
/// OS process keeps running. This implementation uses `tokio::select!` with
/// explicit `child.kill()` to guarantee the process is terminated.
pub struct TokioCommandRunner {
    /// `None` waits for the process however long it takes.
    timeout: Option<Duration>,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

fn spawn_piped(program: &str, args: &[&str]) -> Result<Child> {
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))
}

async fn read_all<T: AsyncRead + Unpin>(handle: Option<T>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_end(&mut buf).await;
    }
    buf
}

async fn collect(program: &str, child: &mut Child) -> Result<Output> {
    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let (status, stdout, stderr) = tokio::join!(
        child.wait(),
        read_all(stdout_handle),
        read_all(stderr_handle),
    );
    Ok(Output {
        status: status.with_context(|| format!("waiting for {program}"))?,
        stdout,
        stderr,
    })
}

/// Hand a completed line to the callback, skipping blank ones.
fn flush_line(pending: &mut Vec<u8>, on_line: &mut dyn FnMut(&str)) {
    let line = String::from_utf8_lossy(pending);
    let line = line.trim();
    if !line.is_empty() {
        on_line(line);
    }
    pending.clear();
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        match self.timeout {
            Some(timeout) => self.run_with_timeout(program, args, timeout).await,
            None => {
                tracing::debug!(program, ?args, "running");
                let mut child = spawn_piped(program, args)?;
                collect(program, &mut child).await
            }
        }
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::debug!(program, ?args, timeout_secs = timeout.as_secs(), "running");
        let mut child = spawn_piped(program, args)?;

        tokio::select! {
            result = collect(program, &mut child) => result,
            () = tokio::time::sleep(timeout) => {
                let _ = child.kill().await;
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }

    async fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Output> {
        tracing::debug!(program, ?args, "running with streamed output");
        let mut child = spawn_piped(program, args)?;
        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        let (stdout, stderr) = tokio::join!(
            async {
                let mut all = Vec::new();
                let mut pending = Vec::new();
                let mut chunk = [0u8; 4096];
                if let Some(mut h) = stdout_handle {
                    while let Ok(n) = h.read(&mut chunk).await {
                        if n == 0 {
                            break;
                        }
                        all.extend_from_slice(&chunk[..n]);
                        for &byte in &chunk[..n] {
                            if byte == b'\n' || byte == b'\r' {
                                flush_line(&mut pending, on_line);
                            } else {
                                pending.push(byte);
                            }
                        }
                    }
                }
                flush_line(&mut pending, on_line);
                all
            },
            read_all(stderr_handle),
        );

        let status = child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))?;
        Ok(Output {
            status,
            stdout,
            stderr,
        })
    }

    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus> {
        tracing::debug!(program, ?args, "running interactive");
        let mut child = Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        child
            .wait()
            .await
            .with_context(|| format!("waiting for {program}"))
    }
}
