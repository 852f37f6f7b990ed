//! Candidate-path resolution for the multipass binary.
//!
//! Install locations differ per platform (PATH, snap, Homebrew, manual), and
//! GUI-launched hosts often run with a stripped PATH. Every invocation tries
//! the configured candidates in order.

use std::io;
use std::process::Output;

use crate::application::ports::CommandRunner;
use crate::domain::InvokeError;

/// Tries each candidate until one can be executed.
///
/// A candidate that cannot be found (or is not executable) is skipped. Any
/// other spawn failure stops the search. A candidate that runs and exits
/// non-zero is a real answer and is returned as-is; the search never
/// retries past it.
pub struct CommandResolver<R: CommandRunner> {
    runner: R,
    candidates: Vec<String>,
}

impl<R: CommandRunner> CommandResolver<R> {
    pub fn new(runner: R, candidates: Vec<String>) -> Self {
        Self { runner, candidates }
    }

    /// Run `args` against the first candidate that resolves.
    ///
    /// # Errors
    ///
    /// `NotInstalled` when no candidate resolves, `Spawn` when a candidate
    /// resolved but could not be run.
    pub async fn invoke(&self, args: &[&str]) -> Result<Output, InvokeError> {
        for candidate in &self.candidates {
            match self.runner.run(candidate, args).await {
                Ok(output) => return Ok(output),
                Err(err) if is_unresolved(&err) => {
                    tracing::debug!(candidate = %candidate, "candidate did not resolve, trying next");
                }
                Err(err) => return Err(InvokeError::Spawn(format!("{err:#}"))),
            }
        }
        Err(self.not_installed())
    }

    /// Like [`invoke`](Self::invoke) but streams stdout lines to `on_line`.
    /// The whole spawn is retried against the next candidate on resolution
    /// failure.
    ///
    /// # Errors
    ///
    /// Same as [`invoke`](Self::invoke).
    pub async fn invoke_streaming(
        &self,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Output, InvokeError> {
        for candidate in &self.candidates {
            match self.runner.run_streaming(candidate, args, &mut *on_line).await {
                Ok(output) => return Ok(output),
                Err(err) if is_unresolved(&err) => {
                    tracing::debug!(candidate = %candidate, "candidate did not resolve, trying next");
                }
                Err(err) => return Err(InvokeError::Spawn(format!("{err:#}"))),
            }
        }
        Err(self.not_installed())
    }

    fn not_installed(&self) -> InvokeError {
        tracing::warn!(candidates = ?self.candidates, "multipass not found at any candidate path");
        InvokeError::NotInstalled {
            tried: self.candidates.join(", "),
        }
    }
}

/// Whether `err` means "this candidate does not exist here".
#[must_use]
pub fn is_unresolved(err: &anyhow::Error) -> bool {
    err.chain()
        .find_map(|e| e.downcast_ref::<io::Error>())
        .is_some_and(|e| {
            matches!(
                e.kind(),
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
            )
        })
}
