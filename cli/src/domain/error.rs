//! Typed domain error enums and the failure classification table.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use serde::Serialize;
use thiserror::Error;

// ── Invocation errors ─────────────────────────────────────────────────────────

/// Failure to invoke the multipass binary at all.
///
/// A candidate that was found and exited non-zero is *not* an `InvokeError`;
/// the caller receives its output and decides what the exit code means.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum InvokeError {
    /// None of the candidate paths could be executed.
    #[error("multipass not found (tried: {tried})")]
    NotInstalled { tried: String },

    /// A candidate was found but the process could not be run.
    #[error("{0}")]
    Spawn(String),
}

// ── Operation errors ──────────────────────────────────────────────────────────

/// Classification of a failed operation, surfaced to the UI boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// No candidate binary resolves.
    NotInstalled,
    /// The binary resolves but the daemon socket is unreachable.
    DaemonNotRunning,
    /// Any other non-zero exit or parse failure.
    Other,
}

impl ErrorKind {
    /// Stable machine-readable code used in JSON output.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::NotInstalled => "not-installed",
            Self::DaemonNotRunning => "daemon-not-running",
            Self::Other => "other",
        }
    }
}

/// The error every core operation returns instead of raising.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[error("{message}")]
pub struct MultipassError {
    pub kind: ErrorKind,
    pub message: String,
}

impl MultipassError {
    #[must_use]
    pub fn not_installed() -> Self {
        Self {
            kind: ErrorKind::NotInstalled,
            message: "Multipass is not installed on your system".to_string(),
        }
    }

    #[must_use]
    pub fn daemon_not_running() -> Self {
        Self {
            kind: ErrorKind::DaemonNotRunning,
            message: "Multipass daemon is not running. Please start Multipass.".to_string(),
        }
    }

    #[must_use]
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Other,
            message: message.into(),
        }
    }

    /// Build the error for a candidate that ran and exited non-zero.
    ///
    /// The message is stderr when non-empty, else stdout, else `fallback`.
    /// A binary that ran cannot be "not installed", so only the daemon wording
    /// is promoted out of `Other`.
    #[must_use]
    pub fn from_exit(stderr: &str, stdout: &str, fallback: &str) -> Self {
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(fallback);
        match classify_failure(message) {
            ErrorKind::DaemonNotRunning => Self::daemon_not_running(),
            _ => Self::other(message),
        }
    }
}

impl From<InvokeError> for MultipassError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::NotInstalled { .. } => Self::not_installed(),
            InvokeError::Spawn(message) => match classify_failure(&message) {
                ErrorKind::DaemonNotRunning => Self::daemon_not_running(),
                ErrorKind::NotInstalled => Self::not_installed(),
                ErrorKind::Other => Self::other(message),
            },
        }
    }
}

// ── Classification table ──────────────────────────────────────────────────────

/// Multipass error wording observed through the 1.x CLI series.
///
/// Each row matches when *all* of its substrings occur in the message.
/// Rows are evaluated top to bottom; daemon wording wins over install wording
/// because "socket ... not found" style messages mean the daemon, not the binary.
pub const FAILURE_PATTERNS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::DaemonNotRunning, &["cannot connect to the multipass socket"]),
    (ErrorKind::DaemonNotRunning, &["socket", "connect"]),
    (ErrorKind::NotInstalled, &["command not found"]),
    (ErrorKind::NotInstalled, &["No such file or directory"]),
    (ErrorKind::NotInstalled, &["not found"]),
];

/// Classify a raw failure message using [`FAILURE_PATTERNS`].
#[must_use]
pub fn classify_failure(message: &str) -> ErrorKind {
    FAILURE_PATTERNS
        .iter()
        .find(|(_, needles)| needles.iter().all(|n| message.contains(n)))
        .map_or(ErrorKind::Other, |(kind, _)| *kind)
}

// ── Launch spec errors ────────────────────────────────────────────────────────

/// Validation failures for a launch request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LaunchSpecError {
    #[error("Instance name cannot be empty")]
    EmptyName,

    #[error("Instance name '{0}' can only contain letters, numbers, hyphens, and underscores")]
    InvalidName(String),

    #[error("Invalid CPU count '{0}': must be a positive integer (minimum: 1)")]
    InvalidCpus(String),

    #[error("Invalid {field} size '{value}': use a number with K, M, or G suffix (e.g. 1G, 512M)")]
    InvalidSize { field: &'static str, value: String },

    #[error("Minimum {field}: {minimum}")]
    BelowMinimum {
        field: &'static str,
        minimum: &'static str,
    },
}

// ── SSH errors ────────────────────────────────────────────────────────────────

/// Failures that abort SSH provisioning.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SshError {
    #[error("Failed to generate SSH key: {0}")]
    KeyGeneration(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Failed to create .ssh directory in instance: {0}")]
    RemoteDirectory(String),

    #[error("Failed to add SSH key to instance: {0}")]
    AuthorizeKey(String),

    #[error("Failed to update SSH config: {0}")]
    Config(String),

    #[error("No SSH configuration for '{0}'. Run: mprun ssh setup {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Multipass(#[from] MultipassError),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration key/value validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown setting: {key}\n\nValid settings: {valid}")]
    UnknownKey { key: String, valid: String },

    #[error("Invalid value for {key}: {value}\n\nExpected: {expected}")]
    InvalidValue {
        key: String,
        value: String,
        expected: String,
    },
}
