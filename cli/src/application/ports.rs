//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain` and never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;

use crate::domain::{AppConfig, Instance, InstanceLists, InvokeError, LaunchSpec};

// ── Value Types ───────────────────────────────────────────────────────────────

/// How a convergence poll ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum PollOutcome {
    /// The predicate held after `attempts` reads.
    Converged {
        attempts: u32,
        instance: Option<Instance>,
    },
    /// The attempt budget ran out. `last` is the final observed record; the
    /// instance may still converge later.
    TimedOut {
        attempts: u32,
        last: Option<Instance>,
    },
    /// A newer poll for the same instance took over.
    Superseded { attempts: u32 },
}

impl PollOutcome {
    #[must_use]
    pub fn converged(&self) -> bool {
        matches!(self, Self::Converged { .. })
    }

    #[must_use]
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Converged { attempts, .. }
            | Self::TimedOut { attempts, .. }
            | Self::Superseded { attempts } => *attempts,
        }
    }
}

/// Events pushed to the presentation side while a request is in flight.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// A locally synthesized record shown before the daemon confirms it.
    Optimistic(Instance),
    LaunchProgress { message: String, downloading: bool },
    /// Full lists after every registry read.
    Snapshot(InstanceLists),
    PollFinished { name: String, outcome: PollOutcome },
    /// Soft failure: logged and shown, never flips an operation to failed.
    Warning { message: String },
}

/// Local SSH file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshPaths {
    pub dir: PathBuf,
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub config: PathBuf,
}

impl SshPaths {
    /// Standard layout under `dir`: `multipass_id_rsa[.pub]` and `config`.
    #[must_use]
    pub fn under(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            private_key: dir.join("multipass_id_rsa"),
            public_key: dir.join("multipass_id_rsa.pub"),
            config: dir.join("config"),
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// Errors mean the process could not be run at all; a non-zero exit is an
/// `Ok(Output)` the caller inspects.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output, using the runner's default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
    /// Run a program, calling `on_line` for every stdout line as it arrives.
    /// Lines are split on `\n` and `\r` so progress redraws are seen. The
    /// returned `Output` still carries the full stdout and stderr.
    async fn run_streaming(
        &self,
        program: &str,
        args: &[&str],
        on_line: &mut dyn FnMut(&str),
    ) -> Result<Output>;
    /// Run a program with inherited stdio and return only its exit status.
    async fn run_status(&self, program: &str, args: &[&str]) -> Result<ExitStatus>;
}

// ── Multipass Port Traits ─────────────────────────────────────────────────────

/// Instance lifecycle operations. Each issues exactly one subcommand.
#[allow(async_fn_in_trait)]
pub trait InstanceLifecycle {
    /// Launch a new instance. With `on_line`, stdout is streamed line by line.
    async fn launch(
        &self,
        spec: &LaunchSpec,
        on_line: Option<&mut dyn FnMut(&str)>,
    ) -> Result<Output, InvokeError>;
    async fn start(&self, name: &str) -> Result<Output, InvokeError>;
    async fn stop(&self, name: &str) -> Result<Output, InvokeError>;
    async fn suspend(&self, name: &str) -> Result<Output, InvokeError>;
    /// Delete an instance; with `purge` it is removed for good.
    async fn delete(&self, name: &str, purge: bool) -> Result<Output, InvokeError>;
    async fn recover(&self, name: &str) -> Result<Output, InvokeError>;
    /// Permanently remove all deleted instances.
    async fn purge(&self) -> Result<Output, InvokeError>;
}

/// Read-only queries, all in JSON format.
#[allow(async_fn_in_trait)]
pub trait InstanceInspector {
    async fn list(&self) -> Result<Output, InvokeError>;
    async fn info(&self, name: &str) -> Result<Output, InvokeError>;
    async fn find(&self) -> Result<Output, InvokeError>;
    async fn version(&self) -> Result<Output, InvokeError>;
}

/// Host-to-instance file transfer.
#[allow(async_fn_in_trait)]
pub trait FileTransfer {
    async fn transfer(&self, local: &Path, name: &str, remote: &str)
    -> Result<Output, InvokeError>;
}

/// Command execution inside an instance.
#[allow(async_fn_in_trait)]
pub trait ShellExecutor {
    async fn exec(&self, name: &str, args: &[&str]) -> Result<Output, InvokeError>;
}

/// Composite trait: any type implementing all four sub-traits is a `VmProvisioner`.
pub trait VmProvisioner:
    InstanceLifecycle + InstanceInspector + FileTransfer + ShellExecutor
{
}

/// Blanket implementation: any type implementing all four sub-traits is a `VmProvisioner`.
impl<T> VmProvisioner for T where
    T: InstanceLifecycle + InstanceInspector + FileTransfer + ShellExecutor
{
}

// ── SSH Ports ─────────────────────────────────────────────────────────────────

/// Local SSH key and client config files.
#[allow(async_fn_in_trait)]
pub trait SshFiles {
    fn paths(&self) -> &SshPaths;
    /// Create the key directory with mode 0700 if it is missing.
    async fn ensure_key_dir(&self) -> Result<()>;
    async fn private_key_exists(&self) -> bool;
    /// Private key 0600, public key 0644.
    async fn set_key_permissions(&self) -> Result<()>;
    async fn read_public_key(&self) -> Result<String>;
    /// Write `key` to a temporary file and return its path.
    async fn stage_public_key(&self, key: &str) -> Result<PathBuf>;
    async fn remove_staged(&self, path: &Path) -> Result<()>;
    /// Client config contents, `None` when the file does not exist.
    async fn read_config(&self) -> Result<Option<String>>;
    /// Replace the client config, mode 0600.
    async fn write_config(&self, content: &str) -> Result<()>;
}

/// The OpenSSH client tools.
#[allow(async_fn_in_trait)]
pub trait SshClient {
    /// Generate an RSA 4096 key pair with an empty passphrase at `private_key`.
    async fn generate_key(&self, private_key: &Path) -> Result<()>;
    /// Whether a trivial remote command succeeds within `timeout`.
    async fn test_connection(
        &self,
        user: &str,
        ip: &str,
        identity: &Path,
        timeout: Duration,
    ) -> Result<bool>;
    /// Open an interactive session to `host_alias`.
    async fn connect(&self, host_alias: &str) -> Result<ExitStatus>;
}

// ── Event Port ────────────────────────────────────────────────────────────────

/// Receives session events. Sync trait, no async needed.
pub trait EventSink {
    fn emit(&self, event: SessionEvent);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts configuration persistence.
pub trait ConfigStore {
    /// Load the config, or defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<AppConfig>;
    /// Persist the config with mode 0600.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, config: &AppConfig) -> Result<()>;
    /// Resolved config file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}
