//! Application context: unified state passed to every command handler.
//!
//! `AppContext` owns the loaded configuration and every infrastructure
//! adapter. Commands borrow it to build a `Session` for the request they
//! are about to send.

use std::time::Duration;

use anyhow::Result;

use crate::application::ports::{ConfigStore, EventSink};
use crate::application::services::session::{Session, SessionSettings};
use crate::application::services::ssh_provision::SshSettings;
use crate::domain::AppConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigStore;
use crate::infra::provisioner::MultipassProvisioner;
use crate::infra::ssh::{LocalSshFiles, OpenSshClient};
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Skip interactive prompts (also set by `CI` / `MPRUN_YES` env vars).
    pub yes: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// A session wired to the production adapters.
pub type AppSession<'a, E> = Session<
    'a,
    MultipassProvisioner<TokioCommandRunner>,
    LocalSshFiles,
    OpenSshClient<TokioCommandRunner>,
    E,
>;

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode).
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    /// Effective configuration.
    pub config: AppConfig,
    /// Where `config` was loaded from and is saved to.
    pub config_store: YamlConfigStore,
    /// Multipass CLI adapter.
    pub provisioner: MultipassProvisioner<TokioCommandRunner>,
    /// Local SSH key pair and client config.
    pub ssh_files: LocalSshFiles,
    /// `ssh` / `ssh-keygen`.
    pub ssh_client: OpenSshClient<TokioCommandRunner>,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when `--yes` / `-y` is passed, or when the `CI` or `MPRUN_YES`
    /// environment variables are present.
    pub non_interactive: bool,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or the
    /// SSH directory cannot be determined.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let ci_env = std::env::var("CI").is_ok() || std::env::var("MPRUN_YES").is_ok();
        let non_interactive = flags.behaviour.yes || ci_env;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };

        let config_store = YamlConfigStore;
        let config = config_store.load()?;
        let ssh_files = LocalSshFiles::new(config.ssh.dir.as_deref())?;
        tracing::debug!(paths = ?config.multipass.paths, "multipass candidates");

        Ok(Self {
            output: OutputContext::new(flags.output.no_color, flags.output.quiet),
            mode,
            provisioner: MultipassProvisioner::from_config(&config),
            ssh_files,
            ssh_client: OpenSshClient::new(TokioCommandRunner::new(None)),
            config,
            config_store,
            non_interactive,
        })
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Session settings derived from the config. `wait` controls whether
    /// mutations poll for convergence.
    #[must_use]
    pub fn session_settings(&self, wait: bool) -> SessionSettings {
        let poll = &self.config.poll;
        SessionSettings {
            poll_interval: Duration::from_millis(poll.interval_ms),
            max_attempts: poll.max_attempts,
            max_attempts_with_ip: poll.max_attempts_with_ip,
            wait,
            ssh: SshSettings {
                user: self.config.ssh.user.clone(),
                connect_timeout: Duration::from_secs(self.config.ssh.connect_timeout_secs),
            },
        }
    }

    /// A session over the production adapters, reporting to `events`.
    #[must_use]
    pub fn session<'a, E: EventSink>(&'a self, events: &'a E, wait: bool) -> AppSession<'a, E> {
        Session::new(
            &self.provisioner,
            &self.ssh_files,
            &self.ssh_client,
            events,
            self.session_settings(wait),
        )
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (CI, `--yes` flag, or `MPRUN_YES` env),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
