//! Infrastructure implementation of the multipass port traits.
//!
//! `MultipassProvisioner<R>` routes every multipass CLI call through a
//! [`CommandResolver`] so each invocation gets candidate-path fallback.

use std::path::Path;
use std::process::Output;
use std::time::Duration;

use crate::application::ports::{
    CommandRunner, FileTransfer, InstanceInspector, InstanceLifecycle, ShellExecutor,
};
use crate::domain::{AppConfig, InvokeError, LaunchSpec};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::resolver::CommandResolver;

/// Adapter over the multipass CLI.
///
/// Generic over `R: CommandRunner` so that tests can inject a scripted runner
/// without spawning real processes.
pub struct MultipassProvisioner<R: CommandRunner> {
    resolver: CommandResolver<R>,
}

impl<R: CommandRunner> MultipassProvisioner<R> {
    pub fn new(runner: R, candidates: Vec<String>) -> Self {
        Self {
            resolver: CommandResolver::new(runner, candidates),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, InvokeError> {
        let output = self.resolver.invoke(args).await?;
        if !output.status.success() {
            tracing::debug!(
                ?args,
                code = ?output.status.code(),
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "multipass exited non-zero"
            );
        }
        Ok(output)
    }
}

impl MultipassProvisioner<TokioCommandRunner> {
    /// Production provisioner built from the user's config.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        let timeout = config
            .multipass
            .command_timeout_secs
            .map(Duration::from_secs);
        Self::new(
            TokioCommandRunner::new(timeout),
            config.multipass.paths.clone(),
        )
    }
}

impl<R: CommandRunner> InstanceLifecycle for MultipassProvisioner<R> {
    async fn launch(
        &self,
        spec: &LaunchSpec,
        on_line: Option<&mut dyn FnMut(&str)>,
    ) -> Result<Output, InvokeError> {
        let owned = spec.launch_args();
        let args: Vec<&str> = owned.iter().map(String::as_str).collect();
        tracing::info!(name = %spec.name, ?args, "launching instance");
        match on_line {
            Some(on_line) => self.resolver.invoke_streaming(&args, on_line).await,
            None => self.run(&args).await,
        }
    }

    async fn start(&self, name: &str) -> Result<Output, InvokeError> {
        self.run(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> Result<Output, InvokeError> {
        self.run(&["stop", name]).await
    }

    async fn suspend(&self, name: &str) -> Result<Output, InvokeError> {
        self.run(&["suspend", name]).await
    }

    async fn delete(&self, name: &str, purge: bool) -> Result<Output, InvokeError> {
        if purge {
            self.run(&["delete", "--purge", name]).await
        } else {
            self.run(&["delete", name]).await
        }
    }

    async fn recover(&self, name: &str) -> Result<Output, InvokeError> {
        self.run(&["recover", name]).await
    }

    async fn purge(&self) -> Result<Output, InvokeError> {
        self.run(&["purge"]).await
    }
}

impl<R: CommandRunner> InstanceInspector for MultipassProvisioner<R> {
    async fn list(&self) -> Result<Output, InvokeError> {
        self.run(&["list", "--format", "json"]).await
    }

    async fn info(&self, name: &str) -> Result<Output, InvokeError> {
        self.run(&["info", name, "--format", "json"]).await
    }

    async fn find(&self) -> Result<Output, InvokeError> {
        self.run(&["find", "--format", "json"]).await
    }

    async fn version(&self) -> Result<Output, InvokeError> {
        self.run(&["version"]).await
    }
}

impl<R: CommandRunner> FileTransfer for MultipassProvisioner<R> {
    async fn transfer(
        &self,
        local: &Path,
        name: &str,
        remote: &str,
    ) -> Result<Output, InvokeError> {
        let local = local.to_string_lossy();
        let dest = format!("{name}:{remote}");
        self.run(&["transfer", &local, &dest]).await
    }
}

impl<R: CommandRunner> ShellExecutor for MultipassProvisioner<R> {
    async fn exec(&self, name: &str, args: &[&str]) -> Result<Output, InvokeError> {
        let mut full = vec!["exec", name, "--"];
        full.extend_from_slice(args);
        self.run(&full).await
    }
}
