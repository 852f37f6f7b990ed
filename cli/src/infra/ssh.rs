//! Infrastructure SSH management: local key/config files and the OpenSSH tools.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{CommandRunner, SshClient, SshFiles, SshPaths};

// ── Files ─────────────────────────────────────────────────────────────────────

/// Key pair and client config under one directory (default `~/.ssh`).
pub struct LocalSshFiles {
    paths: SshPaths,
}

impl LocalSshFiles {
    /// Files under `dir`, or `~/.ssh` when `dir` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn new(dir: Option<&str>) -> Result<Self> {
        let dir = match dir {
            Some(d) => PathBuf::from(d),
            None => dirs::home_dir()
                .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?
                .join(".ssh"),
        };
        Ok(Self::with_dir(&dir))
    }

    /// Files under an arbitrary directory (for testing).
    #[must_use]
    pub fn with_dir(dir: &Path) -> Self {
        Self {
            paths: SshPaths::under(dir),
        }
    }
}

impl SshFiles for LocalSshFiles {
    fn paths(&self) -> &SshPaths {
        &self.paths
    }

    async fn ensure_key_dir(&self) -> Result<()> {
        let dir = &self.paths.dir;
        if tokio::fs::try_exists(dir).await.unwrap_or(false) {
            return Ok(());
        }
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("create dir {}", dir.display()))?;
        set_permissions(dir, 0o700).await
    }

    async fn private_key_exists(&self) -> bool {
        tokio::fs::try_exists(&self.paths.private_key)
            .await
            .unwrap_or(false)
    }

    async fn set_key_permissions(&self) -> Result<()> {
        set_permissions(&self.paths.private_key, 0o600).await?;
        set_permissions(&self.paths.public_key, 0o644).await
    }

    async fn read_public_key(&self) -> Result<String> {
        let key = tokio::fs::read_to_string(&self.paths.public_key)
            .await
            .with_context(|| format!("read {}", self.paths.public_key.display()))?;
        Ok(key.trim().to_string())
    }

    async fn stage_public_key(&self, key: &str) -> Result<PathBuf> {
        // Staged next to the key rather than in /tmp: a snap-confined
        // multipass cannot read the host's /tmp.
        let path = self.paths.dir.join(format!(
            "mprun_key_{}.pub",
            chrono::Utc::now().timestamp_millis()
        ));
        tokio::fs::write(&path, format!("{}\n", key.trim()))
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(path)
    }

    async fn remove_staged(&self, path: &Path) -> Result<()> {
        tokio::fs::remove_file(path)
            .await
            .with_context(|| format!("remove {}", path.display()))
    }

    async fn read_config(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.paths.config).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                Err(e).with_context(|| format!("read {}", self.paths.config.display()))
            }
        }
    }

    async fn write_config(&self, content: &str) -> Result<()> {
        let path = &self.paths.config;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        set_permissions(path, 0o600).await
    }
}

#[cfg(unix)]
async fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .with_context(|| format!("set permissions on {}", path.display()))
}

#[cfg(not(unix))]
async fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

// ── Client ────────────────────────────────────────────────────────────────────

/// `ssh-keygen` and `ssh` driven through a `CommandRunner`.
pub struct OpenSshClient<R: CommandRunner> {
    runner: R,
}

impl<R: CommandRunner> OpenSshClient<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }
}

impl<R: CommandRunner> SshClient for OpenSshClient<R> {
    async fn generate_key(&self, private_key: &Path) -> Result<()> {
        let key = private_key.to_string_lossy();
        let output = self
            .runner
            .run(
                "ssh-keygen",
                &[
                    "-t",
                    "rsa",
                    "-b",
                    "4096",
                    "-f",
                    &key,
                    "-N",
                    "",
                    "-C",
                    "multipass-run",
                ],
            )
            .await
            .context("ssh-keygen")?;
        anyhow::ensure!(
            output.status.success(),
            "ssh-keygen failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
        Ok(())
    }

    async fn test_connection(
        &self,
        user: &str,
        ip: &str,
        identity: &Path,
        timeout: Duration,
    ) -> Result<bool> {
        let connect_timeout = format!("ConnectTimeout={}", timeout.as_secs());
        let identity = identity.to_string_lossy();
        let target = format!("{user}@{ip}");
        // Outer timeout leaves room for the handshake after the TCP connect.
        let output = self
            .runner
            .run_with_timeout(
                "ssh",
                &[
                    "-o",
                    &connect_timeout,
                    "-o",
                    "StrictHostKeyChecking=no",
                    "-o",
                    "UserKnownHostsFile=/dev/null",
                    "-o",
                    "BatchMode=yes",
                    "-i",
                    &identity,
                    &target,
                    "echo 'SSH connection successful'",
                ],
                timeout * 2,
            )
            .await
            .context("ssh connectivity test")?;
        Ok(output.status.success()
            && String::from_utf8_lossy(&output.stdout).contains("SSH connection successful"))
    }

    async fn connect(&self, host_alias: &str) -> Result<ExitStatus> {
        self.runner.run_status("ssh", &[host_alias]).await
    }
}
