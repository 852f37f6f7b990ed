//! SSH access provisioning for an instance.
//!
//! Setup is idempotent end to end: the key pair is generated once, the remote
//! `authorized_keys` is only appended to when the key is missing, and the
//! local client config holds exactly one block per instance.

use std::process::{ExitStatus, Output};
use std::time::Duration;

use crate::application::ports::{FileTransfer, ShellExecutor, SshClient, SshFiles};
use crate::domain::InvokeError;
use crate::domain::error::SshError;
use crate::domain::ssh::{
    HostEntry, REMOTE_SSH_DIR_SCRIPT, REMOTE_STAGED_KEY, append_staged_key_script, has_block,
    host_alias, key_present_script, merge_block, strip_block, validate_pubkey,
};

/// Remote login and connectivity test settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshSettings {
    pub user: String,
    pub connect_timeout: Duration,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            user: "ubuntu".to_string(),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub struct SshProvisioner<'a, P, F, C> {
    mp: &'a P,
    files: &'a F,
    client: &'a C,
    settings: SshSettings,
}

impl<'a, P, F, C> SshProvisioner<'a, P, F, C>
where
    P: ShellExecutor + FileTransfer,
    F: SshFiles,
    C: SshClient,
{
    pub fn new(mp: &'a P, files: &'a F, client: &'a C, settings: SshSettings) -> Self {
        Self {
            mp,
            files,
            client,
            settings,
        }
    }

    /// Make `name` reachable as `multipass-<name>` at `ip`.
    ///
    /// Returns `Ok(false)` when everything was configured but the trial
    /// connection failed; that is a warning, not a failure.
    ///
    /// # Errors
    ///
    /// Any step before the connectivity test aborts setup.
    pub async fn setup(&self, name: &str, ip: &str) -> Result<bool, SshError> {
        let paths = self.files.paths();
        tracing::info!(name, ip, "setting up SSH access");

        self.files
            .ensure_key_dir()
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))?;

        if !self.files.private_key_exists().await {
            tracing::info!(key = %paths.private_key.display(), "generating SSH key pair");
            self.client
                .generate_key(&paths.private_key)
                .await
                .map_err(|e| SshError::KeyGeneration(format!("{e:#}")))?;
            self.files
                .set_key_permissions()
                .await
                .map_err(|e| SshError::KeyGeneration(format!("{e:#}")))?;
        }

        let public_key = self
            .files
            .read_public_key()
            .await
            .map_err(|e| SshError::KeyGeneration(format!("{e:#}")))?;
        validate_pubkey(&public_key)?;

        let mkdir = self
            .mp
            .exec(name, &["bash", "-c", REMOTE_SSH_DIR_SCRIPT])
            .await;
        expect_success(mkdir, SshError::RemoteDirectory)?;

        self.authorize_key(name, &public_key).await?;

        let entry = HostEntry {
            name: name.to_string(),
            hostname: ip.to_string(),
            user: self.settings.user.clone(),
            identity_file: paths.private_key.to_string_lossy().into_owned(),
        };
        let current = self.read_config().await?;
        self.files
            .write_config(&merge_block(&current, &entry))
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))?;
        tracing::info!(name, alias = %host_alias(name), "SSH config entry written");

        let connected = match self
            .client
            .test_connection(
                &self.settings.user,
                ip,
                &paths.private_key,
                self.settings.connect_timeout,
            )
            .await
        {
            Ok(true) => true,
            Ok(false) => {
                tracing::warn!(name, "SSH connection test failed; it may work after a short delay");
                false
            }
            Err(e) => {
                tracing::warn!(name, "SSH connection test could not run: {e:#}");
                false
            }
        };
        Ok(connected)
    }

    async fn authorize_key(&self, name: &str, public_key: &str) -> Result<(), SshError> {
        let check = self
            .mp
            .exec(name, &["bash", "-c", &key_present_script(public_key)])
            .await;
        let check = expect_success(check, SshError::AuthorizeKey)?;
        if String::from_utf8_lossy(&check.stdout).trim() == "present" {
            tracing::debug!(name, "public key already authorized");
            return Ok(());
        }

        let staged = self
            .files
            .stage_public_key(public_key)
            .await
            .map_err(|e| SshError::AuthorizeKey(format!("{e:#}")))?;

        let transferred = self.mp.transfer(&staged, name, REMOTE_STAGED_KEY).await;
        let appended = match expect_success(transferred, SshError::AuthorizeKey) {
            Ok(_) => {
                let append = self
                    .mp
                    .exec(name, &["bash", "-c", &append_staged_key_script()])
                    .await;
                expect_success(append, SshError::AuthorizeKey).map(|_| ())
            }
            Err(e) => Err(e),
        };

        if let Err(e) = self.files.remove_staged(&staged).await {
            tracing::warn!("could not remove staged key: {e:#}");
        }
        appended?;
        tracing::info!(name, "public key authorized");
        Ok(())
    }

    /// Drop the block for `name`. Returns whether one was present. No-op when
    /// the config file does not exist.
    ///
    /// # Errors
    ///
    /// Returns `Config` if the file cannot be read or rewritten.
    pub async fn remove(&self, name: &str) -> Result<bool, SshError> {
        let Some(current) = self
            .files
            .read_config()
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))?
        else {
            return Ok(false);
        };
        let present = has_block(&current, name);
        self.files
            .write_config(&strip_block(&current, name))
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))?;
        tracing::info!(name, present, "SSH config entry removed");
        Ok(present)
    }

    /// Open an interactive session through the managed alias.
    ///
    /// # Errors
    ///
    /// `NotConfigured` when no block exists for `name`.
    pub async fn connect(&self, name: &str) -> Result<ExitStatus, SshError> {
        let current = self.read_config().await?;
        if !has_block(&current, name) {
            return Err(SshError::NotConfigured(name.to_string()));
        }
        self.client
            .connect(&host_alias(name))
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))
    }

    async fn read_config(&self) -> Result<String, SshError> {
        Ok(self
            .files
            .read_config()
            .await
            .map_err(|e| SshError::Config(format!("{e:#}")))?
            .unwrap_or_default())
    }
}

/// Map an exec/transfer result to its output, or `wrap` the failure.
fn expect_success(
    result: Result<Output, InvokeError>,
    wrap: fn(String) -> SshError,
) -> Result<Output, SshError> {
    let output = result.map_err(|e| SshError::Multipass(e.into()))?;
    if output.status.success() {
        return Ok(output);
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Err(wrap(if stderr.is_empty() {
        format!("exit code {:?}", output.status.code())
    } else {
        stderr
    }))
}
