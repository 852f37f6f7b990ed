//! Configuration schema and `config set` validators.
//!
//! Pure functions only. No I/O here.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

/// Install locations tried in order when no override is configured.
pub const DEFAULT_MULTIPASS_PATHS: &[&str] = &[
    "multipass",
    "/snap/bin/multipass",
    "/usr/local/bin/multipass",
    "/opt/homebrew/bin/multipass",
];

pub const VALID_CONFIG_KEYS: &[&str] = &[
    "multipass.paths",
    "multipass.command_timeout_secs",
    "poll.interval_ms",
    "poll.max_attempts",
    "poll.max_attempts_with_ip",
    "ssh.dir",
    "ssh.user",
    "ssh.connect_timeout_secs",
];

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.multipass-run/config.yaml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub multipass: MultipassConfig,
    pub poll: PollConfig,
    pub ssh: SshConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultipassConfig {
    /// Candidate binaries, tried in order.
    pub paths: Vec<String>,
    /// Timeout for plain invocations. `None` waits for the daemon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl Default for MultipassConfig {
    fn default() -> Self {
        Self {
            paths: DEFAULT_MULTIPASS_PATHS.iter().map(ToString::to_string).collect(),
            command_timeout_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub max_attempts: u32,
    /// Budget for flows that also wait for an address.
    pub max_attempts_with_ip: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 2000,
            max_attempts: 30,
            max_attempts_with_ip: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Key and client config directory. `None` means `~/.ssh`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    pub user: String,
    pub connect_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            dir: None,
            user: "ubuntu".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Apply a validated `key = value` pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        validate_config_key(key)?;
        validate_config_value(key, value)?;
        match key {
            "multipass.paths" => self.multipass.paths = split_paths(value),
            "multipass.command_timeout_secs" => {
                self.multipass.command_timeout_secs = match value {
                    "none" => None,
                    v => Some(v.parse()?),
                };
            }
            "poll.interval_ms" => self.poll.interval_ms = value.parse()?,
            "poll.max_attempts" => self.poll.max_attempts = value.parse()?,
            "poll.max_attempts_with_ip" => self.poll.max_attempts_with_ip = value.parse()?,
            "ssh.dir" => self.ssh.dir = Some(value.to_string()),
            "ssh.user" => self.ssh.user = value.to_string(),
            "ssh.connect_timeout_secs" => self.ssh.connect_timeout_secs = value.parse()?,
            _ => {}
        }
        Ok(())
    }
}

fn split_paths(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

// ── Validators ───────────────────────────────────────────────────────────────

/// Validates a configuration key against the whitelist.
///
/// # Errors
///
/// Returns an error if the key is not in the allowed list.
pub fn validate_config_key(key: &str) -> Result<()> {
    if !VALID_CONFIG_KEYS.contains(&key) {
        return Err(ConfigError::UnknownKey {
            key: key.to_string(),
            valid: VALID_CONFIG_KEYS.join(", "),
        }
        .into());
    }
    Ok(())
}

/// Validates a configuration value for the given key.
///
/// # Errors
///
/// Returns an error if the value is not valid for the key.
pub fn validate_config_value(key: &str, value: &str) -> Result<()> {
    let invalid = |expected: &str| -> anyhow::Error {
        ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
        .into()
    };
    let positive = |v: &str| v.parse::<u64>().is_ok_and(|n| n >= 1);

    match key {
        "multipass.paths" if split_paths(value).is_empty() => {
            Err(invalid("comma-separated list of binary paths"))
        }
        "multipass.command_timeout_secs" if value != "none" && !positive(value) => {
            Err(invalid("positive number of seconds, or 'none'"))
        }
        "poll.interval_ms" if value.parse::<u64>().is_err() => {
            Err(invalid("number of milliseconds"))
        }
        "poll.max_attempts" | "poll.max_attempts_with_ip"
            if !value.parse::<u32>().is_ok_and(|n| n >= 1) =>
        {
            Err(invalid("positive integer"))
        }
        "ssh.connect_timeout_secs" if !positive(value) => {
            Err(invalid("positive number of seconds"))
        }
        "ssh.dir" | "ssh.user" if value.trim().is_empty() => Err(invalid("non-empty string")),
        "ssh.user"
            if !value
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            Err(invalid("a login name (letters, digits, '-', '_')"))
        }
        _ => Ok(()),
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
