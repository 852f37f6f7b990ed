//! SSH client config block rendering and marker-based merging, plus the
//! remote shell snippets used to authorize a key inside an instance.

use crate::domain::error::SshError;

/// Prefix of every marker comment this tool writes.
pub const MARKER_PREFIX: &str = "# Multipass instance: ";

/// Where a public key is staged inside the instance before being appended.
pub const REMOTE_STAGED_KEY: &str = "/tmp/mprun_key.pub";

/// Host alias for an instance: `multipass-<name>`.
#[must_use]
pub fn host_alias(name: &str) -> String {
    format!("multipass-{name}")
}

/// Marker comment line that opens the block for `name`.
#[must_use]
pub fn marker_line(name: &str) -> String {
    format!("{MARKER_PREFIX}{name} (managed by multipass-run)")
}

/// Name carried by a marker line, if `line` is one.
fn marker_name(line: &str) -> Option<&str> {
    line.trim_start()
        .strip_prefix(MARKER_PREFIX)?
        .split_whitespace()
        .next()
}

/// Aliases declared by a `Host` line, if `line` is one.
fn host_aliases(line: &str) -> Option<Vec<&str>> {
    let rest = line.trim_start();
    let mut tokens = rest.split_whitespace();
    if !tokens.next()?.eq_ignore_ascii_case("host") {
        return None;
    }
    Some(tokens.collect())
}

/// One managed host entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub name: String,
    pub hostname: String,
    pub user: String,
    pub identity_file: String,
}

impl HostEntry {
    /// Render the block, newline-terminated.
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "{marker}\n\
             Host {alias}\n  \
             HostName {ip}\n  \
             User {user}\n  \
             IdentityFile {key}\n  \
             StrictHostKeyChecking no\n  \
             UserKnownHostsFile /dev/null\n  \
             LogLevel ERROR\n",
            marker = marker_line(&self.name),
            alias = host_alias(&self.name),
            ip = self.hostname,
            user = self.user,
            key = self.identity_file,
        )
    }
}

/// Remove the managed block for `name` from `config`.
///
/// A block starts at a marker whose name equals `name` exactly and runs up to
/// the next `Host` line that does not declare this instance's alias, or the
/// next marker of another instance. Everything else is kept verbatim; only
/// leading and trailing whitespace of the whole file is normalised.
#[must_use]
pub fn strip_block(config: &str, name: &str) -> String {
    let alias = host_alias(name);
    let mut kept: Vec<&str> = Vec::new();
    let mut skipping = false;

    for line in config.split('\n') {
        if marker_name(line) == Some(name) {
            skipping = true;
            continue;
        }
        if skipping {
            let other_marker = marker_name(line).is_some();
            let other_host =
                host_aliases(line).is_some_and(|aliases| !aliases.iter().any(|a| *a == alias));
            if other_marker || other_host {
                skipping = false;
            }
        }
        if !skipping {
            kept.push(line);
        }
    }

    let rest = kept.join("\n");
    let rest = rest.trim();
    if rest.is_empty() {
        String::new()
    } else {
        format!("{rest}\n")
    }
}

/// Replace (or insert) the block for `entry` at the top of `config`.
#[must_use]
pub fn merge_block(config: &str, entry: &HostEntry) -> String {
    let rest = strip_block(config, &entry.name);
    let block = entry.render();
    if rest.is_empty() {
        block
    } else {
        format!("{block}\n{rest}")
    }
}

/// Whether `config` carries a managed block for `name`.
#[must_use]
pub fn has_block(config: &str, name: &str) -> bool {
    config.split('\n').any(|l| marker_name(l) == Some(name))
}

// ── Remote snippets ───────────────────────────────────────────────────────────

/// Validates that a public key is safe to embed in a single-quoted shell word.
///
/// # Errors
///
/// Returns `InvalidPublicKey` if the key has an unexpected prefix or contains
/// characters outside the base64 / comment set.
pub fn validate_pubkey(key: &str) -> Result<(), SshError> {
    let key = key.trim();
    if !(key.starts_with("ssh-rsa ") || key.starts_with("ssh-ed25519 ")) {
        return Err(SshError::InvalidPublicKey(
            "expected an ssh-rsa or ssh-ed25519 key".to_string(),
        ));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || " +/=@.-_".contains(c))
    {
        return Err(SshError::InvalidPublicKey(
            "public key contains invalid characters".to_string(),
        ));
    }
    Ok(())
}

/// `bash -c` script that creates the remote key directory.
pub const REMOTE_SSH_DIR_SCRIPT: &str = "mkdir -p ~/.ssh && chmod 700 ~/.ssh";

/// `bash -c` script that prints `present` when `key` is an exact line of
/// `authorized_keys`, else `not_found`. Caller must have validated `key`.
#[must_use]
pub fn key_present_script(key: &str) -> String {
    format!(
        "grep -qxF '{}' ~/.ssh/authorized_keys 2>/dev/null && echo present || echo not_found",
        key.trim()
    )
}

/// `bash -c` script that appends the staged key and cleans up.
#[must_use]
pub fn append_staged_key_script() -> String {
    format!(
        "cat {REMOTE_STAGED_KEY} >> ~/.ssh/authorized_keys && \
         chmod 600 ~/.ssh/authorized_keys && \
         rm {REMOTE_STAGED_KEY}"
    )
}
