//! Instance model: state machine, list parsing, active/deleted partition.
//!
//! Pure functions only. No I/O or async here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::error::{ErrorKind, MultipassError};

// ── State ─────────────────────────────────────────────────────────────────────

/// Instance state as reported by the daemon, plus two local-only states used
/// for optimistic updates (`Creating`, `DownloadingImage`).
///
/// Parsing is case-insensitive; unrecognised wording is preserved in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstanceState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Suspending,
    Suspended,
    Deleted,
    Recovering,
    Creating,
    DownloadingImage,
    Unknown,
    Other(String),
}

impl InstanceState {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "stopped" => Self::Stopped,
            "starting" | "restarting" => Self::Starting,
            "running" => Self::Running,
            "stopping" | "delayed shutdown" => Self::Stopping,
            "suspending" => Self::Suspending,
            "suspended" => Self::Suspended,
            "deleted" => Self::Deleted,
            "recovering" => Self::Recovering,
            "creating" => Self::Creating,
            "downloading image" | "downloadingimage" => Self::DownloadingImage,
            "unknown" | "" => Self::Unknown,
            _ => Self::Other(raw.trim().to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Stopped => "Stopped",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopping => "Stopping",
            Self::Suspending => "Suspending",
            Self::Suspended => "Suspended",
            Self::Deleted => "Deleted",
            Self::Recovering => "Recovering",
            Self::Creating => "Creating",
            Self::DownloadingImage => "Downloading Image",
            Self::Unknown => "Unknown",
            Self::Other(s) => s,
        }
    }

}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for InstanceState {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<InstanceState> for String {
    fn from(state: InstanceState) -> Self {
        state.as_str().to_string()
    }
}

// ── Transitions ───────────────────────────────────────────────────────────────

/// A lifecycle verb the user can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    Suspend,
    Delete,
    Recover,
    Purge,
}

impl Transition {
    /// Whether the daemon accepts this verb from `state`.
    ///
    /// The lifecycle service does not enforce this. The session checks it
    /// before `recover` and `purge`, which only apply to deleted instances.
    #[must_use]
    pub fn allowed_from(self, state: &InstanceState) -> bool {
        use InstanceState as S;
        match self {
            Self::Start => matches!(state, S::Stopped | S::Suspended),
            Self::Stop | Self::Suspend => matches!(state, S::Running),
            Self::Delete => !matches!(state, S::Deleted),
            Self::Recover | Self::Purge => matches!(state, S::Deleted),
        }
    }

    /// The state that confirms this verb took effect, or `None` when the
    /// instance is expected to disappear from the lists.
    #[must_use]
    pub fn target_state(self, purge: bool) -> Option<InstanceState> {
        match self {
            Self::Start => Some(InstanceState::Running),
            Self::Stop | Self::Recover => Some(InstanceState::Stopped),
            Self::Suspend => Some(InstanceState::Suspended),
            Self::Delete if purge => None,
            Self::Delete => Some(InstanceState::Deleted),
            Self::Purge => None,
        }
    }

    /// Transient state shown while the verb is in flight.
    #[must_use]
    pub fn optimistic_state(self) -> Option<InstanceState> {
        match self {
            Self::Start => Some(InstanceState::Starting),
            Self::Stop => Some(InstanceState::Stopping),
            Self::Suspend => Some(InstanceState::Suspending),
            Self::Recover => Some(InstanceState::Recovering),
            Self::Delete | Self::Purge => None,
        }
    }

    #[must_use]
    pub fn verb(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Suspend => "suspend",
            Self::Delete => "delete",
            Self::Recover => "recover",
            Self::Purge => "purge",
        }
    }
}

// ── Instance ──────────────────────────────────────────────────────────────────

/// One row of `multipass list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub state: InstanceState,
    /// Present only when the daemon has assigned an address.
    pub ipv4: Option<String>,
    pub release: String,
}

impl Instance {
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state == InstanceState::Deleted
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }

    /// Running with an address, i.e. ready for SSH provisioning.
    #[must_use]
    pub fn is_reachable(&self) -> bool {
        self.is_running() && self.ipv4.is_some()
    }

    /// Placeholder inserted into the UI before the daemon confirms anything.
    #[must_use]
    pub fn optimistic(name: &str, state: InstanceState, release: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            state,
            ipv4: None,
            release: release.unwrap_or("N/A").to_string(),
        }
    }
}

/// Result of a list query: active and soft-deleted instances, or why the
/// query could not be answered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceLists {
    pub active: Vec<Instance>,
    pub deleted: Vec<Instance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MultipassError>,
}

impl InstanceLists {
    /// Empty lists carrying a failure classification.
    #[must_use]
    pub fn failed(error: MultipassError) -> Self {
        Self {
            active: Vec::new(),
            deleted: Vec::new(),
            error: Some(error),
        }
    }

    /// Split instances on a case-insensitive `deleted` state.
    #[must_use]
    pub fn partition(instances: Vec<Instance>) -> Self {
        let (deleted, active) = instances.into_iter().partition(Instance::is_deleted);
        Self {
            active,
            deleted,
            error: None,
        }
    }

    /// Iterate active then deleted instances.
    pub fn all(&self) -> impl Iterator<Item = &Instance> {
        self.active.iter().chain(self.deleted.iter())
    }

    /// Find an instance by exact name in either list.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<&Instance> {
        self.all().find(|i| i.name == name)
    }

    /// Whether `name` is taken by any active or deleted instance, ignoring case.
    #[must_use]
    pub fn name_exists(&self, name: &str) -> bool {
        self.all().any(|i| i.name.eq_ignore_ascii_case(name))
    }

    /// Whether any known instance already uses `release`, meaning its image is
    /// in the daemon's cache. Matches containment either way, ignoring case, so
    /// `"24.04 LTS"` matches `"Ubuntu 24.04 LTS"`.
    #[must_use]
    pub fn image_is_cached(&self, release: &str) -> bool {
        let target = release.trim().to_lowercase();
        if target.is_empty() {
            return false;
        }
        self.all().any(|i| {
            let have = i.release.to_lowercase();
            !have.is_empty() && (have.contains(&target) || target.contains(&have))
        })
    }

    #[must_use]
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

/// Parse `multipass list --format json` output.
///
/// Missing fields default to `name = "Unknown"`, `state = Unknown`,
/// `ipv4 = None`, `release = "N/A"`. A document without a `list` array yields
/// empty lists.
///
/// # Errors
///
/// Returns an error if the output is not valid JSON.
pub fn parse_list(stdout: &[u8]) -> Result<InstanceLists, MultipassError> {
    let doc: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| MultipassError::other(format!("invalid JSON from multipass list: {e}")))?;

    let Some(rows) = doc.get("list").and_then(serde_json::Value::as_array) else {
        return Ok(InstanceLists::default());
    };

    let instances = rows.iter().map(parse_row).collect();
    Ok(InstanceLists::partition(instances))
}

fn parse_row(row: &serde_json::Value) -> Instance {
    let text = |key: &str| {
        row.get(key)
            .and_then(serde_json::Value::as_str)
            .filter(|s| !s.is_empty())
    };
    let state = InstanceState::parse(text("state").unwrap_or("Unknown"));
    Instance {
        name: text("name").unwrap_or("Unknown").to_string(),
        ipv4: (state == InstanceState::Running)
            .then(|| first_ipv4(row))
            .flatten(),
        state,
        release: text("release").unwrap_or("N/A").to_string(),
    }
}

/// First entry of an `ipv4` array, ignoring empty strings and the `--`
/// placeholder multipass prints for unassigned addresses.
pub(crate) fn first_ipv4(record: &serde_json::Value) -> Option<String> {
    record
        .get("ipv4")
        .and_then(serde_json::Value::as_array)
        .and_then(|arr| arr.first())
        .and_then(serde_json::Value::as_str)
        .filter(|ip| !ip.is_empty() && *ip != "--")
        .map(String::from)
}
