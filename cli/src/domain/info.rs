//! Detailed instance record from `multipass info --format json`.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::domain::error::MultipassError;
use crate::domain::instance::{InstanceState, first_ipv4};

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Used/total byte counts for a disk or memory section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub used: u64,
    pub total: u64,
}

impl Usage {
    /// `"1.50 GB / 10.00 GB"`.
    #[must_use]
    pub fn display(&self) -> String {
        format!("{} / {}", format_gb(self.used), format_gb(self.total))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub name: String,
    pub state: InstanceState,
    pub ipv4: Option<String>,
    pub release: String,
    pub zone: String,
    pub snapshot_count: u64,
    pub cpu_count: String,
    pub load: Vec<f64>,
    pub disk: Option<Usage>,
    pub memory: Option<Usage>,
    /// Host path to guest path.
    pub mounts: BTreeMap<String, String>,
}

impl InstanceInfo {
    #[must_use]
    pub fn disk_display(&self) -> String {
        self.disk.map_or_else(|| "N/A".to_string(), |u| u.display())
    }

    #[must_use]
    pub fn memory_display(&self) -> String {
        self.memory.map_or_else(|| "N/A".to_string(), |u| u.display())
    }

    #[must_use]
    pub fn load_display(&self) -> String {
        if self.load.is_empty() {
            return "N/A".to_string();
        }
        self.load
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    #[must_use]
    pub fn mounts_display(&self) -> String {
        if self.mounts.is_empty() {
            return "--".to_string();
        }
        self.mounts
            .iter()
            .map(|(source, target)| format!("{source} => {target}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// `bytes / 1024³`, two decimals, `" GB"` suffix.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_gb(bytes: u64) -> String {
    format!("{:.2} GB", bytes as f64 / GIB)
}

/// Parse the record for `name` out of an info document.
///
/// Returns `Ok(None)` when the document has no entry for `name`.
///
/// # Errors
///
/// Returns an error if the output is not valid JSON.
pub fn parse_info(name: &str, stdout: &[u8]) -> Result<Option<InstanceInfo>, MultipassError> {
    let doc: Value = serde_json::from_slice(stdout)
        .map_err(|e| MultipassError::other(format!("invalid JSON from multipass info: {e}")))?;

    let Some(record) = doc.get("info").and_then(|info| info.get(name)) else {
        return Ok(None);
    };

    let text = |key: &str| record.get(key).and_then(Value::as_str).filter(|s| !s.is_empty());

    let disk = record.get("disks").and_then(|disks| {
        disks
            .get("sda1")
            .or_else(|| disks.as_object().and_then(|m| m.values().next()))
            .and_then(parse_usage)
    });

    let state = InstanceState::parse(text("state").unwrap_or("Unknown"));
    Ok(Some(InstanceInfo {
        name: name.to_string(),
        ipv4: (state == InstanceState::Running)
            .then(|| first_ipv4(record))
            .flatten(),
        state,
        release: text("release").unwrap_or("N/A").to_string(),
        zone: record
            .get("zone")
            .and_then(|z| z.get("name"))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .unwrap_or("N/A")
            .to_string(),
        snapshot_count: record.get("snapshot_count").and_then(as_u64).unwrap_or(0),
        cpu_count: record
            .get("cpu_count")
            .and_then(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .unwrap_or_else(|| "N/A".to_string()),
        load: record
            .get("load")
            .and_then(Value::as_array)
            .map(|arr| arr.iter().filter_map(as_f64).collect())
            .unwrap_or_default(),
        disk,
        memory: record.get("memory").and_then(parse_usage),
        mounts: record
            .get("mounts")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .map(|(source, target)| {
                        let guest = target
                            .get("target_path")
                            .and_then(Value::as_str)
                            .or_else(|| target.as_str())
                            .unwrap_or_default();
                        (source.clone(), guest.to_string())
                    })
                    .collect()
            })
            .unwrap_or_default(),
    }))
}

fn parse_usage(section: &Value) -> Option<Usage> {
    Some(Usage {
        used: section.get("used").and_then(as_u64)?,
        total: section.get("total").and_then(as_u64)?,
    })
}

/// Multipass emits counters as numbers or numeric strings depending on version.
fn as_u64(v: &Value) -> Option<u64> {
    match v {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
