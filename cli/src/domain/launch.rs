//! Launch request validation, argument building and stdout line classification.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::error::LaunchSpecError;

const KIB: f64 = 1024.0;
const MIB: f64 = KIB * 1024.0;
const GIB: f64 = MIB * 1024.0;

/// Smallest memory size multipass accepts.
pub const MIN_MEMORY_BYTES: f64 = 128.0 * MIB;
/// Smallest disk size multipass accepts.
pub const MIN_DISK_BYTES: f64 = 512.0 * MIB;

#[allow(clippy::expect_used)]
static SIZE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)([KMG])$").expect("valid regex"));

#[allow(clippy::expect_used)]
static PERCENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)%").expect("valid regex"));

// ── Spec ──────────────────────────────────────────────────────────────────────

/// Everything needed to launch one instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchSpec {
    pub name: String,
    /// Catalog key or alias; multipass picks the latest LTS when absent.
    pub image: Option<String>,
    pub cpus: Option<String>,
    pub memory: Option<String>,
    pub disk: Option<String>,
    /// Provision SSH access once the instance is reachable.
    #[serde(default)]
    pub enable_ssh: bool,
}

impl LaunchSpec {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Check every field; the first failure wins.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    pub fn validate(&self) -> Result<(), LaunchSpecError> {
        validate_name(&self.name)?;
        if let Some(cpus) = &self.cpus {
            validate_cpus(cpus)?;
        }
        if let Some(memory) = &self.memory {
            validate_memory(memory)?;
        }
        if let Some(disk) = &self.disk {
            validate_disk(disk)?;
        }
        Ok(())
    }

    /// Arguments for `multipass`: the image token precedes `--name`, sizing
    /// flags only appear when set.
    #[must_use]
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = vec!["launch".to_string()];
        if let Some(image) = &self.image {
            args.push(image.clone());
        }
        args.push("--name".to_string());
        args.push(self.name.clone());
        for (flag, value) in [
            ("--cpus", &self.cpus),
            ("--memory", &self.memory),
            ("--disk", &self.disk),
        ] {
            if let Some(v) = value {
                args.push(flag.to_string());
                args.push(v.clone());
            }
        }
        args
    }

    /// Release text used to guess whether the image is already cached.
    /// Without an explicit image multipass launches the current LTS.
    #[must_use]
    pub fn release_hint(&self) -> &str {
        self.image.as_deref().unwrap_or("LTS")
    }
}

/// `instance-<unix millis>`, used when the caller gives no name.
#[must_use]
pub fn default_instance_name(unix_millis: i64) -> String {
    format!("instance-{unix_millis}")
}

// ── Validators ────────────────────────────────────────────────────────────────

/// Non-empty, letters, digits, `-` and `_` only.
///
/// # Errors
///
/// Returns `EmptyName` or `InvalidName`.
pub fn validate_name(name: &str) -> Result<(), LaunchSpecError> {
    if name.trim().is_empty() {
        return Err(LaunchSpecError::EmptyName);
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(LaunchSpecError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Positive integer.
///
/// # Errors
///
/// Returns `InvalidCpus` when `value` is not an integer of at least 1.
pub fn validate_cpus(value: &str) -> Result<(), LaunchSpecError> {
    match value.trim().parse::<u32>() {
        Ok(n) if n >= 1 => Ok(()),
        _ => Err(LaunchSpecError::InvalidCpus(value.to_string())),
    }
}

/// # Errors
///
/// Returns `InvalidSize` or `BelowMinimum` (128M).
pub fn validate_memory(value: &str) -> Result<(), LaunchSpecError> {
    validate_size("memory", value, MIN_MEMORY_BYTES, "128M")
}

/// # Errors
///
/// Returns `InvalidSize` or `BelowMinimum` (512M).
pub fn validate_disk(value: &str) -> Result<(), LaunchSpecError> {
    validate_size("disk", value, MIN_DISK_BYTES, "512M")
}

fn validate_size(
    field: &'static str,
    value: &str,
    min_bytes: f64,
    minimum: &'static str,
) -> Result<(), LaunchSpecError> {
    let bytes = parse_size_bytes(value).ok_or_else(|| LaunchSpecError::InvalidSize {
        field,
        value: value.to_string(),
    })?;
    if bytes < min_bytes {
        return Err(LaunchSpecError::BelowMinimum { field, minimum });
    }
    Ok(())
}

/// Parse `\d+(\.\d+)?[KMG]` into bytes (binary multiples).
#[must_use]
pub fn parse_size_bytes(value: &str) -> Option<f64> {
    let caps = SIZE_RE.captures(value.trim())?;
    let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = match caps.get(2)?.as_str() {
        "G" => GIB,
        "M" => MIB,
        _ => KIB,
    };
    Some(amount * unit)
}

// ── Output classification ─────────────────────────────────────────────────────

/// Phase a launch is in, inferred from its stdout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LaunchPhase {
    Downloading,
    Provisioning,
}

/// Line classification table, evaluated top to bottom. A line matches a row
/// when it contains any of the row's substrings.
pub const LINE_PHASES: &[(LaunchPhase, &[&str])] = &[
    (LaunchPhase::Downloading, &["Retrieving image", "Downloading"]),
    (LaunchPhase::Provisioning, &["Launching", "Starting"]),
];

#[must_use]
pub fn classify_line(line: &str) -> Option<LaunchPhase> {
    LINE_PHASES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| line.contains(n)))
        .map(|(phase, _)| *phase)
}

/// A user-facing progress update derived from one stdout line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchProgress {
    pub message: String,
    pub downloading: bool,
}

/// Turn a stdout line into a progress update, if it carries one.
#[must_use]
pub fn progress_for_line(line: &str) -> Option<LaunchProgress> {
    match classify_line(line)? {
        LaunchPhase::Downloading => {
            let message = PERCENT_RE
                .captures(line)
                .and_then(|c| c.get(1))
                .map_or_else(
                    || "Retrieving image...".to_string(),
                    |pct| format!("Retrieving image: {}%", pct.as_str()),
                );
            Some(LaunchProgress {
                message,
                downloading: true,
            })
        }
        LaunchPhase::Provisioning => Some(LaunchProgress {
            message: "Creating instance...".to_string(),
            downloading: false,
        }),
    }
}
