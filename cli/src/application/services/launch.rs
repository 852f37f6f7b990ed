//! Launch with streamed progress.

use serde::Serialize;

use crate::application::ports::InstanceLifecycle;
use crate::domain::launch::progress_for_line;
use crate::domain::{LaunchProgress, LaunchSpec, MultipassError};

/// Result of a launch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<MultipassError>,
    /// Sticky: set once any line showed image retrieval.
    pub was_downloading: bool,
}

impl LaunchOutcome {
    #[must_use]
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Launch `spec`. With `on_progress`, stdout is monitored and each
/// recognised line is reported; without it the call blocks until multipass
/// exits and `was_downloading` stays `false`.
///
/// The spec is assumed validated.
pub async fn launch_instance(
    mp: &impl InstanceLifecycle,
    spec: &LaunchSpec,
    on_progress: Option<&mut dyn FnMut(&LaunchProgress)>,
) -> LaunchOutcome {
    let mut was_downloading = false;

    let result = match on_progress {
        Some(report) => {
            let mut on_line = |line: &str| {
                tracing::debug!(line, "launch output");
                if let Some(progress) = progress_for_line(line) {
                    was_downloading |= progress.downloading;
                    report(&progress);
                }
            };
            mp.launch(spec, Some(&mut on_line)).await
        }
        None => mp.launch(spec, None).await,
    };

    let error = match result {
        Ok(output) if output.status.success() => None,
        Ok(output) => Some(MultipassError::from_exit(
            &String::from_utf8_lossy(&output.stderr),
            &String::from_utf8_lossy(&output.stdout),
            "Failed to launch instance",
        )),
        Err(err) => Some(MultipassError::from(err)),
    };

    match &error {
        None => tracing::info!(name = %spec.name, was_downloading, "launch finished"),
        Some(err) => tracing::warn!(name = %spec.name, kind = ?err.kind, "launch failed: {}", err.message),
    }

    LaunchOutcome {
        error,
        was_downloading,
    }
}
