//! Read-side queries: list, info and image catalog.
//!
//! None of these return `Err` to the caller for daemon trouble; failures are
//! folded into the result so the UI can show an actionable message.

use crate::application::ports::InstanceInspector;
use crate::domain::image::parse_find;
use crate::domain::info::parse_info;
use crate::domain::instance::parse_list;
use crate::domain::{FindImagesResult, InstanceInfo, InstanceLists, MultipassError};

/// List active and deleted instances. Never fails: on error the lists are
/// empty and `error` carries the classification.
pub async fn list_instances(mp: &impl InstanceInspector) -> InstanceLists {
    let output = match mp.list().await {
        Ok(output) => output,
        Err(err) => {
            let err = MultipassError::from(err);
            tracing::warn!(kind = ?err.kind, "list failed: {}", err.message);
            return InstanceLists::failed(err);
        }
    };

    if !output.status.success() {
        let err = MultipassError::from_exit(
            &String::from_utf8_lossy(&output.stderr),
            &String::from_utf8_lossy(&output.stdout),
            "Failed to execute multipass command",
        );
        tracing::warn!(kind = ?err.kind, "list failed: {}", err.message);
        return InstanceLists::failed(err);
    }

    parse_list(&output.stdout).unwrap_or_else(|err| {
        tracing::warn!("list output unreadable: {}", err.message);
        InstanceLists::failed(err)
    })
}

/// Detailed record for one instance.
///
/// # Errors
///
/// Returns the classified failure, or `Other` when the instance is unknown.
pub async fn get_instance_info(
    mp: &impl InstanceInspector,
    name: &str,
) -> Result<InstanceInfo, MultipassError> {
    let output = mp.info(name).await?;
    if !output.status.success() {
        return Err(MultipassError::from_exit(
            &String::from_utf8_lossy(&output.stderr),
            &String::from_utf8_lossy(&output.stdout),
            "Failed to get instance info",
        ));
    }
    parse_info(name, &output.stdout)?
        .ok_or_else(|| MultipassError::other(format!("instance \"{name}\" does not exist")))
}

/// Image catalog, or `None` on any failure.
pub async fn find_images(mp: &impl InstanceInspector) -> Option<FindImagesResult> {
    let output = match mp.find().await {
        Ok(output) if output.status.success() => output,
        Ok(output) => {
            tracing::warn!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim(),
                "find failed"
            );
            return None;
        }
        Err(err) => {
            tracing::warn!("find failed: {err}");
            return None;
        }
    };
    parse_find(&output.stdout)
        .inspect_err(|err| tracing::warn!("find output unreadable: {}", err.message))
        .ok()
}
