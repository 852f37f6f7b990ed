//! Single state-transition commands.
//!
//! Each verb issues exactly one subcommand and reports `Ok(())` or the
//! classified failure. Whether the transition is legal from the current
//! state is the caller's concern.

use std::process::Output;

use crate::application::ports::InstanceLifecycle;
use crate::domain::{InvokeError, MultipassError, Transition};

/// Run `transition` against `name`. `purge` only matters for `Delete`;
/// `Purge` of a named instance is a purging delete.
///
/// # Errors
///
/// Returns the classified failure; the instance state is left as it was.
pub async fn apply(
    mp: &impl InstanceLifecycle,
    transition: Transition,
    name: &str,
    purge: bool,
) -> Result<(), MultipassError> {
    tracing::info!(name, verb = transition.verb(), purge, "issuing lifecycle command");
    let result = match transition {
        Transition::Start => mp.start(name).await,
        Transition::Stop => mp.stop(name).await,
        Transition::Suspend => mp.suspend(name).await,
        Transition::Recover => mp.recover(name).await,
        Transition::Delete => mp.delete(name, purge).await,
        Transition::Purge => mp.delete(name, true).await,
    };
    check(result, transition.verb())
}

/// Permanently remove every deleted instance.
///
/// # Errors
///
/// Returns the classified failure.
pub async fn purge_all(mp: &impl InstanceLifecycle) -> Result<(), MultipassError> {
    tracing::info!("purging all deleted instances");
    check(mp.purge().await, "purge")
}

fn check(result: Result<Output, InvokeError>, verb: &str) -> Result<(), MultipassError> {
    let output = result?;
    if output.status.success() {
        return Ok(());
    }
    let err = MultipassError::from_exit(
        &String::from_utf8_lossy(&output.stderr),
        &String::from_utf8_lossy(&output.stdout),
        &format!("Failed to {verb} instance"),
    );
    tracing::warn!(verb, kind = ?err.kind, "{}", err.message);
    Err(err)
}
