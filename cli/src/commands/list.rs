//! `mprun list [--all]`: show instances.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::session::{Request, Response};
use crate::output::Renderer;

/// Arguments for the list command.
#[derive(Args)]
pub struct ListArgs {
    /// Include deleted instances
    #[arg(long)]
    pub all: bool,
}

/// Run `mprun list`.
///
/// # Errors
///
/// Returns an error if multipass is unavailable.
pub async fn run(app: &AppContext, args: &ListArgs) -> Result<ExitCode> {
    let events = super::events(app, None, "Listing instances");
    let session = app.session(&events, false);
    let Response::Snapshot(mut lists) = session.handle(Request::RefreshList).await else {
        anyhow::bail!("unexpected response to list request");
    };
    events.clear();

    if let Some(err) = lists.error.take() {
        return Err(err.into());
    }
    if !args.all {
        lists.deleted.clear();
    }

    match app.renderer() {
        Renderer::Human(r) => r.render_lists(&lists, args.all),
        Renderer::Json(r) => r.render(&lists)?,
    }
    Ok(ExitCode::SUCCESS)
}
