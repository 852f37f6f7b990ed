//! `mprun info <name>`: show one instance in detail.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::session::{Request, Response};
use crate::output::Renderer;

/// Run `mprun info`.
///
/// # Errors
///
/// Returns an error if the instance does not exist or multipass fails.
pub async fn run(app: &AppContext, name: &str) -> Result<ExitCode> {
    let events = super::events(app, None, "Reading instance details");
    let session = app.session(&events, false);
    let Response::Info(result) = session
        .handle(Request::GetInstanceInfo {
            name: name.to_string(),
        })
        .await
    else {
        anyhow::bail!("unexpected response to info request");
    };
    events.clear();

    let info = result?;
    match app.renderer() {
        Renderer::Human(r) => r.render_info(&info),
        Renderer::Json(r) => r.render(&info)?,
    }
    Ok(ExitCode::SUCCESS)
}
