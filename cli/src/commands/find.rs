//! `mprun find`: list launchable images.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::session::{Request, Response};
use crate::output::Renderer;

/// Run `mprun find`.
///
/// # Errors
///
/// Returns an error if the image catalog cannot be fetched.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let events = super::events(app, None, "Fetching image catalog");
    let session = app.session(&events, false);
    let Response::Images(images) = session.handle(Request::FindImages).await else {
        anyhow::bail!("unexpected response to find request");
    };
    events.clear();

    let images = images.ok_or_else(|| anyhow::anyhow!("Failed to fetch the image catalog"))?;
    match app.renderer() {
        Renderer::Human(r) => r.render_images(&images),
        Renderer::Json(r) => r.render(&images)?,
    }
    Ok(ExitCode::SUCCESS)
}
