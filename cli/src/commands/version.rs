//! Version command

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::InstanceInspector;
use crate::output::Renderer;

/// Run the version command. The multipass version is best effort.
///
/// # Errors
///
/// Returns an error only if JSON serialization fails.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let version = env!("CARGO_PKG_VERSION");
    let multipass = multipass_version(app).await;

    match app.renderer() {
        Renderer::Human(r) => r.render_version(version, multipass.as_deref()),
        Renderer::Json(r) => r.render(&serde_json::json!({
            "version": version,
            "multipass": multipass,
        }))?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn multipass_version(app: &AppContext) -> Option<String> {
    match app.provisioner.version().await {
        Ok(out) if out.status.success() => String::from_utf8_lossy(&out.stdout)
            .lines()
            .next()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()),
        Ok(_) => None,
        Err(err) => {
            tracing::debug!(%err, "multipass version unavailable");
            None
        }
    }
}
