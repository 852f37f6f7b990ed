//! Command implementations

pub mod config;
pub mod find;
pub mod info;
pub mod launch;
pub mod lifecycle;
pub mod list;
pub mod ssh;
pub mod version;

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::session::{OperationReport, Response};
use crate::output::{Renderer, TerminalEvents};

/// Event sink for one command: a spinner in human mode, silence in JSON mode.
pub(crate) fn events<'a>(
    app: &'a AppContext,
    name: Option<&str>,
    message: &str,
) -> TerminalEvents<'a> {
    if app.is_json() {
        TerminalEvents::silent(&app.output)
    } else {
        TerminalEvents::new(&app.output, name, message)
    }
}

/// Unwrap the report of a mutating request.
pub(crate) fn into_report(response: Response) -> Result<OperationReport> {
    match response {
        Response::Completed(report) => Ok(report),
        other => anyhow::bail!("unexpected response: {other:?}"),
    }
}

/// Render a finished operation. A failed report becomes the command's error.
pub(crate) fn finish(
    app: &AppContext,
    events: &TerminalEvents<'_>,
    report: &OperationReport,
) -> Result<ExitCode> {
    if !report.success {
        let error = report
            .error
            .clone()
            .unwrap_or_else(|| crate::domain::MultipassError::other("operation failed"));
        events.finish_error(&error.message);
        return Err(error.into());
    }
    events.clear();
    match app.renderer() {
        Renderer::Human(r) => r.render_report(report),
        Renderer::Json(r) => r.render(report)?,
    }
    Ok(ExitCode::SUCCESS)
}
