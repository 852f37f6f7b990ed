//! `mprun start|stop|suspend|recover|delete|purge`: state transitions.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::session::Request;

/// Arguments shared by the single-instance transitions.
#[derive(Args)]
pub struct TransitionArgs {
    /// Instance name
    pub name: String,

    /// Return once multipass accepts the request instead of waiting for the new state
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for the delete command.
#[derive(Args)]
pub struct DeleteArgs {
    /// Instance name
    pub name: String,

    /// Remove permanently instead of moving to the recoverable deleted list
    #[arg(long)]
    pub purge: bool,

    /// Return once multipass accepts the request instead of waiting for the new state
    #[arg(long)]
    pub no_wait: bool,
}

/// Arguments for the purge command.
#[derive(Args)]
pub struct PurgeArgs {
    /// Purge a single deleted instance; all deleted instances when omitted
    pub name: Option<String>,
}

/// Which transition a command requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Start,
    Stop,
    Suspend,
    Recover,
}

impl Verb {
    fn request(self, name: String) -> Request {
        match self {
            Self::Start => Request::StartInstance { name },
            Self::Stop => Request::StopInstance { name },
            Self::Suspend => Request::SuspendInstance { name },
            Self::Recover => Request::RecoverInstance { name },
        }
    }

    fn progress(self) -> &'static str {
        match self {
            Self::Start => "Starting",
            Self::Stop => "Stopping",
            Self::Suspend => "Suspending",
            Self::Recover => "Recovering",
        }
    }
}

/// Run `mprun start|stop|suspend|recover <name>`.
///
/// # Errors
///
/// Returns an error if multipass rejects the transition.
pub async fn run(app: &AppContext, verb: Verb, args: &TransitionArgs) -> Result<ExitCode> {
    let message = format!("{} {}", verb.progress(), args.name);
    send(app, &args.name, &message, verb.request(args.name.clone()), !args.no_wait).await
}

/// Run `mprun delete <name> [--purge]`.
///
/// # Errors
///
/// Returns an error if multipass rejects the deletion or the prompt fails.
pub async fn delete(app: &AppContext, args: &DeleteArgs) -> Result<ExitCode> {
    if args.purge
        && !confirmed(
            app,
            &format!("Permanently delete '{}'? This cannot be undone.", args.name),
        )?
    {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }
    let request = Request::DeleteInstance {
        name: args.name.clone(),
        purge: args.purge,
    };
    let message = format!("Deleting {}", args.name);
    send(app, &args.name, &message, request, !args.no_wait).await
}

/// Run `mprun purge [<name>]`.
///
/// # Errors
///
/// Returns an error if multipass rejects the purge or the prompt fails.
pub async fn purge(app: &AppContext, args: &PurgeArgs) -> Result<ExitCode> {
    let prompt = match &args.name {
        Some(name) => format!("Permanently remove '{name}'? This cannot be undone."),
        None => "Permanently remove all deleted instances? This cannot be undone.".to_string(),
    };
    if !confirmed(app, &prompt)? {
        app.output.info("Cancelled.");
        return Ok(ExitCode::SUCCESS);
    }

    match &args.name {
        Some(name) => {
            let request = Request::PurgeInstance { name: name.clone() };
            send(app, name, &format!("Purging {name}"), request, true).await
        }
        None => {
            let events = super::events(app, None, "Purging deleted instances");
            let session = app.session(&events, true);
            let report = super::into_report(session.handle(Request::PurgeAll).await)?;
            super::finish(app, &events, &report)
        }
    }
}

async fn send(
    app: &AppContext,
    name: &str,
    message: &str,
    request: Request,
    wait: bool,
) -> Result<ExitCode> {
    let events = super::events(app, Some(name), message);
    let session = app.session(&events, wait);
    let report = super::into_report(session.handle(request).await)?;
    super::finish(app, &events, &report)
}

/// JSON mode never prompts; it behaves like `--yes`.
fn confirmed(app: &AppContext, prompt: &str) -> Result<bool> {
    if app.is_json() || app.non_interactive {
        return Ok(true);
    }
    app.confirm(prompt, false)
}
