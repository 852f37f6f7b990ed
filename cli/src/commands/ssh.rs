//! `mprun ssh setup|remove|connect`: manage `multipass-<name>` SSH access.

use anyhow::Result;
use clap::Subcommand;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::domain::ssh::host_alias;
use crate::output::TerminalEvents;

/// SSH subcommands.
#[derive(Subcommand)]
pub enum SshCommand {
    /// Install a key in a running instance and add a host entry to ~/.ssh/config
    Setup {
        /// Instance name
        name: String,
    },
    /// Remove the instance's host entry from ~/.ssh/config
    Remove {
        /// Instance name
        name: String,
    },
    /// Open an interactive SSH session
    Connect {
        /// Instance name
        name: String,
    },
}

/// Run the ssh command.
///
/// # Errors
///
/// Returns an error if provisioning fails or no entry exists to connect with.
pub async fn run(app: &AppContext, cmd: SshCommand) -> Result<ExitCode> {
    match cmd {
        SshCommand::Setup { name } => setup(app, &name).await,
        SshCommand::Remove { name } => remove(app, &name).await,
        SshCommand::Connect { name } => connect(app, &name).await,
    }
}

async fn setup(app: &AppContext, name: &str) -> Result<ExitCode> {
    let events = super::events(app, Some(name), &format!("Configuring SSH for {name}"));
    let session = app.session(&events, false);
    let result = session.setup_ssh(name).await;

    let connected = match result {
        Ok(connected) => connected,
        Err(err) => {
            events.finish_error(&err.to_string());
            return Err(err.into());
        }
    };
    events.clear();

    if app.is_json() {
        let value = serde_json::json!({
            "name": name,
            "host": host_alias(name),
            "configured": true,
            "connected": connected,
        });
        crate::output::JsonRenderer.render(&value)?;
        return Ok(ExitCode::SUCCESS);
    }

    app.output.success(&format!("SSH configured for {name}"));
    if !connected {
        app.output
            .warn("Test connection failed; it may work after a short delay");
    }
    app.output.info(&format!("Connect: ssh {}", host_alias(name)));
    Ok(ExitCode::SUCCESS)
}

async fn remove(app: &AppContext, name: &str) -> Result<ExitCode> {
    let events = TerminalEvents::silent(&app.output);
    let session = app.session(&events, false);
    let removed = session.ssh().remove(name).await?;

    if app.is_json() {
        let value = serde_json::json!({ "name": name, "removed": removed });
        crate::output::JsonRenderer.render(&value)?;
    } else if removed {
        app.output.success(&format!("SSH config removed for {name}"));
    } else {
        app.output.info(&format!("No SSH config found for {name}"));
    }
    Ok(ExitCode::SUCCESS)
}

async fn connect(app: &AppContext, name: &str) -> Result<ExitCode> {
    let events = TerminalEvents::silent(&app.output);
    let session = app.session(&events, false);
    let status = session.ssh().connect(name).await?;
    Ok(status
        .code()
        .and_then(|c| u8::try_from(c).ok())
        .map_or(ExitCode::FAILURE, ExitCode::from))
}
