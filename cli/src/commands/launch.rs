//! `mprun launch`: create and start a new instance.

use anyhow::Result;
use clap::Args;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::services::session::Request;
use crate::domain::LaunchSpec;
use crate::domain::launch::default_instance_name;

/// Arguments for the launch command.
#[derive(Args)]
pub struct LaunchArgs {
    /// Instance name (default: instance-<timestamp>)
    pub name: Option<String>,

    /// Image to launch, as listed by `mprun find` (default: latest LTS)
    #[arg(long)]
    pub image: Option<String>,

    /// Number of CPUs
    #[arg(long)]
    pub cpus: Option<String>,

    /// Memory size, e.g. 2G or 512M (minimum 128M)
    #[arg(long)]
    pub memory: Option<String>,

    /// Disk size, e.g. 10G (minimum 512M)
    #[arg(long)]
    pub disk: Option<String>,

    /// Configure SSH access as `multipass-<name>` once the instance has an address
    #[arg(long)]
    pub ssh: bool,

    /// Return once the launch command finishes instead of waiting for Running
    #[arg(long)]
    pub no_wait: bool,
}

impl LaunchArgs {
    fn spec(&self) -> LaunchSpec {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| default_instance_name(chrono::Utc::now().timestamp_millis()));
        LaunchSpec {
            image: self.image.clone(),
            cpus: self.cpus.clone(),
            memory: self.memory.clone(),
            disk: self.disk.clone(),
            enable_ssh: self.ssh,
            ..LaunchSpec::named(name)
        }
    }
}

/// Run `mprun launch`.
///
/// # Errors
///
/// Returns an error if the spec is invalid, the name is taken, or the launch fails.
pub async fn run(app: &AppContext, args: &LaunchArgs) -> Result<ExitCode> {
    let spec = spec_checked(args)?;
    let events = super::events(app, Some(&spec.name), &format!("Launching {}", spec.name));
    let session = app.session(&events, !args.no_wait);
    let report = super::into_report(session.handle(Request::LaunchInstance(spec)).await)?;
    super::finish(app, &events, &report)
}

/// Validate up front so bad input fails before any spinner is drawn.
fn spec_checked(args: &LaunchArgs) -> Result<LaunchSpec> {
    let spec = args.spec();
    spec.validate()?;
    Ok(spec)
}
