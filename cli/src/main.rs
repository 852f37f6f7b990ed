//! mprun - drive Multipass instances from the terminal

#![cfg_attr(test, allow(clippy::expect_used))]

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use multipass_run::cli::Cli;
use multipass_run::domain::{ErrorKind, MultipassError, SshError};
use multipass_run::output::json::format_error;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let json = cli.json;

    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            report_error(&e, json);
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "multipass_run=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(e: &anyhow::Error, json: bool) {
    let kind = error_kind(e);
    if json {
        let code = kind.map_or("error", ErrorKind::code);
        match format_error(&format!("{e:#}"), code) {
            Ok(out) => println!("{out}"),
            Err(_) => eprintln!("Error: {e:#}"),
        }
        return;
    }

    eprintln!("Error: {e:#}");
    match kind {
        Some(ErrorKind::NotInstalled) => {
            eprintln!();
            eprintln!("Install Multipass: https://multipass.run/install");
            eprintln!("Or point mprun at it: mprun config set multipass.paths /path/to/multipass");
        }
        Some(ErrorKind::DaemonNotRunning) => {
            eprintln!();
            eprintln!("Start the daemon, e.g.: sudo snap start multipass");
        }
        _ => {}
    }
}

fn error_kind(e: &anyhow::Error) -> Option<ErrorKind> {
    e.chain().find_map(|cause| {
        cause
            .downcast_ref::<MultipassError>()
            .map(|err| err.kind)
            .or_else(|| match cause.downcast_ref::<SshError>() {
                Some(SshError::Multipass(err)) => Some(err.kind),
                _ => None,
            })
    })
}
