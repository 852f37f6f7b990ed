//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process::ExitCode;

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::commands::lifecycle::Verb;

/// Launch and manage Multipass instances
#[derive(Parser)]
#[command(
    name = "mprun",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log debug details to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List instances
    List(commands::list::ListArgs),

    /// Show instance details
    Info {
        /// Instance name
        name: String,
    },

    /// List available images
    Find,

    /// Create and start a new instance
    Launch(commands::launch::LaunchArgs),

    /// Start a stopped or suspended instance
    Start(commands::lifecycle::TransitionArgs),

    /// Stop a running instance
    Stop(commands::lifecycle::TransitionArgs),

    /// Suspend a running instance
    Suspend(commands::lifecycle::TransitionArgs),

    /// Recover a deleted instance
    Recover(commands::lifecycle::TransitionArgs),

    /// Delete an instance (recoverable unless --purge)
    Delete(commands::lifecycle::DeleteArgs),

    /// Permanently remove deleted instances
    Purge(commands::lifecycle::PurgeArgs),

    /// Manage SSH access
    #[command(subcommand)]
    Ssh(commands::ssh::SshCommand),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            json,
            quiet,
            no_color,
            yes,
            command,
            ..
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes },
        })?;

        match command {
            Command::List(args) => commands::list::run(&app, &args).await,
            Command::Info { name } => commands::info::run(&app, &name).await,
            Command::Find => commands::find::run(&app).await,
            Command::Launch(args) => commands::launch::run(&app, &args).await,
            Command::Start(args) => commands::lifecycle::run(&app, Verb::Start, &args).await,
            Command::Stop(args) => commands::lifecycle::run(&app, Verb::Stop, &args).await,
            Command::Suspend(args) => commands::lifecycle::run(&app, Verb::Suspend, &args).await,
            Command::Recover(args) => commands::lifecycle::run(&app, Verb::Recover, &args).await,
            Command::Delete(args) => commands::lifecycle::delete(&app, &args).await,
            Command::Purge(args) => commands::lifecycle::purge(&app, &args).await,
            Command::Ssh(cmd) => commands::ssh::run(&app, cmd).await,
            Command::Config(cmd) => commands::config::run(&app, cmd),
            Command::Version => commands::version::run(&app).await,
        }
    }
}
