//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;

use crate::application::PollOutcome;
use crate::application::services::session::OperationReport;
use crate::domain::{AppConfig, FindImagesResult, Instance, InstanceInfo, InstanceLists};
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str, multipass: Option<&str>) {
        println!("mprun {version}");
        if let Some(mp) = multipass {
            println!("{mp}");
        }
    }

    /// Render the instance table. Deleted instances only with `include_deleted`.
    pub fn render_lists(&self, lists: &InstanceLists, include_deleted: bool) {
        if lists.active.is_empty() && (!include_deleted || lists.deleted.is_empty()) {
            if !self.ctx.quiet {
                println!("No instances found. Create one: mprun launch");
            }
            return;
        }

        println!(
            "{}",
            format!("{:<24} {:<18} {:<16} {}", "Name", "State", "IPv4", "Release")
                .style(self.ctx.styles.bold)
        );
        for inst in &lists.active {
            self.render_row(inst);
        }
        if include_deleted && !lists.deleted.is_empty() {
            println!();
            self.ctx.header("Deleted (recover with: mprun recover <name>)");
            for inst in &lists.deleted {
                self.render_row(inst);
            }
        }
    }

    fn render_row(&self, inst: &Instance) {
        let state = format!("{:<18}", inst.state.as_str());
        println!(
            "{:<24} {} {:<16} {}",
            inst.name,
            state.style(self.ctx.styles.state(&inst.state)),
            inst.ipv4.as_deref().unwrap_or("--"),
            inst.release
        );
    }

    /// Render one instance's details.
    pub fn render_info(&self, info: &InstanceInfo) {
        let state = info.state.as_str();
        self.ctx.kv("Name:          ", &info.name);
        self.ctx.kv(
            "State:         ",
            &state.style(self.ctx.styles.state(&info.state)).to_string(),
        );
        self.ctx.kv("Snapshots:     ", &info.snapshot_count.to_string());
        self.ctx
            .kv("IPv4:          ", info.ipv4.as_deref().unwrap_or("--"));
        self.ctx.kv("Release:       ", &info.release);
        self.ctx.kv("Zone:          ", &info.zone);
        self.ctx.kv("CPU(s):        ", &info.cpu_count);
        self.ctx.kv("Load:          ", &info.load_display());
        self.ctx.kv("Disk usage:    ", &info.disk_display());
        self.ctx.kv("Memory usage:  ", &info.memory_display());
        self.ctx.kv("Mounts:        ", &info.mounts_display());
    }

    /// Render the image catalog, LTS first.
    pub fn render_images(&self, result: &FindImagesResult) {
        println!(
            "{}",
            format!("{:<20} {:<24} {}", "Image", "Aliases", "Release").style(self.ctx.styles.bold)
        );
        for image in result.sorted_images() {
            println!(
                "{:<20} {:<24} {} {}",
                image.name,
                image.aliases.join(","),
                image.os,
                image.release
            );
        }
        if !result.blueprints.is_empty() {
            println!();
            self.ctx.header("Blueprints");
            for name in result.blueprints.keys() {
                println!("  {name}");
            }
        }
    }

    /// Render the outcome of a mutating operation.
    pub fn render_report(&self, report: &OperationReport) {
        let target = report.name.as_deref().unwrap_or("deleted instances");
        if !report.success {
            return;
        }
        match &report.poll {
            None => self
                .ctx
                .success(&format!("{} {target}: requested", capitalize(report.operation))),
            Some(PollOutcome::Converged { instance, .. }) => {
                let state = instance
                    .as_ref()
                    .map_or("removed", |i| i.state.as_str());
                self.ctx.success(&format!("{target}: {state}"));
            }
            Some(PollOutcome::TimedOut { last, .. }) => {
                let state = last.as_ref().map_or("unknown", |i| i.state.as_str());
                self.ctx
                    .info(&format!("{target}: still {state}, check again with: mprun list"));
            }
            Some(PollOutcome::Superseded { .. }) => {}
        }
        if report.operation == "launch" && report.was_downloading {
            self.ctx.info("Image downloaded and cached for future launches");
        }
        if report.ssh_configured == Some(true)
            && let Some(name) = &report.name
        {
            self.ctx.info(&format!("Connect: ssh multipass-{name}"));
        }
    }

    /// Render the effective configuration.
    pub fn render_config(&self, config: &AppConfig, path: &std::path::Path) {
        println!();
        println!(
            "  {}",
            format!("Configuration ({})", path.display()).style(self.ctx.styles.header)
        );
        println!();
        println!(
            "  {:<32} {}",
            "multipass.paths:",
            config.multipass.paths.join(", ")
        );
        println!(
            "  {:<32} {}",
            "multipass.command_timeout_secs:",
            config
                .multipass
                .command_timeout_secs
                .map_or_else(|| "none".to_string(), |s| s.to_string())
        );
        println!("  {:<32} {}", "poll.interval_ms:", config.poll.interval_ms);
        println!("  {:<32} {}", "poll.max_attempts:", config.poll.max_attempts);
        println!(
            "  {:<32} {}",
            "poll.max_attempts_with_ip:", config.poll.max_attempts_with_ip
        );
        println!(
            "  {:<32} {}",
            "ssh.dir:",
            config.ssh.dir.as_deref().unwrap_or("~/.ssh")
        );
        println!("  {:<32} {}", "ssh.user:", config.ssh.user);
        println!(
            "  {:<32} {}",
            "ssh.connect_timeout_secs:", config.ssh.connect_timeout_secs
        );
        println!();
        println!("  {}", "Environment:".style(self.ctx.styles.bold));
        println!(
            "    {:<18} {}",
            "MPRUN_CONFIG:",
            std::env::var("MPRUN_CONFIG").unwrap_or_else(|_| "(not set)".to_string())
        );
        println!(
            "    {:<18} {}",
            "RUST_LOG:",
            std::env::var("RUST_LOG").unwrap_or_else(|_| "(not set)".to_string())
        );
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
