//! `TerminalEvents`: Presentation-layer implementation of `EventSink`.
//!
//! Drives one spinner while a request is in flight: optimistic states and
//! launch progress replace its message, snapshots show the daemon-reported
//! state of the watched instance, warnings print above it.

use indicatif::ProgressBar;

use crate::application::ports::{EventSink, SessionEvent};
use crate::output::{OutputContext, progress};

pub struct TerminalEvents<'a> {
    ctx: &'a OutputContext,
    /// Instance whose state the spinner tracks.
    name: Option<String>,
    spinner: Option<ProgressBar>,
    /// JSON mode: nothing may reach stdout except the final document.
    silent: bool,
}

impl<'a> TerminalEvents<'a> {
    /// Start tracking `name`. No spinner is drawn when progress is hidden
    /// (quiet or not a TTY).
    #[must_use]
    pub fn new(ctx: &'a OutputContext, name: Option<&str>, message: &str) -> Self {
        let spinner = ctx.show_progress().then(|| progress::spinner(message));
        Self {
            ctx,
            name: name.map(String::from),
            spinner,
            silent: false,
        }
    }

    /// A sink that drops every event.
    #[must_use]
    pub fn silent(ctx: &'a OutputContext) -> Self {
        Self {
            ctx,
            name: None,
            spinner: None,
            silent: true,
        }
    }

    /// Stop the spinner with a success mark.
    pub fn finish_ok(&self, message: &str) {
        if let Some(pb) = &self.spinner {
            progress::finish_ok(pb, message);
        }
    }

    /// Stop the spinner with a failure mark.
    pub fn finish_error(&self, message: &str) {
        if let Some(pb) = &self.spinner {
            progress::finish_error(pb, message);
        }
    }

    /// Remove the spinner without leaving a line behind.
    pub fn clear(&self) {
        if let Some(pb) = &self.spinner {
            pb.finish_and_clear();
        }
    }

    fn set_message(&self, message: String) {
        if let Some(pb) = &self.spinner {
            pb.set_message(message);
        }
    }
}

impl EventSink for TerminalEvents<'_> {
    fn emit(&self, event: SessionEvent) {
        if self.silent {
            return;
        }
        match event {
            SessionEvent::Optimistic(inst) => {
                self.set_message(format!("{}: {}...", inst.name, inst.state));
            }
            SessionEvent::LaunchProgress { message, .. } => self.set_message(message),
            SessionEvent::Snapshot(lists) => {
                if let Some(name) = &self.name {
                    let state = lists
                        .find(name)
                        .map_or_else(|| "gone".to_string(), |i| i.state.to_string());
                    self.set_message(format!("Waiting for {name} ({state})"));
                }
            }
            SessionEvent::PollFinished { .. } => {}
            SessionEvent::Warning { message } => match &self.spinner {
                Some(pb) => pb.suspend(|| self.ctx.warn(&message)),
                None => self.ctx.warn(&message),
            },
        }
    }
}
