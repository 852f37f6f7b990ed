//! Output styles using owo-colors stylesheet pattern

use owo_colors::Style;

use crate::domain::InstanceState;

/// Centralized stylesheet for CLI output colors.
#[derive(Default, Clone)]
pub struct Styles {
    /// Success messages (green)
    pub success: Style,
    /// Warning messages (yellow)
    pub warning: Style,
    /// Error messages (red)
    pub error: Style,
    /// Info messages (blue)
    pub info: Style,
    /// Dimmed/secondary text
    pub dim: Style,
    /// Bold text
    pub bold: Style,
    /// Headers/section titles
    pub header: Style,
    /// States that are settling (starting, stopping, ...)
    pub transient: Style,
}

impl Styles {
    /// Apply colors to the stylesheet.
    pub fn colorize(&mut self) {
        self.success = Style::new().green();
        self.warning = Style::new().yellow();
        self.error = Style::new().red();
        self.info = Style::new().blue();
        self.dim = Style::new().dimmed();
        self.bold = Style::new().bold();
        self.header = Style::new().bold().cyan();
        self.transient = Style::new().cyan();
    }

    /// Style for an instance state column.
    #[must_use]
    pub fn state(&self, state: &InstanceState) -> Style {
        use InstanceState as S;
        match state {
            S::Running => self.success,
            S::Stopped | S::Unknown => self.dim,
            S::Suspended => self.warning,
            S::Deleted => self.error,
            S::Starting
            | S::Stopping
            | S::Suspending
            | S::Recovering
            | S::Creating
            | S::DownloadingImage => self.transient,
            S::Other(_) => Style::new(),
        }
    }
}
