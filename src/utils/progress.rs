//! Progress indicators for long-running CLI operations
//!
//! Thin wrappers around `indicatif` with selfswap styling. Indicators are
//! hidden when output is not wanted:
//!
//! - `SELFSWAP_NO_PROGRESS`: set to any value to disable all progress indicators
//! - `--no-progress`: the CLI flag, passed in as `enabled = false`
//!
//! A hidden indicator accepts every call and draws nothing, so callers never
//! branch on whether progress is shown.

use indicatif::{ProgressBar as IndicatifBar, ProgressStyle as IndicatifStyle};
use std::time::Duration;

/// Environment variable that disables progress output.
pub const NO_PROGRESS_ENV: &str = "SELFSWAP_NO_PROGRESS";

/// Whether progress indicators are disabled through the environment.
pub fn is_progress_disabled() -> bool {
    std::env::var_os(NO_PROGRESS_ENV).is_some()
}

/// A progress bar or spinner with consistent styling.
#[derive(Clone)]
pub struct ProgressBar {
    inner: IndicatifBar,
}

impl ProgressBar {
    /// A bar from 0 to 100 for percentage-based progress such as downloads.
    pub fn percent(enabled: bool) -> Self {
        let bar = if enabled && !is_progress_disabled() {
            let bar = IndicatifBar::new(100);
            bar.set_style(ProgressStyle::percent());
            bar
        } else {
            IndicatifBar::hidden()
        };
        Self { inner: bar }
    }

    /// A spinner for work of unknown length.
    pub fn spinner(enabled: bool, msg: impl Into<String>) -> Self {
        let bar = if enabled && !is_progress_disabled() {
            let bar = IndicatifBar::new_spinner();
            bar.set_style(ProgressStyle::spinner());
            bar.enable_steady_tick(Duration::from_millis(100));
            bar
        } else {
            IndicatifBar::hidden()
        };
        bar.set_message(msg.into());
        Self { inner: bar }
    }

    /// A bar that never draws.
    pub fn hidden() -> Self {
        Self {
            inner: IndicatifBar::hidden(),
        }
    }

    /// Whether anything is drawn.
    pub fn is_hidden(&self) -> bool {
        self.inner.is_hidden()
    }

    /// Set the text shown beside the bar.
    pub fn set_message(&self, msg: impl Into<String>) {
        self.inner.set_message(msg.into());
    }

    /// Set the absolute position.
    pub fn set_position(&self, pos: u64) {
        self.inner.set_position(pos);
    }

    /// Current position.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Print a line above the bar without tearing it.
    pub fn println(&self, line: impl AsRef<str>) {
        if self.inner.is_hidden() {
            println!("{}", line.as_ref());
        } else {
            self.inner.println(line.as_ref());
        }
    }

    /// Finish, leaving `msg` in place of the bar.
    pub fn finish_with_message(&self, msg: impl Into<String>) {
        self.inner.finish_with_message(msg.into());
    }

    /// Finish and remove the bar from the terminal.
    pub fn finish_and_clear(&self) {
        self.inner.finish_and_clear();
    }
}

/// Styles shared by every indicator.
pub struct ProgressStyle;

impl ProgressStyle {
    /// Percentage bar used for downloads.
    pub fn percent() -> IndicatifStyle {
        IndicatifStyle::default_bar()
            .template("{msg:.bold} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| IndicatifStyle::default_bar())
            .progress_chars("━╸━")
    }

    /// Spinner used while waiting on the network.
    pub fn spinner() -> IndicatifStyle {
        IndicatifStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| IndicatifStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
    }
}
