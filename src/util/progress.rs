//! Spinner for remote benchmark attempts.
//!
//! Drawn only when stderr is an interactive terminal, so piped output and
//! log files stay clean.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};
use std::time::Duration;

const SPINNER_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] {msg}";

/// Check if we should show progress indicators.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

/// Spinner covering one in-flight attempt. Cleared when dropped.
pub struct AttemptSpinner {
    bar: ProgressBar,
}

impl AttemptSpinner {
    #[must_use]
    pub fn start(message: &str) -> Self {
        Self::with_visibility(message, should_show_progress())
    }

    fn with_visibility(message: &str, show: bool) -> Self {
        let bar = ProgressBar::new_spinner();
        if show {
            let style = ProgressStyle::default_spinner()
                .template(SPINNER_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_spinner());
            bar.set_style(style);
            bar.set_message(message.to_string());
            bar.enable_steady_tick(Duration::from_millis(100));
        } else {
            bar.set_draw_target(ProgressDrawTarget::hidden());
        }
        Self { bar }
    }
}

impl Drop for AttemptSpinner {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}
