//! Logging setup built on `tracing-subscriber`.
//!
//! Level selection (first match wins):
//! 1. `RUST_LOG`
//! 2. `--quiet` → `warn`
//! 3. `-vv` → `trace`, `-v` / `--debug` → `debug`
//! 4. `info`

use chrono::Local;
use std::fmt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Mutex, Once};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

/// Timestamp layout used by every log line.
const TIMESTAMP_FORMAT: &str = "%m-%d-%Y %H:%M:%S";

static TEST_INIT: Once = Once::new();

/// Local wall-clock timer for log lines.
#[derive(Debug, Clone, Copy, Default)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> fmt::Result {
        write!(w, "{}", Local::now().format(TIMESTAMP_FORMAT))
    }
}

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "warn";
    }
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber.
///
/// Logs go to stderr, or to `log_file` (appended) when one is given.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_logging(
    verbose: u8,
    quiet: bool,
    log_file: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(LocalTimer)
        .with_target(verbose > 1);

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .try_init()?;
    } else {
        builder.with_writer(std::io::stderr).try_init()?;
    }

    Ok(())
}

/// Install a test-writer subscriber once per process.
pub fn init_test_logging() {
    TEST_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("debug"))
            .with_timer(LocalTimer)
            .with_test_writer()
            .try_init();
    });
}
