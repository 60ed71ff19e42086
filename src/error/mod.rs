//! Error types and handling for `strangelove`.
//!
//! Errors fall into three classes that drive the trial loop:
//!
//! - Expected remote-run failures (`BenchmarkFailed`): the remote benchmark
//!   command aborted. Fatal to the run only with stop-on-error.
//! - User interrupts (`Interrupted`): always stop all remaining work.
//! - Everything else: logged, then surfaced with full context.
//!
//! `thiserror` derives the enum; `anyhow` errors are accepted through
//! `Other`. User-facing rendering lives in [`StructuredError`].

mod structured;

pub use structured::{ErrorCode, StructuredError};

use std::fmt::Write as _;
use thiserror::Error;

/// Primary error type for `strangelove` operations.
#[derive(Error, Debug)]
pub enum RunnerError {
    // === Remote run errors ===
    /// The remote benchmark command ran and signalled a controlled abort.
    #[error("Benchmark '{benchmark}' failed on {host}{}", status_suffix(.status))]
    BenchmarkFailed {
        benchmark: String,
        host: String,
        status: Option<i32>,
    },

    /// The user interrupted the run.
    #[error("Interrupted by user")]
    Interrupted,

    /// A local or remote subprocess could not run or exited non-zero.
    #[error("Command failed: {command}{}", status_suffix(.status))]
    CommandFailed {
        command: String,
        status: Option<i32>,
    },

    /// No running client instance was found in the cluster.
    #[error("No running client instance found for cluster '{tag}'")]
    NoClientInstance { tag: String },

    // === Configuration errors ===
    /// `--exp-type` names an experiment the catalog does not define.
    #[error("Unknown experiment type '{name}'")]
    UnknownExperiment { name: String, known: Vec<String> },

    /// A parameter value does not match its declared type.
    #[error("Invalid parameter {key}: {reason}")]
    InvalidParameter { key: String, reason: String },

    /// Catalog or environment configuration problem.
    #[error("Configuration error: {0}")]
    Config(String),

    // === Result errors ===
    /// The controller output did not contain a usable result.
    #[error("Result parse error: {0}")]
    ResultParse(String),

    // === Tracking service errors ===
    /// The tracking service rejected an upload.
    #[error("Upload to {url} failed: {reason}")]
    Upload { url: String, reason: String },

    /// HTTP transport error talking to the tracking service.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<i32>) -> String {
    let mut suffix = String::new();
    match *status {
        Some(code) => {
            let _ = write!(suffix, " (exit status {code})");
        }
        None => suffix.push_str(" (no exit status)"),
    }
    suffix
}

impl RunnerError {
    /// Is this the controlled abort of a benchmark run?
    #[must_use]
    pub const fn is_expected_failure(&self) -> bool {
        matches!(self, Self::BenchmarkFailed { .. })
    }

    /// Did the user ask us to stop?
    #[must_use]
    pub const fn is_interrupt(&self) -> bool {
        matches!(self, Self::Interrupted)
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NoClientInstance { .. } => Some("Start the cluster first: strangelove --start-cluster ..."),
            Self::BenchmarkFailed { .. } => {
                Some("Check the controller logs on the client host, or pass --no-stop-on-error")
            }
            Self::ResultParse(_) => Some("Re-run with --debug to see the raw controller output"),
            Self::Config(_) => Some("Check the catalog file named by STRANGELOVE_CATALOG"),
            _ => None,
        }
    }

    /// Get the exit code for this error.
    ///
    /// Subprocess failures pass the child's exit status through.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::BenchmarkFailed {
                status: Some(code), ..
            }
            | Self::CommandFailed {
                status: Some(code), ..
            } if *code != 0 => *code,
            Self::Interrupted => 130,
            other => StructuredError::from_error(other).code.exit_code(),
        }
    }

    /// Create an invalid-parameter error for a specific key.
    #[must_use]
    pub fn invalid_parameter(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using `RunnerError`.
pub type Result<T> = std::result::Result<T, RunnerError>;
