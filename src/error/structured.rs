//! Structured error output.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for the operator
//! - Retryability flags
//! - Context for debugging

use crate::error::RunnerError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
/// Format: `SCREAMING_SNAKE_CASE` for easy parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Cluster/remote errors (exit code 2) ===
    /// Remote benchmark run aborted
    BenchmarkFailed,
    /// Subprocess failed or could not be spawned
    CommandFailed,
    /// No running client instance
    NoClientInstance,
    /// Run interrupted by the user
    Interrupted,

    // === Result errors (exit code 3) ===
    /// Controller output had no usable result
    ResultParseError,

    // === Validation errors (exit code 4) ===
    /// Parameter value has the wrong type
    InvalidParameter,
    /// Experiment type not in the catalog
    UnknownExperiment,

    // === Tracking service errors (exit code 5) ===
    /// Upload rejected or transport failed
    UploadFailed,

    // === Config errors (exit code 7) ===
    /// Configuration error
    ConfigError,

    // === I/O errors (exit code 8) ===
    /// File I/O error
    IoError,
    /// JSON serialization error
    JsonError,
    /// YAML parsing error
    YamlError,

    // === Internal errors (exit code 1) ===
    /// Unexpected internal error
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::BenchmarkFailed => "BENCHMARK_FAILED",
            Self::CommandFailed => "COMMAND_FAILED",
            Self::NoClientInstance => "NO_CLIENT_INSTANCE",
            Self::Interrupted => "INTERRUPTED",
            Self::ResultParseError => "RESULT_PARSE_ERROR",
            Self::InvalidParameter => "INVALID_PARAMETER",
            Self::UnknownExperiment => "UNKNOWN_EXPERIMENT",
            Self::UploadFailed => "UPLOAD_FAILED",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether re-running the same command might succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::BenchmarkFailed | Self::CommandFailed | Self::NoClientInstance | Self::UploadFailed
        )
    }

    /// Get the exit code for this error category.
    ///
    /// Exit codes are grouped by error category:
    /// - 1: Internal/unknown errors
    /// - 2: Cluster/remote errors
    /// - 3: Result errors
    /// - 4: Validation errors
    /// - 5: Tracking service errors
    /// - 7: Config errors
    /// - 8: I/O errors
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::BenchmarkFailed
            | Self::CommandFailed
            | Self::NoClientInstance
            | Self::Interrupted => 2,
            Self::ResultParseError => 3,
            Self::InvalidParameter | Self::UnknownExperiment => 4,
            Self::UploadFailed => 5,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `RunnerError`.
    #[must_use]
    pub fn from_error(err: &RunnerError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = Self::generate_hint(err);

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable(),
            context,
        }
    }

    /// Convert to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({ "error": self })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    fn extract_code_and_context(err: &RunnerError) -> (ErrorCode, Option<Value>) {
        match err {
            RunnerError::BenchmarkFailed {
                benchmark,
                host,
                status,
            } => (
                ErrorCode::BenchmarkFailed,
                Some(json!({"benchmark": benchmark, "host": host, "status": status})),
            ),
            RunnerError::Interrupted => (ErrorCode::Interrupted, None),
            RunnerError::CommandFailed { command, status } => (
                ErrorCode::CommandFailed,
                Some(json!({"command": command, "status": status})),
            ),
            RunnerError::NoClientInstance { tag } => {
                (ErrorCode::NoClientInstance, Some(json!({"cluster_tag": tag})))
            }
            RunnerError::UnknownExperiment { name, known } => (
                ErrorCode::UnknownExperiment,
                Some(json!({"provided": name, "valid_values": known})),
            ),
            RunnerError::InvalidParameter { key, reason } => (
                ErrorCode::InvalidParameter,
                Some(json!({"key": key, "reason": reason})),
            ),
            RunnerError::Config(_) => (ErrorCode::ConfigError, None),
            RunnerError::ResultParse(_) => (ErrorCode::ResultParseError, None),
            RunnerError::Upload { url, .. } => (ErrorCode::UploadFailed, Some(json!({"url": url}))),
            RunnerError::Http(_) => (ErrorCode::UploadFailed, None),
            RunnerError::Io(_) => (ErrorCode::IoError, None),
            RunnerError::Json(_) => (ErrorCode::JsonError, None),
            RunnerError::Yaml(_) => (ErrorCode::YamlError, None),
            RunnerError::Other(_) => (ErrorCode::InternalError, None),
        }
    }

    fn generate_hint(err: &RunnerError) -> Option<String> {
        if let Some(suggestion) = err.suggestion() {
            return Some(suggestion.to_string());
        }

        match err {
            RunnerError::UnknownExperiment { known, .. } => {
                Some(format!("Valid experiment types: {}", known.join(", ")))
            }
            RunnerError::InvalidParameter { key, .. } => {
                Some(format!("Run with --help to see the type of --{key}"))
            }
            _ => None,
        }
    }
}
