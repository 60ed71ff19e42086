//! Subprocess helpers.

use crate::error::{Result, RunnerError};
use std::process::{Command, Output, Stdio};
use tracing::debug;

/// Render a command for logs and error messages.
#[must_use]
pub fn describe(cmd: &Command) -> String {
    let mut parts = vec![cmd.get_program().to_string_lossy().into_owned()];
    parts.extend(cmd.get_args().map(|arg| arg.to_string_lossy().into_owned()));
    parts.join(" ")
}

/// Run a command with inherited stdio and fail on a non-zero exit.
///
/// # Errors
///
/// Returns `CommandFailed` if the command cannot be spawned or exits
/// non-zero. The exit status is carried when one exists.
pub fn run_checked(cmd: &mut Command) -> Result<()> {
    let description = describe(cmd);
    debug!(command = %description, "Running");
    let status = cmd.status().map_err(|e| {
        debug!(command = %description, error = %e, "Spawn failed");
        RunnerError::CommandFailed {
            command: description.clone(),
            status: None,
        }
    })?;

    if status.success() {
        Ok(())
    } else {
        Err(RunnerError::CommandFailed {
            command: description,
            status: status.code(),
        })
    }
}

/// Run a command and capture its output regardless of exit status.
///
/// # Errors
///
/// Returns `CommandFailed` only if the command cannot be spawned.
pub fn capture(cmd: &mut Command) -> Result<Output> {
    let description = describe(cmd);
    debug!(command = %description, "Capturing");
    cmd.stdin(Stdio::null())
        .output()
        .map_err(|_| RunnerError::CommandFailed {
            command: description,
            status: None,
        })
}

/// Run a command, capture stdout, and fail on a non-zero exit.
///
/// # Errors
///
/// Returns `CommandFailed` on spawn failure or non-zero exit.
pub fn capture_checked(cmd: &mut Command) -> Result<String> {
    let output = capture(cmd)?;
    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(stderr = %stderr.trim(), "Command failed");
        Err(RunnerError::CommandFailed {
            command: describe(cmd),
            status: output.status.code(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe() {
        let mut cmd = Command::new("git");
        cmd.args(["clone", "--branch", "master"]);
        assert_eq!(describe(&cmd), "git clone --branch master");
    }

    #[cfg(unix)]
    #[test]
    fn test_run_checked_reports_status() {
        let err = run_checked(Command::new("sh").args(["-c", "exit 3"])).expect_err("fails");
        assert!(matches!(
            err,
            RunnerError::CommandFailed {
                status: Some(3),
                ..
            }
        ));
        run_checked(&mut Command::new("true")).expect("true succeeds");
    }

    #[test]
    fn test_missing_binary_has_no_status() {
        let err = run_checked(&mut Command::new("definitely-not-a-real-binary-xyz"))
            .expect_err("spawn fails");
        assert!(matches!(err, RunnerError::CommandFailed { status: None, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_checked() {
        let out = capture_checked(Command::new("sh").args(["-c", "echo hello"])).expect("echo");
        assert_eq!(out.trim(), "hello");
    }
}
