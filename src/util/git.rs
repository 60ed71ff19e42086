//! Local git lookups.

use crate::error::{Result, RunnerError};
use crate::model::Revision;
use crate::util::process;
use crate::util::time::parse_commit_date;
use std::process::Command;

/// Format string that prints the full hash and the strict ISO commit date.
pub const REVISION_FORMAT: &str = "--format=%H%n%cI";

/// Resolve `reference` in the current repository to a commit and its date.
///
/// # Errors
///
/// Returns `CommandFailed` if git cannot resolve the reference, or
/// `ResultParse` if its output is malformed.
pub fn resolve_revision(reference: &str) -> Result<Revision> {
    let stdout = process::capture_checked(&mut revision_command(reference))?;
    parse_revision(&stdout)
}

/// `reference` always lands after `--end-of-options`, so it is never read
/// as a flag.
fn revision_command(reference: &str) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(["show", "-s", REVISION_FORMAT, "--end-of-options", reference]);
    cmd
}

/// Parse `<hash>\n<date>` as printed with [`REVISION_FORMAT`].
///
/// # Errors
///
/// Returns `ResultParse` when either line is missing or the date is invalid.
pub fn parse_revision(output: &str) -> Result<Revision> {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let commit = lines
        .next()
        .ok_or_else(|| RunnerError::ResultParse("empty revision output".to_string()))?;
    let date = lines
        .next()
        .ok_or_else(|| RunnerError::ResultParse(format!("no date for revision {commit}")))?;

    Ok(Revision {
        commit: commit.to_string(),
        date: parse_commit_date(date)?,
    })
}
