//! Time parsing and formatting for the tracking service.

use crate::error::{Result, RunnerError};
use chrono::{DateTime, FixedOffset, Local, NaiveDateTime, TimeZone, Utc};

/// Layout the tracking service expects for revision and result dates.
pub const CODESPEED_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Format a timestamp for the tracking service, in local time.
#[must_use]
pub fn format_codespeed_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String {
    dt.with_timezone(&Local)
        .format(CODESPEED_DATE_FORMAT)
        .to_string()
}

/// Parse a commit date as printed by git.
///
/// Supports:
/// - strict ISO 8601 (`%cI`): `2012-11-08T14:02:11-05:00`
/// - git's default ISO form (`%ci`): `2012-11-08 14:02:11 -0500`
/// - a bare `YYYY-MM-DD HH:MM:SS`, taken as UTC
///
/// # Errors
///
/// Returns `ResultParse` if none of the formats match.
pub fn parse_commit_date(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(dt) = DateTime::<FixedOffset>::parse_from_str(s, "%Y-%m-%d %H:%M:%S %z") {
        return Ok(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, CODESPEED_DATE_FORMAT) {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    Err(RunnerError::ResultParse(format!(
        "unrecognized commit date '{s}'"
    )))
}
