//! Plain-text rendering of the end-of-run report.

use crate::model::ExperimentReport;
use std::fmt::Write as _;
use std::io::{self, Write};

/// Render the report, one block per partition count in ascending order.
/// Experiment and benchmark names are shown upper-cased.
#[must_use]
pub fn format_report(report: &ExperimentReport) -> String {
    let exp_type = report.exp_type.to_uppercase();
    let mut out = String::new();
    for (partitions, results) in &report.by_partitions {
        let _ = writeln!(out, "{exp_type} - Partitions {partitions}");
        for result in results {
            let _ = writeln!(
                out,
                "   {} [Attempts:{}/{}]",
                result.benchmark.to_uppercase(),
                result.attempts,
                result.budget
            );
            for (i, sample) in result.samples.iter().enumerate() {
                let _ = writeln!(out, "      TRIAL #{i}: {sample:.4}");
            }
        }
        out.push('\n');
    }
    out
}

/// Write the rendered report to stdout.
///
/// # Errors
///
/// Returns an error if stdout cannot be written.
pub fn print_report(report: &ExperimentReport) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    stdout.write_all(format_report(report).as_bytes())?;
    stdout.flush()
}
