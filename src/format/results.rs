//! Controller result parsing.
//!
//! The controller prints a JSON object between `<json>` and `</json>`
//! markers. Older builds print it on a line of its own, so the last line
//! that parses as an object is used when the markers are missing.

use crate::error::{Result, RunnerError};
use crate::model::ThroughputMetrics;
use serde_json::{Map, Value};

const JSON_START: &str = "<json>";
const JSON_END: &str = "</json>";

/// Aggregate throughput across all clients.
pub const TOTAL_TXN_RATE: &str = "TOTALTXNPERSECOND";
/// Per-client throughput, used when the total is absent.
pub const TXN_RATE: &str = "TXNPERSECOND";
pub const MIN_TXN_RATE: &str = "MINTXNPERSECOND";
pub const MAX_TXN_RATE: &str = "MAXTXNPERSECOND";
pub const STDDEV_TXN_RATE: &str = "STDDEVTXNPERSECOND";

/// Pull the controller's result object out of raw stdout.
///
/// # Errors
///
/// Returns `ResultParse` if no JSON object can be found, or `Json` if the
/// marked block is malformed.
pub fn extract_result_json(stdout: &str) -> Result<Map<String, Value>> {
    if let Some(start) = stdout.find(JSON_START) {
        let body = &stdout[start + JSON_START.len()..];
        let end = body.find(JSON_END).ok_or_else(|| {
            RunnerError::ResultParse(format!("unterminated {JSON_START} block"))
        })?;
        return match serde_json::from_str::<Value>(body[..end].trim())? {
            Value::Object(map) => Ok(map),
            other => Err(RunnerError::ResultParse(format!(
                "expected a JSON object, got {other}"
            ))),
        };
    }

    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{'))
        .find_map(|line| match serde_json::from_str::<Value>(line) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .ok_or_else(|| RunnerError::ResultParse("no JSON result in controller output".to_string()))
}

/// Read the throughput figures from a controller result.
///
/// # Errors
///
/// Returns `ResultParse` when neither throughput field is present or a
/// field is not numeric.
pub fn parse_throughput(result: &Map<String, Value>) -> Result<ThroughputMetrics> {
    let txn_rate = match numeric_field(result, TOTAL_TXN_RATE)? {
        Some(rate) => rate,
        None => numeric_field(result, TXN_RATE)?.ok_or_else(|| {
            RunnerError::ResultParse(format!(
                "result has neither {TOTAL_TXN_RATE} nor {TXN_RATE}"
            ))
        })?,
    };

    Ok(ThroughputMetrics {
        txn_rate,
        min: numeric_field(result, MIN_TXN_RATE)?,
        max: numeric_field(result, MAX_TXN_RATE)?,
        stddev: numeric_field(result, STDDEV_TXN_RATE)?,
    })
}

fn numeric_field(result: &Map<String, Value>, key: &str) -> Result<Option<f64>> {
    match result.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => s.trim().parse::<f64>().map(Some).map_err(|_| {
            RunnerError::ResultParse(format!("{key} is not numeric: '{s}'"))
        }),
        Some(other) => Err(RunnerError::ResultParse(format!(
            "{key} is not numeric: {other}"
        ))),
    }
}
