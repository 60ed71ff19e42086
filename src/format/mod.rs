//! Output handling for `strangelove`.
//!
//! - [`results`] reads the controller's JSON result out of a run's stdout
//! - [`text`] renders the end-of-run report

pub mod results;
mod text;

pub use results::{extract_result_json, parse_throughput};
pub use text::{format_report, print_report};
