//! `strangelove` - H-Store benchmark experiment runner.
//!
//! Drives benchmark runs on an EC2 cluster across partition counts and
//! trials, collects controller throughput figures, optionally uploads them
//! to Codespeed and prints a per-partition report. The `hstore-files`
//! binary installs the research fixture repository.

pub mod cli;
pub mod cluster;
pub mod codespeed;
pub mod config;
pub mod error;
pub mod format;
pub mod logging;
pub mod model;
pub mod runner;
pub mod util;

pub use error::{ErrorCode, Result, RunnerError, StructuredError};
