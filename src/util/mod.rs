//! Shared utilities for `strangelove`.
//!
//! - Subprocess execution with exit-status propagation
//! - Local git revision lookup
//! - Date parsing and formatting for the tracking service
//! - Progress spinner for long remote calls

pub mod git;
pub mod process;
pub mod progress;
pub mod time;
