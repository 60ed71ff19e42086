//! Command implementations.

pub mod install;
pub mod run;
