//! Core data types for `strangelove`.
//!
//! - `ExperimentResult` - samples and attempts for one (benchmark, partitions) pair
//! - `ExperimentReport` - every recorded pair, grouped by partition count
//! - `TrialState` - trial loop states
//! - `ThroughputMetrics` - figures parsed from one controller run
//! - `Revision` - commit identifier and date for the tracking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Trial loop state for one (benchmark, partitions) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrialState {
    /// Attempting trials.
    Running,
    /// Quota met, attempt budget exhausted, or a stop condition hit.
    Stopped,
    /// Interrupt or stop-on-error; abandon every remaining pair.
    ForceStopped,
}

impl TrialState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "RUNNING",
            Self::Stopped => "STOPPED",
            Self::ForceStopped => "FORCE_STOPPED",
        }
    }
}

impl fmt::Display for TrialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Samples collected for one (benchmark, partition count) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentResult {
    pub benchmark: String,
    pub partitions: u32,
    /// Throughput per successful trial, in order. Zero is a valid sample.
    pub samples: Vec<f64>,
    pub attempts: u32,
    /// `exp_trials * exp_attempts`.
    pub budget: u32,
}

impl ExperimentResult {
    #[must_use]
    pub fn new(benchmark: impl Into<String>, partitions: u32, budget: u32) -> Self {
        Self {
            benchmark: benchmark.into(),
            partitions,
            samples: Vec::new(),
            attempts: 0,
            budget,
        }
    }

    /// Enough samples, or no attempts left.
    #[must_use]
    pub fn is_complete(&self, trials: u32) -> bool {
        self.samples.len() >= trials as usize || self.budget_exhausted()
    }

    #[must_use]
    pub const fn budget_exhausted(&self) -> bool {
        self.attempts >= self.budget
    }
}

/// All recorded pairs, keyed by partition count (ascending).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentReport {
    pub exp_type: String,
    pub by_partitions: BTreeMap<u32, Vec<ExperimentResult>>,
}

impl ExperimentReport {
    #[must_use]
    pub fn new(exp_type: impl Into<String>) -> Self {
        Self {
            exp_type: exp_type.into(),
            by_partitions: BTreeMap::new(),
        }
    }

    /// Keep a finished pair. Pairs without samples are dropped.
    pub fn record(&mut self, result: ExperimentResult) {
        if result.samples.is_empty() {
            return;
        }
        self.by_partitions
            .entry(result.partitions)
            .or_default()
            .push(result);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_partitions.is_empty()
    }

    /// Every recorded pair, partition counts ascending.
    pub fn results(&self) -> impl Iterator<Item = &ExperimentResult> {
        self.by_partitions.values().flatten()
    }
}

/// Figures from one controller run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThroughputMetrics {
    pub txn_rate: f64,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub stddev: Option<f64>,
}

/// A commit and when it was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revision {
    pub commit: String,
    pub date: DateTime<Utc>,
}
