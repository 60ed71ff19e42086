//! Codespeed result upload.
//!
//! One form-encoded POST to `<url>/result/add/` per trial with a
//! positive throughput.

use crate::error::{Result, RunnerError};
use crate::model::{Revision, ThroughputMetrics};
use crate::util::time::format_codespeed_date;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

pub const PROJECT: &str = "H-Store";
pub const ENVIRONMENT: &str = "ec2";

/// Form fields accepted by Codespeed's `result/add` endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodespeedResult {
    pub commitid: String,
    pub branch: String,
    pub project: String,
    pub executable: String,
    pub benchmark: String,
    pub environment: String,
    pub result_value: f64,
    pub revision_date: String,
    pub result_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std_dev: Option<f64>,
}

impl CodespeedResult {
    /// Build the record for one trial run with `partitions` partitions.
    #[must_use]
    pub fn new(
        revision: &Revision,
        branch: &str,
        benchmark: &str,
        partitions: u32,
        metrics: &ThroughputMetrics,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            commitid: revision.commit.clone(),
            branch: branch.to_string(),
            project: PROJECT.to_string(),
            executable: executable_name(partitions),
            benchmark: benchmark.to_string(),
            environment: ENVIRONMENT.to_string(),
            result_value: metrics.txn_rate,
            revision_date: format_codespeed_date(&revision.date),
            result_date: format_codespeed_date(&now),
            min: metrics.min,
            max: metrics.max,
            std_dev: metrics.stddev,
        }
    }
}

/// Executable name for a partition count, e.g. `H-Store-8p`.
#[must_use]
pub fn executable_name(partitions: u32) -> String {
    format!("{PROJECT}-{partitions}p")
}

/// Destination for trial results.
pub trait ResultUploader {
    /// Send one result.
    ///
    /// # Errors
    ///
    /// Returns `Upload` or `Http` if the service does not accept it.
    fn upload(&mut self, result: &CodespeedResult) -> Result<()>;
}

/// Blocking HTTP client for a Codespeed instance.
#[derive(Debug)]
pub struct HttpUploader {
    endpoint: String,
    client: reqwest::blocking::Client,
}

impl HttpUploader {
    /// Uploader for the Codespeed instance rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `Http` if the client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("strangelove/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            endpoint: result_endpoint(base_url),
            client,
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl ResultUploader for HttpUploader {
    fn upload(&mut self, result: &CodespeedResult) -> Result<()> {
        debug!(endpoint = %self.endpoint, ?result, "Uploading result");
        let response = self.client.post(&self.endpoint).form(result).send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(RunnerError::Upload {
                url: self.endpoint.clone(),
                reason: format!("{status}: {}", body.trim()),
            });
        }
        info!(
            "Uploaded {} result for {} to {}",
            result.benchmark, result.executable, self.endpoint
        );
        Ok(())
    }
}

fn result_endpoint(base_url: &str) -> String {
    format!("{}/result/add/", base_url.trim_end_matches('/'))
}
