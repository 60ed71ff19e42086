//! Cluster control.
//!
//! The runner drives the cluster only through [`ClusterControl`]. The
//! default implementation, [`Ec2Cluster`], shells out to the `aws` CLI for
//! instance lifecycle and to `ssh` for remote commands.

mod ec2;

pub use ec2::{Ec2Cluster, benchmark_script, shell_quote};

use crate::config::Env;
use crate::error::Result;
use crate::model::Revision;
use std::collections::BTreeSet;
use std::fmt;

/// What a cluster instance is used for, from its `Type` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceRole {
    Site,
    Client,
}

impl InstanceRole {
    #[must_use]
    pub fn from_tag(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "site" => Some(Self::Site),
            "client" => Some(Self::Client),
            _ => None,
        }
    }
}

/// A cluster host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub public_dns: String,
    pub private_dns: String,
    pub role: Option<InstanceRole>,
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.public_dns.is_empty() {
            f.write_str(&self.id)
        } else {
            write!(f, "{} ({})", self.public_dns, self.id)
        }
    }
}

/// One remote benchmark invocation.
#[derive(Debug, Clone, Copy)]
pub struct ExecRequest<'a> {
    /// Benchmark project name.
    pub project: &'a str,
    pub env: &'a Env,
    /// Keys to strip from the remote configuration file.
    pub removals: &'a BTreeSet<String>,
    /// Ask the controller for a JSON result.
    pub json: bool,
    /// Record workload trace files.
    pub trace: bool,
    pub update_jar: bool,
    pub update_conf: bool,
    pub update_repo: bool,
    pub update_log4j: bool,
}

/// Output of a successful remote benchmark run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    /// Trace files written by the run, when tracing was requested.
    pub workloads: Vec<String>,
}

/// Operations the runner needs from the cluster.
pub trait ClusterControl {
    /// Bring every cluster instance up and wait until it is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster manager fails.
    fn start_cluster(&mut self, env: &Env) -> Result<()>;

    /// Synchronize instance clocks.
    ///
    /// # Errors
    ///
    /// Returns an error if any instance cannot be reached.
    fn sync_time(&mut self, env: &Env) -> Result<()>;

    /// Remove controller logs from every instance.
    ///
    /// # Errors
    ///
    /// Returns an error if any instance cannot be reached.
    fn clear_logs(&mut self, env: &Env) -> Result<()>;

    /// Running client instances, in a stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the cluster cannot be queried.
    fn client_instances(&mut self, env: &Env) -> Result<Vec<Instance>>;

    /// Run one benchmark attempt on `host`.
    ///
    /// # Errors
    ///
    /// Returns `BenchmarkFailed` when the benchmark itself aborts, or
    /// `CommandFailed` when the host cannot be reached.
    fn exec_benchmark(&mut self, host: &Instance, request: &ExecRequest<'_>) -> Result<ExecOutput>;

    /// Revision of the checkout deployed on `host`.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision cannot be read.
    fn get_version(&mut self, env: &Env, host: &Instance) -> Result<Revision>;
}
