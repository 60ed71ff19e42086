//! Trial/retry loop.
//!
//! Runs every (benchmark, partition count) pair in order, retrying failed
//! attempts within a per-pair budget of `trials * attempts`. A pair that
//! spends its whole budget ends that benchmark; an interrupt or, with
//! stop-on-error, a failed benchmark run ends everything. Results of
//! finished pairs land in the [`ExperimentReport`] even when the run ends
//! with an error.

mod setup;
mod signal;

pub use setup::{ExecFlags, SetupFlags};
pub use signal::StopSignal;

use crate::cluster::{ClusterControl, ExecOutput, ExecRequest, Instance};
use crate::codespeed::{CodespeedResult, ResultUploader};
use crate::config::{Env, MergedConfig, ParamValue, set_compile_target};
use crate::error::{Result, RunnerError};
use crate::format::{extract_result_json, parse_throughput};
use crate::model::{ExperimentReport, ExperimentResult, Revision, TrialState};
use crate::util::git;
use crate::util::progress::AttemptSpinner;
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Tracking-service settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodespeedOptions {
    pub url: String,
    /// Benchmark name to report instead of the project name.
    pub benchmark: Option<String>,
    /// Local git revision to report instead of the cluster's checkout.
    pub revision: Option<String>,
    pub last_revision: Option<String>,
    pub branch: Option<String>,
}

/// Everything the loop needs from the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct ExperimentOptions {
    pub benchmarks: Vec<String>,
    pub partitions: Vec<u32>,
    pub exp_type: String,
    pub trials: u32,
    pub attempts: u32,
    pub start_cluster: bool,
    pub no_execute: bool,
    pub multiply_scalefactor: bool,
    pub stop_on_error: bool,
    pub json: bool,
    pub trace: bool,
    pub setup: SetupFlags,
    pub codespeed: Option<CodespeedOptions>,
}

impl Default for ExperimentOptions {
    fn default() -> Self {
        Self {
            benchmarks: Vec::new(),
            partitions: vec![4],
            exp_type: String::new(),
            trials: 3,
            attempts: 3,
            start_cluster: false,
            no_execute: false,
            multiply_scalefactor: false,
            stop_on_error: true,
            json: true,
            trace: false,
            setup: SetupFlags::all(),
            codespeed: None,
        }
    }
}

impl ExperimentOptions {
    /// Attempts allowed per (benchmark, partition count) pair.
    #[must_use]
    pub const fn budget(&self) -> u32 {
        self.trials.saturating_mul(self.attempts)
    }
}

/// How a run ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// Every pair ran to completion.
    Completed,
    /// Interrupted, or stopped on a failed benchmark run.
    ForceStopped,
    /// `--no-execute`: the cluster was started and nothing ran.
    NoExecute,
}

/// Drives the cluster through one experiment run.
pub struct Runner<'a> {
    opts: &'a ExperimentOptions,
    cluster: &'a mut dyn ClusterControl,
    uploader: Option<&'a mut dyn ResultUploader>,
    signal: StopSignal,
    setup: SetupFlags,
    revision: Option<Revision>,
}

impl<'a> Runner<'a> {
    #[must_use]
    pub fn new(
        opts: &'a ExperimentOptions,
        cluster: &'a mut dyn ClusterControl,
        uploader: Option<&'a mut dyn ResultUploader>,
        signal: StopSignal,
    ) -> Self {
        Self {
            opts,
            cluster,
            uploader,
            signal,
            setup: opts.setup,
            revision: None,
        }
    }

    /// Run every pair, recording finished pairs into `report`.
    ///
    /// # Errors
    ///
    /// Returns the first unexpected error. Pairs finished before it,
    /// including the partial pair it interrupted, are already in `report`.
    pub fn run(&mut self, config: &MergedConfig, report: &mut ExperimentReport) -> Result<RunEnd> {
        let opts = self.opts;
        let exp_label = opts.exp_type.to_uppercase();

        for benchmark in &opts.benchmarks {
            for &partitions in &opts.partitions {
                if self.signal.is_raised() {
                    warn!("Interrupted; skipping remaining partition counts");
                    return Ok(RunEnd::ForceStopped);
                }
                info!(
                    "{exp_label} - {} - {partitions} Partitions",
                    benchmark.to_uppercase()
                );
                let mut env = pair_env(&config.env, partitions, opts.multiply_scalefactor);

                let host = match self.prepare(&env) {
                    Ok(Some(host)) => host,
                    Ok(None) => return Ok(RunEnd::NoExecute),
                    Err(e) if self.is_interrupt(&e) => {
                        warn!("Interrupted while preparing the cluster");
                        return Ok(RunEnd::ForceStopped);
                    }
                    Err(e) => return Err(e),
                };
                debug!(parameters = ?env, "Parameters");
                let removals = config.removals_for(&env);

                let mut result =
                    ExperimentResult::new(benchmark.clone(), partitions, opts.budget());
                let outcome = self.run_trials(&host, &mut env, &removals, &mut result);
                let exhausted = result.budget_exhausted();
                report.record(result);

                if outcome? == TrialState::ForceStopped {
                    return Ok(RunEnd::ForceStopped);
                }
                if exhausted {
                    info!(
                        "Attempt budget exhausted for {}; skipping remaining partition counts",
                        benchmark.to_uppercase()
                    );
                    break;
                }
            }
        }
        Ok(RunEnd::Completed)
    }

    /// Per-pair cluster preparation. `None` means stop after starting the
    /// cluster.
    fn prepare(&mut self, env: &Env) -> Result<Option<Instance>> {
        if self.opts.start_cluster {
            info!(
                "Starting cluster for experiments [noExecute={}]",
                self.opts.no_execute
            );
            self.cluster.start_cluster(env)?;
            if self.opts.no_execute {
                return Ok(None);
            }
        }
        if self.setup.take_sync_time() {
            self.cluster.sync_time(env)?;
        }
        if self.setup.take_clear_logs() {
            self.cluster.clear_logs(env)?;
        }

        let host = self
            .cluster
            .client_instances(env)?
            .into_iter()
            .next()
            .ok_or_else(|| RunnerError::NoClientInstance {
                tag: env
                    .get("ec2.cluster_tag")
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            })?;
        debug!("Client Instance: {host}");
        Ok(Some(host))
    }

    fn run_trials(
        &mut self,
        host: &Instance,
        env: &mut Env,
        removals: &BTreeSet<String>,
        result: &mut ExperimentResult,
    ) -> Result<TrialState> {
        let mut state = TrialState::Running;

        while state == TrialState::Running && !result.is_complete(self.opts.trials) {
            if self.signal.is_raised() {
                state = TrialState::ForceStopped;
                break;
            }

            set_compile_target(env, self.setup.take_compile());
            result.attempts += 1;
            info!(
                "Executing {} Trial #{}/{} [attempt={}/{}]",
                result.benchmark.to_uppercase(),
                result.samples.len(),
                self.opts.trials,
                result.attempts,
                result.budget
            );

            let flags = self.setup.take_exec();
            let request = ExecRequest {
                project: &result.benchmark,
                env,
                removals,
                json: self.opts.json,
                trace: self.opts.trace,
                update_jar: flags.update_jar,
                update_conf: flags.update_conf,
                update_repo: flags.update_repo,
                update_log4j: flags.update_log4j,
            };

            let attempt = {
                let _spinner = AttemptSpinner::start(&format!(
                    "{} attempt {}/{}",
                    result.benchmark, result.attempts, result.budget
                ));
                self.cluster.exec_benchmark(host, &request)
            };

            match attempt.and_then(|output| self.record_trial(host, env, &output, result)) {
                Ok(()) => {}
                Err(e) if self.is_interrupt(&e) => {
                    warn!("Interrupted during trial");
                    state = TrialState::ForceStopped;
                }
                Err(e) if e.is_expected_failure() => {
                    warn!("Failed to complete trial successfully: {e}");
                    if self.opts.stop_on_error {
                        state = TrialState::ForceStopped;
                    }
                }
                Err(e) => {
                    warn!("Failed to complete trial successfully: {e}");
                    return Err(e);
                }
            }
        }

        if state == TrialState::Running {
            state = TrialState::Stopped;
        }
        Ok(state)
    }

    fn record_trial(
        &mut self,
        host: &Instance,
        env: &Env,
        output: &ExecOutput,
        result: &mut ExperimentResult,
    ) -> Result<()> {
        let opts = self.opts;
        if !opts.json {
            return Ok(());
        }

        let data = extract_result_json(&output.stdout)?;
        let metrics = parse_throughput(&data)?;
        result.samples.push(metrics.txn_rate);

        if opts.trace {
            for file in &output.workloads {
                info!("Workload File: {file}");
            }
        }
        info!("Throughput: {:.2}", metrics.txn_rate);

        if metrics.txn_rate <= 0.0 {
            return Ok(());
        }
        let Some(codespeed) = &opts.codespeed else {
            return Ok(());
        };
        if self.uploader.is_none() {
            return Ok(());
        }

        let revision = self.revision(env, host, codespeed)?;
        let branch = codespeed.branch.clone().unwrap_or_else(|| {
            env.get("hstore.git_branch")
                .map(ToString::to_string)
                .unwrap_or_default()
        });
        let benchmark = codespeed.benchmark.as_deref().unwrap_or(&result.benchmark);
        let record = CodespeedResult::new(
            &revision,
            &branch,
            benchmark,
            result.partitions,
            &metrics,
            Utc::now(),
        );

        info!(
            "Uploading {} results to CODESPEED at {}",
            result.benchmark, codespeed.url
        );
        if let Some(uploader) = self.uploader.as_mut() {
            uploader.upload(&record)?;
        }
        Ok(())
    }

    /// Revision reported with uploads, looked up once per run.
    fn revision(
        &mut self,
        env: &Env,
        host: &Instance,
        codespeed: &CodespeedOptions,
    ) -> Result<Revision> {
        if let Some(revision) = &self.revision {
            return Ok(revision.clone());
        }
        let revision = match &codespeed.revision {
            Some(reference) => git::resolve_revision(reference)?,
            None => self.cluster.get_version(env, host)?,
        };
        info!("Codespeed revision {} ({})", revision.commit, revision.date);
        self.revision = Some(revision.clone());
        Ok(revision)
    }

    fn is_interrupt(&self, err: &RunnerError) -> bool {
        err.is_interrupt() || self.signal.is_raised()
    }
}

/// The merged environment specialized for one partition count.
#[must_use]
pub fn pair_env(base: &Env, partitions: u32, multiply_scalefactor: bool) -> Env {
    let mut env = base.clone();
    env.insert(
        "hstore.partitions".to_string(),
        ParamValue::Int(i64::from(partitions)),
    );
    if multiply_scalefactor {
        match base.get("client.scalefactor").and_then(ParamValue::as_f64) {
            Some(scale) => {
                let scaled = (scale * f64::from(partitions) / 2.0).trunc();
                env.insert("client.scalefactor".to_string(), ParamValue::Float(scaled));
            }
            None => warn!("client.scalefactor is not set; not scaling it"),
        }
    }
    env
}
