//! Experiment run command.

use crate::cli::RunnerCli;
use crate::cluster::{ClusterControl, Ec2Cluster};
use crate::codespeed::{HttpUploader, ResultUploader};
use crate::config::{self, Catalog, Layer, MergedConfig, append_exec_prefix};
use crate::error::Result;
use crate::format::print_report;
use crate::model::ExperimentReport;
use crate::runner::{CodespeedOptions, ExperimentOptions, RunEnd, Runner, SetupFlags, StopSignal};
use tracing::{debug, info, warn};

/// Token that makes the controller stop after two zero-throughput intervals.
pub const KILL_ON_ZERO: &str = "-Dkillonzero=true";

/// Translate parsed flags into loop options.
#[must_use]
pub fn experiment_options(cli: &RunnerCli, catalog: &Catalog) -> ExperimentOptions {
    let fast = cli.fast_start;
    ExperimentOptions {
        benchmarks: cli.benchmark.clone(),
        partitions: cli.partitions.clone(),
        exp_type: cli
            .exp_type
            .clone()
            .unwrap_or_else(|| catalog.default_experiment().to_string()),
        trials: cli.exp_trials,
        attempts: cli.exp_attempts,
        start_cluster: cli.start_cluster,
        no_execute: cli.no_execute,
        multiply_scalefactor: cli.multiply_scalefactor,
        stop_on_error: !cli.no_stop_on_error,
        json: !cli.no_json,
        trace: cli.workload_trace,
        setup: SetupFlags {
            compile: !(fast || cli.no_compile),
            update_repo: !(fast || cli.no_update),
            update_jar: !(fast || cli.no_jar),
            update_conf: !(fast || cli.no_conf),
            sync_time: !(fast || cli.no_sync),
            clear_logs: cli.clear_logs,
        },
        codespeed: cli.codespeed_url.as_ref().map(|url| CodespeedOptions {
            url: url.clone(),
            benchmark: cli.codespeed_benchmark.clone(),
            revision: cli.codespeed_revision.clone(),
            last_revision: cli.codespeed_lastrevision.clone(),
            branch: cli.codespeed_branch.clone(),
        }),
    }
}

/// Merge the catalog layers with the user's overrides.
///
/// # Errors
///
/// Returns `UnknownExperiment` if the experiment type is not in the catalog.
pub fn build_config(
    cli: &RunnerCli,
    catalog: &Catalog,
    exp_type: &str,
    overrides: &Layer,
) -> Result<MergedConfig> {
    if cli.single_client {
        info!("Enabling single-client debug mode!");
    }
    let defaults = catalog.cluster_defaults();
    let base = catalog.base_layer(cli.single_client, cli.debug_hstore);
    let mut merged = config::merge(&[&defaults, &base], &catalog.experiments, exp_type, overrides)?;

    if !cli.no_retry_on_zero {
        append_exec_prefix(&mut merged.env, KILL_ON_ZERO);
    }
    debug!(env = ?merged.env, "Merged configuration");
    Ok(merged)
}

/// Execute an experiment run against the EC2 cluster.
///
/// The report of finished pairs is printed before any error is returned.
///
/// # Errors
///
/// Returns configuration, cluster, result or upload errors.
pub fn execute(cli: &RunnerCli, catalog: &Catalog, overrides: &Layer) -> Result<()> {
    let opts = experiment_options(cli, catalog);
    if cli.fast_start {
        info!("Enabling fast startup");
    }
    let config = build_config(cli, catalog, &opts.exp_type, overrides)?;

    let signal = StopSignal::new();
    signal.install_ctrlc();

    let mut cluster = Ec2Cluster::new(cli.force_reboot);
    let mut uploader = match &opts.codespeed {
        Some(codespeed) => {
            if let Some(last) = &codespeed.last_revision {
                info!("Codespeed last revision: {last}");
            }
            Some(HttpUploader::new(&codespeed.url)?)
        }
        None => None,
    };

    let uploader = uploader
        .as_mut()
        .map(|uploader| uploader as &mut dyn ResultUploader);
    run_with(&opts, &config, &mut cluster, uploader, signal)
}

/// Run the loop with the given collaborators, then print the report.
///
/// # Errors
///
/// Returns the loop's error after the report is printed.
pub fn run_with(
    opts: &ExperimentOptions,
    config: &MergedConfig,
    cluster: &mut dyn ClusterControl,
    uploader: Option<&mut dyn ResultUploader>,
    signal: StopSignal,
) -> Result<()> {
    let mut report = ExperimentReport::new(opts.exp_type.clone());
    let uploader = uploader.map(|uploader| uploader as &mut dyn ResultUploader);
    let outcome = Runner::new(opts, cluster, uploader, signal).run(config, &mut report);

    info!("Disconnecting and dumping results");
    print_report(&report)?;

    match outcome? {
        RunEnd::Completed => {}
        RunEnd::ForceStopped => warn!("Experiment run stopped early"),
        RunEnd::NoExecute => info!("Cluster started; not executing benchmarks"),
    }
    Ok(())
}
