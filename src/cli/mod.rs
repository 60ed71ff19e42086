//! CLI definitions for `strangelove` and `hstore-files`.
//!
//! The runner's static flags are derived. Flags for individual cluster and
//! controller parameters come from the [`Catalog`] and are added to the
//! derived command before parsing.

use crate::config::{Catalog, CliParam, Layer, ParamValue};
use clap::builder::PossibleValuesParser;
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, CommandFactory, FromArgMatches, Parser};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod commands;

/// Default fixture repository for `hstore-files`.
pub const DEFAULT_FILES_REPO: &str = "git://github.com/apavlo/h-store-files.git";
pub const DEFAULT_FILES_BRANCH: &str = "master";

/// Run H-Store benchmark experiments on an EC2 cluster
#[derive(Parser, Debug, Clone)]
#[command(name = "strangelove", author, version, about, long_about = None)]
#[allow(clippy::struct_excessive_bools)]
pub struct RunnerCli {
    /// Benchmark projects to run
    #[arg(long, num_args = 1.., required = true)]
    pub benchmark: Vec<String>,

    /// Partition counts to run, in order
    #[arg(
        long,
        num_args = 1..,
        default_values_t = [4u32],
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub partitions: Vec<u32>,

    /// Start the cluster before running
    #[arg(long)]
    pub start_cluster: bool,

    /// Skip compile, repository update, conf and jar updates, and time sync
    #[arg(long)]
    pub fast_start: bool,

    /// Reboot running instances when starting the cluster
    #[arg(long)]
    pub force_reboot: bool,

    /// Run a single client thread at one transaction per second
    #[arg(long)]
    pub single_client: bool,

    /// Start the cluster and exit without running anything
    #[arg(long)]
    pub no_execute: bool,

    /// Do not compile H-Store before the first trial
    #[arg(long)]
    pub no_compile: bool,

    /// Do not update the remote checkout
    #[arg(long)]
    pub no_update: bool,

    /// Do not rebuild the benchmark jar
    #[arg(long)]
    pub no_jar: bool,

    /// Do not rewrite the remote configuration file
    #[arg(long)]
    pub no_conf: bool,

    /// Do not synchronize instance clocks
    #[arg(long)]
    pub no_sync: bool,

    /// Do not ask the controller for JSON results (nothing is recorded)
    #[arg(long)]
    pub no_json: bool,

    /// Experiment type
    #[arg(long)]
    pub exp_type: Option<String>,

    /// Trials to collect per partition count
    #[arg(long, default_value_t = 3)]
    pub exp_trials: u32,

    /// Attempts allowed per trial
    #[arg(long, default_value_t = 3)]
    pub exp_attempts: u32,

    /// Scale client.scalefactor with the partition count
    #[arg(long)]
    pub multiply_scalefactor: bool,

    /// Keep going after a failed benchmark run
    #[arg(long)]
    pub no_stop_on_error: bool,

    /// Do not stop runs that report zero throughput
    #[arg(long)]
    pub no_retry_on_zero: bool,

    /// Clear controller logs before the first trial
    #[arg(long)]
    pub clear_logs: bool,

    /// Record workload trace files
    #[arg(long)]
    pub workload_trace: bool,

    /// Codespeed base URL to upload results to
    #[arg(long, help_heading = "Codespeed")]
    pub codespeed_url: Option<String>,

    /// Benchmark name reported to Codespeed
    #[arg(long, help_heading = "Codespeed")]
    pub codespeed_benchmark: Option<String>,

    /// Local git revision reported to Codespeed
    #[arg(long, help_heading = "Codespeed")]
    pub codespeed_revision: Option<String>,

    /// Previous revision (informational)
    #[arg(long, help_heading = "Codespeed")]
    pub codespeed_lastrevision: Option<String>,

    /// Branch reported to Codespeed (default: hstore.git_branch)
    #[arg(long, help_heading = "Codespeed")]
    pub codespeed_branch: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Turn on the controller's debug options
    #[arg(long)]
    pub debug_hstore: bool,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

impl RunnerCli {
    /// Effective verbosity, counting `--debug` as `-v`.
    #[must_use]
    pub fn verbosity(&self) -> u8 {
        if self.debug {
            self.verbose.max(1)
        } else {
            self.verbose
        }
    }
}

/// Install the H-Store research files repository
#[derive(Parser, Debug, Clone)]
#[command(name = "hstore-files", author, version, about, long_about = None)]
pub struct InstallCli {
    /// Installation path
    pub path: PathBuf,

    /// Repository to clone
    #[arg(long, default_value = DEFAULT_FILES_REPO)]
    pub git_repo: String,

    /// Branch to clone
    #[arg(long, default_value = DEFAULT_FILES_BRANCH)]
    pub git_branch: String,

    /// Replace an existing installation
    #[arg(long)]
    pub overwrite: bool,

    /// Hard-link copy from this local cache instead of cloning
    #[arg(long)]
    pub copy: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (warnings and errors only)
    #[arg(short, long)]
    pub quiet: bool,
}

/// The runner command with catalog choices and generated parameter flags.
#[must_use]
pub fn runner_command(catalog: &Catalog) -> Command {
    let benchmarks = catalog.benchmarks.clone();
    let experiments = catalog.experiment_names();
    let default_experiment = catalog.default_experiment().to_string();

    let mut cmd = RunnerCli::command()
        .mut_arg("benchmark", |arg| {
            arg.value_parser(PossibleValuesParser::new(benchmarks))
        })
        .mut_arg("exp_type", |arg| {
            let arg = arg.value_parser(PossibleValuesParser::new(experiments));
            if default_experiment.is_empty() {
                arg
            } else {
                arg.default_value(default_experiment)
            }
        });

    for param in catalog.cli_params() {
        cmd = cmd.arg(param_arg(param));
    }
    cmd
}

fn param_arg(param: CliParam) -> Arg {
    let CliParam { key, spec, heading } = param;
    let kind = spec.kind;
    let parse_key = key.clone();

    let mut arg = Arg::new(key.clone())
        .long(key)
        .action(ArgAction::Set)
        .value_name(kind.as_str().to_uppercase())
        .value_parser(move |raw: &str| kind.parse_value(&parse_key, raw))
        .help_heading(heading);
    if let Some(help) = spec.help {
        arg = arg.help(help);
    }
    if let Some(default) = spec.default.map(|value| value.to_string()) {
        if !default.is_empty() {
            arg = arg.default_value(default);
        }
    }
    arg
}

/// Parameters the user set explicitly. Defaults shown in help are not
/// overrides.
#[must_use]
pub fn overrides_from_matches(catalog: &Catalog, matches: &ArgMatches) -> Layer {
    catalog
        .cli_params()
        .into_iter()
        .filter(|param| matches.value_source(&param.key) == Some(ValueSource::CommandLine))
        .filter_map(|param| {
            matches
                .get_one::<ParamValue>(&param.key)
                .map(|value| (param.key, Some(value.clone())))
        })
        .collect()
}

/// Parse runner arguments against `catalog`.
///
/// # Errors
///
/// Returns a clap error for invalid arguments, `--help` and `--version`.
pub fn parse_runner_args<I, T>(catalog: &Catalog, args: I) -> Result<(RunnerCli, Layer), clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let matches = runner_command(catalog).try_get_matches_from(args)?;
    let cli = RunnerCli::from_arg_matches(&matches)?;
    let overrides = overrides_from_matches(catalog, &matches);
    Ok((cli, overrides))
}
