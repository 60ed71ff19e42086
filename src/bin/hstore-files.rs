use clap::Parser;
use std::io::{self, IsTerminal};
use strangelove::cli::InstallCli;
use strangelove::cli::commands::install;
use strangelove::logging::init_logging;
use strangelove::{RunnerError, StructuredError};
use tracing::debug;

fn main() {
    let cli = InstallCli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, None) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = install::execute(&cli) {
        let structured = StructuredError::from_error(&e);
        debug!(error = %structured.to_json(), "Install failed");
        eprintln!("{}", structured.to_human(io::stderr().is_terminal()));
        std::process::exit(exit_code(&e));
    }
}

/// A failed clone or copy exits with the child's status; one that never
/// ran exits 1.
fn exit_code(err: &RunnerError) -> i32 {
    match err {
        RunnerError::CommandFailed { status, .. } => {
            status.filter(|code| *code != 0).unwrap_or(1)
        }
        other => other.exit_code(),
    }
}
