use std::io::{self, IsTerminal};
use strangelove::cli::{commands, parse_runner_args};
use strangelove::config::Catalog;
use strangelove::logging::init_logging;
use strangelove::{RunnerError, StructuredError};
use tracing::debug;

fn main() {
    let catalog = match Catalog::discover() {
        Ok(catalog) => catalog,
        Err(e) => handle_error(&e),
    };

    let (cli, overrides) =
        parse_runner_args(&catalog, std::env::args_os()).unwrap_or_else(|e| e.exit());

    if let Err(e) = init_logging(cli.verbosity(), cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    if let Err(e) = commands::run::execute(&cli, &catalog, &overrides) {
        handle_error(&e);
    }
}

/// Print the error for a human and exit with its code.
fn handle_error(err: &RunnerError) -> ! {
    let structured = StructuredError::from_error(err);
    debug!(error = %structured.to_json(), "Exiting on error");
    let use_color = io::stderr().is_terminal();
    eprintln!("{}", structured.to_human(use_color));
    std::process::exit(err.exit_code());
}
