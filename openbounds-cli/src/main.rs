//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use openbounds_cli::CliError;

fn main() -> ExitCode {
    match openbounds_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("openbounds: {err}");
            ExitCode::FAILURE
        }
    }
}
