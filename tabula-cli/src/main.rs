//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use tabula_cli::CliError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match tabula_cli::run() {
        Ok(outcome) => outcome.exit_code(),
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("tabula: {err}");
            ExitCode::FAILURE
        }
    }
}
