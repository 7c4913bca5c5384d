//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use std::process::ExitCode;

use geoprovider_cli::CliError;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match geoprovider_cli::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("geoprovider: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
