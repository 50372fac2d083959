//! Binary entrypoint for the `pipemap` CLI.

use std::process::ExitCode;

use clap::Parser;
use log::debug;

use pipemap::cli::Cli;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default())
        .filter_level(cli.log_level)
        .init();
    debug!(command:? = cli.command; "parsed arguments");

    // Recording is selected in commands::dispatch via PIPEMAP_RECORD=<file>.
    match pipemap::commands::dispatch(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
