//! Core library entry for the `pipemap` CLI.
//!
//! `pipemap` keeps a Mermaid flowchart of a data pipeline in sync with the
//! code it describes. A run compares the code against the revision the
//! diagram was last reconciled at, extracts the functional changes, maps them
//! onto diagram nodes and either leaves the diagram alone, rewrites just the
//! affected nodes, or regenerates the whole diagram.

pub mod adapters;
pub mod cassette;
pub mod changes;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod diagram;
pub mod generate;
pub mod mapping;
pub mod ports;
pub mod scan;
pub mod update;

use clap::Parser;

/// Run the CLI with the provided arguments.
///
/// # Errors
///
/// Returns an error string when argument parsing fails or command execution fails.
pub fn run<I, T>(args: I) -> Result<(), String>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = cli::Cli::try_parse_from(args).map_err(|err| err.to_string())?;
    commands::dispatch(&cli)
}

#[cfg(test)]
mod tests {
    use super::run;

    #[test]
    fn run_errors_on_unknown_subcommand() {
        let result = run(["pipemap", "unknown"]);
        assert!(result.is_err());
    }

    #[test]
    fn run_checks_a_diagram_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.md");
        let document = "# Pipeline\n\n```mermaid\n\
                        flowchart TD\n    A[\"• Load\"] --> B[\"• Store\"]\n```\n";
        std::fs::write(&path, document).unwrap();
        let result = run(["pipemap", "check", path.to_str().unwrap()]);
        assert!(result.is_ok(), "{result:?}");
    }
}
