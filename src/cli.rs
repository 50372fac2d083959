//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::changes::Strategy;
use crate::generate::PipelineMetadata;

/// Top-level CLI parser for `pipemap`.
#[derive(Debug, Parser)]
#[command(
    name = "pipemap",
    version,
    about = "Keep a Mermaid pipeline diagram in sync with the code"
)]
pub struct Cli {
    /// Configuration file (defaults to `pipemap.toml` in the project root).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    #[arg(long, global = true, default_value = "info", value_name = "LEVEL")]
    pub log_level: log::LevelFilter,

    /// The command to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// Supported top-level subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile the diagram with the code, writing it if anything changed.
    Update {
        /// Project root.
        #[arg(default_value = ".")]
        path: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        /// Regenerate the whole diagram regardless of impact.
        #[arg(long)]
        force_full: bool,
        /// Generate a new diagram from entry points and project structure.
        #[arg(long, conflicts_with = "force_full")]
        entry_points_only: bool,
        /// Keep source comments in the project summary sent for generation.
        #[arg(long)]
        include_comments: bool,
        #[command(flatten)]
        metadata: MetadataArgs,
        /// Also write the run report as JSON to this file.
        #[arg(long, value_name = "FILE")]
        report: Option<PathBuf>,
    },
    /// Show what an update would do without generating or writing anything.
    Impact {
        /// Project root.
        #[arg(default_value = ".")]
        path: PathBuf,
        #[command(flatten)]
        target: TargetArgs,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Parse a diagram document and summarise it.
    Check {
        /// Diagram document (defaults to the configured diagram path).
        file: Option<PathBuf>,
    },
}

/// Options shared by `update` and `impact`.
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Diagram artifact, relative to the project root.
    #[arg(long, value_name = "FILE")]
    pub diagram: Option<PathBuf>,
    /// Revision to diff against (defaults to the commit recorded in the diagram).
    #[arg(long, value_name = "REV")]
    pub since: Option<String>,
    /// Largest affected share, in (0, 1], still updated incrementally.
    #[arg(long, value_name = "RATIO")]
    pub ceiling: Option<f64>,
    /// Preferred change extraction strategy.
    #[arg(long, value_enum, default_value_t = Strategy::Semantic)]
    pub strategy: Strategy,
}

/// Pipeline description merged into generation prompts.
#[derive(Debug, Clone, Default, Args)]
pub struct MetadataArgs {
    /// Pipeline name.
    #[arg(long)]
    pub name: Option<String>,
    /// What the pipeline is for.
    #[arg(long)]
    pub purpose: Option<String>,
    /// Kind of data processed.
    #[arg(long)]
    pub data_type: Option<String>,
    /// Where the data comes from.
    #[arg(long)]
    pub data_source: Option<String>,
    /// Downstream use case.
    #[arg(long)]
    pub use_case: Option<String>,
    /// Owning team or person.
    #[arg(long)]
    pub owner: Option<String>,
}

impl From<MetadataArgs> for PipelineMetadata {
    fn from(args: MetadataArgs) -> Self {
        Self {
            name: args.name,
            purpose: args.purpose,
            data_type: args.data_type,
            data_source: args.data_source,
            use_case: args.use_case,
            owner: args.owner,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command};
    use crate::changes::Strategy;
    use clap::Parser;

    #[test]
    fn parses_update_with_metadata() {
        let cli = Cli::parse_from([
            "pipemap",
            "update",
            "repo",
            "--diagram",
            "docs/pipeline.md",
            "--since",
            "HEAD~3",
            "--name",
            "RAG ingest",
            "--strategy",
            "heuristic",
        ]);
        let Command::Update { path, target, metadata, force_full, .. } = cli.command else {
            panic!("expected update");
        };
        assert_eq!(path.to_str(), Some("repo"));
        assert_eq!(target.diagram.unwrap().to_str(), Some("docs/pipeline.md"));
        assert_eq!(target.since.as_deref(), Some("HEAD~3"));
        assert_eq!(target.strategy, Strategy::Heuristic);
        assert_eq!(metadata.name.as_deref(), Some("RAG ingest"));
        assert!(!force_full);
    }

    #[test]
    fn update_accepts_include_comments() {
        let cli = Cli::parse_from(["pipemap", "update", "--include-comments"]);
        let Command::Update { include_comments, .. } = cli.command else {
            panic!("expected update");
        };
        assert!(include_comments);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["pipemap", "check", "d.html", "--log-level", "debug"]);
        assert_eq!(cli.log_level, log::LevelFilter::Debug);
        assert!(matches!(cli.command, Command::Check { file: Some(_) }));
    }

    #[test]
    fn force_full_conflicts_with_entry_points_only() {
        let parsed =
            Cli::try_parse_from(["pipemap", "update", "--force-full", "--entry-points-only"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn impact_defaults_to_current_directory() {
        let cli = Cli::parse_from(["pipemap", "impact"]);
        let Command::Impact { path, json, target } = cli.command else {
            panic!("expected impact");
        };
        assert_eq!(path.to_str(), Some("."));
        assert!(!json);
        assert_eq!(target.strategy, Strategy::Semantic);
    }
}
