//! Command dispatch and handlers.

pub mod check;
pub mod impact;
pub mod update;

use std::env;
use std::future::Future;
use std::path::Path;

use crate::cli::{Cli, Command, TargetArgs};
use crate::config::{load_config, validate_ceiling, AppConfig};
use crate::context::ServiceContext;
use crate::generate::PipelineMetadata;
use crate::update::UpdateOptions;

/// Dispatch a parsed command to its handler.
///
/// When `PIPEMAP_RECORD` is set to a file path, all port interactions of an
/// `update` or `impact` run are recorded to that cassette.
///
/// # Errors
///
/// Returns an error string if the selected command handler fails.
pub fn dispatch(cli: &Cli) -> Result<(), String> {
    match &cli.command {
        Command::Update {
            path,
            target,
            force_full,
            entry_points_only,
            include_comments,
            metadata,
            report,
        } => {
            let mut config = load(cli.config.as_deref(), path)?;
            config.scan.include_comments |= *include_comments;
            let mut options = options(target, &config, metadata.clone().into())?;
            options.force_full = *force_full;
            options.entry_points_only = *entry_points_only;
            let ctx = ServiceContext::from_env(path);
            block_on(update::run(&ctx, &config, path, options, report.as_deref()))
        }
        Command::Impact { path, target, json } => {
            let config = load(cli.config.as_deref(), path)?;
            let options = options(target, &config, PipelineMetadata::default())?;
            let ctx = ServiceContext::from_env(path);
            block_on(impact::run(&ctx, &config, path, options, *json))
        }
        Command::Check { file } => {
            let root = env::current_dir()
                .map_err(|e| format!("failed to get current directory: {e}"))?;
            let config = load(cli.config.as_deref(), &root)?;
            let file = file.clone().unwrap_or_else(|| root.join(&config.diagram.path));
            check::run(&ServiceContext::live(&root), &file)
        }
    }
}

fn load(explicit: Option<&Path>, root: &Path) -> Result<AppConfig, String> {
    load_config(explicit, root).map_err(|e| e.to_string())
}

fn options(
    target: &TargetArgs,
    config: &AppConfig,
    metadata: PipelineMetadata,
) -> Result<UpdateOptions, String> {
    if let Some(ceiling) = target.ceiling {
        validate_ceiling(ceiling).map_err(|e| e.to_string())?;
    }
    Ok(UpdateOptions {
        diagram: target.diagram.clone().unwrap_or_else(|| config.diagram.path.clone()),
        since: target.since.clone(),
        ceiling: target.ceiling,
        strategy: target.strategy,
        metadata,
        ..UpdateOptions::default()
    })
}

/// Runs `future` to completion on a single-threaded runtime.
fn block_on<F>(future: F) -> Result<(), String>
where
    F: Future<Output = Result<(), String>>,
{
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start runtime: {e}"))?
        .block_on(future)
}

/// Writes `contents` to `path` through the filesystem port.
fn write_output(ctx: &ServiceContext, path: &Path, contents: &str) -> Result<(), String> {
    ctx.fs.write(path, contents).map_err(|e| format!("failed to write {}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::Strategy;

    fn target(ceiling: Option<f64>) -> TargetArgs {
        TargetArgs {
            diagram: None,
            since: Some("v1".into()),
            ceiling,
            strategy: Strategy::Heuristic,
        }
    }

    #[test]
    fn options_default_to_configured_diagram() {
        let config = AppConfig::default();
        let options = options(&target(Some(0.3)), &config, PipelineMetadata::default()).unwrap();
        assert_eq!(options.diagram, config.diagram.path);
        assert_eq!(options.since.as_deref(), Some("v1"));
        assert_eq!(options.ceiling, Some(0.3));
        assert!(!options.plan_only);
    }

    #[test]
    fn options_reject_out_of_range_ceiling() {
        let config = AppConfig::default();
        assert!(options(&target(Some(1.5)), &config, PipelineMetadata::default()).is_err());
        assert!(options(&target(Some(0.0)), &config, PipelineMetadata::default()).is_err());
    }
}
