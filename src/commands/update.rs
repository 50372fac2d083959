//! `pipemap update` command.

use std::path::Path;

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::update::{Orchestrator, UpdateOptions};

/// Execute the `update` command.
///
/// Prints the run summary whether or not the run succeeded, and writes the
/// JSON report to `report_path` when one is given.
///
/// # Errors
///
/// Returns an error string if no valid diagram could be produced or written,
/// or the report cannot be written.
pub async fn run(
    ctx: &ServiceContext,
    config: &AppConfig,
    root: &Path,
    options: UpdateOptions,
    report_path: Option<&Path>,
) -> Result<(), String> {
    let mut orchestrator = Orchestrator::new(ctx, config, root, options);
    let result = orchestrator.run().await;
    let report = orchestrator.into_report();

    print!("{}", report.summary());
    if let Some(path) = report_path {
        let json = report.to_json().map_err(|e| format!("failed to serialize report: {e}"))?;
        super::write_output(ctx, path, &json)?;
        println!("Report written to {}", path.display());
    }
    result.map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::cassette::{Cassette, Interaction};

    #[tokio::test]
    async fn writes_report_even_when_run_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cassette = Cassette {
            name: "update-command".into(),
            recorded_at: Utc::now(),
            commit: "abc".into(),
            interactions: vec![
                Interaction {
                    seq: 0,
                    port: "clock".into(),
                    method: "now".into(),
                    input: Value::Null,
                    output: json!("2024-06-15T10:30:00Z"),
                },
                Interaction {
                    seq: 1,
                    port: "git".into(),
                    method: "is_repository".into(),
                    input: Value::Null,
                    output: json!(false),
                },
            ],
        };
        let mut ctx = ServiceContext::replaying_cassette(&cassette);
        ctx.fs = Box::new(LiveFileSystem);
        ctx.llm = None;
        let report_path = dir.path().join("report.json");
        let options = UpdateOptions { diagram: "pipeline.md".into(), ..UpdateOptions::default() };

        let err = run(&ctx, &AppConfig::default(), dir.path(), options, Some(&report_path))
            .await
            .unwrap_err();
        assert!(err.contains("no generation collaborator"));

        let written = std::fs::read_to_string(&report_path).unwrap();
        let report: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(report["outcome"], "failed");
        assert_eq!(report["mode_used"], "full");
        assert!(!dir.path().join("pipeline.md").exists());
    }
}
