//! `pipemap impact` command.

use std::path::Path;

use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::update::{Orchestrator, Transition, UpdateOptions};

/// Execute the `impact` command: decide what an update would do, print the
/// changes, mapping and score, and stop before generating anything.
///
/// # Errors
///
/// Returns an error string if the existing diagram cannot be read or the
/// report cannot be serialized.
pub async fn run(
    ctx: &ServiceContext,
    config: &AppConfig,
    root: &Path,
    mut options: UpdateOptions,
    json: bool,
) -> Result<(), String> {
    options.plan_only = true;
    let mut orchestrator = Orchestrator::new(ctx, config, root, options);
    let result = orchestrator.run().await;
    let report = orchestrator.into_report();

    if json {
        println!("{}", report.to_json().map_err(|e| format!("failed to serialize report: {e}"))?);
    } else {
        print!("{}", report.summary());
        if let Some(mapping) = &report.mapping {
            for (node, reasons) in &mapping.rationale {
                for reason in reasons {
                    println!(
                        "  {node} <- change {} via {:?} ({})",
                        reason.record_index + 1,
                        reason.strategy,
                        reason.matched_term
                    );
                }
            }
        }
        for transition in &report.transitions {
            let Transition { from, to, reason } = transition;
            println!("Decision: {from:?} -> {to:?}: {reason}");
        }
    }
    result.map_err(|e| e.to_string())
}
