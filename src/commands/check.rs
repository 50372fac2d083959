//! `pipemap check` command.

use std::fmt::Write as _;
use std::path::Path;

use crate::context::ServiceContext;
use crate::diagram::host::{detect_format, extract_flowchart};
use crate::diagram::{parse, DiagramModel};

/// Execute the `check` command: locate the flowchart in `file`, parse it and
/// print a summary.
///
/// # Errors
///
/// Returns an error string if the file cannot be read, holds no flowchart,
/// or the flowchart does not parse.
pub fn run(ctx: &ServiceContext, file: &Path) -> Result<(), String> {
    let document = ctx
        .fs
        .read_to_string(file)
        .map_err(|e| format!("failed to read {}: {e}", file.display()))?;
    let model = check_document(&document).map_err(|e| format!("{}: {e}", file.display()))?;
    let format = detect_format(&document).map_err(|e| e.to_string())?;

    println!("{}: {format:?} document", file.display());
    print!("{}", describe(&model));
    Ok(())
}

/// Extracts and parses the flowchart held by `document`.
///
/// # Errors
///
/// Returns a message naming the first problem found.
pub fn check_document(document: &str) -> Result<DiagramModel, String> {
    let flowchart = extract_flowchart(document).map_err(|e| e.to_string())?;
    parse(flowchart).map_err(|e| e.to_string())
}

fn describe(model: &DiagramModel) -> String {
    let mut out = format!(
        "  {} nodes, {} edges, {} subgraphs (direction {})\n",
        model.node_count(),
        model.edges().len(),
        model.subgraphs().count(),
        model.direction()
    );
    for (key, value) in model.metadata() {
        let _ = writeln!(out, "  {key}: {value}");
    }
    out
}
