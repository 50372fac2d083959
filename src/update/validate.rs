//! Structural checks on an incrementally regenerated diagram.

use std::collections::BTreeSet;

use indexmap::IndexSet;
use thiserror::Error;

use crate::diagram::serializer::{edge_line, node_line};
use crate::diagram::{parse, DiagramModel, ParseError};

/// Ways an incremental answer can break the locked template.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The answer is not a well-formed flowchart.
    #[error("generated diagram does not parse: {0}")]
    Parse(#[from] ParseError),
    /// A node of the original diagram is gone.
    #[error("node `{0}` was removed")]
    MissingNode(String),
    /// A node was introduced.
    #[error("node `{0}` was added")]
    NewNode(String),
    /// An unaffected node's text or shape changed.
    #[error("unaffected node `{0}` was modified")]
    ChangedNode(String),
    /// A node changed subgraph.
    #[error("node `{id}` moved from {before:?} to {after:?}")]
    MovedNode {
        /// Node id.
        id: String,
        /// Subgraph before.
        before: Option<String>,
        /// Subgraph after.
        after: Option<String>,
    },
    /// An edge of the original diagram is gone.
    #[error("edge `{0}` was removed")]
    MissingEdge(String),
    /// An edge was introduced.
    #[error("edge `{0}` was added")]
    NewEdge(String),
}

/// Parses `generated` and checks it against `before`: same node ids, same
/// edges, and every node outside `affected` byte-identical when serialized
/// and in the same subgraph.
///
/// # Errors
///
/// Returns the first [`ValidationError`] found.
pub fn check_incremental(
    before: &DiagramModel,
    generated: &str,
    affected: &IndexSet<String>,
) -> Result<DiagramModel, ValidationError> {
    let after = parse(generated)?;

    for node in before.nodes() {
        let Some(updated) = after.node(&node.id) else {
            return Err(ValidationError::MissingNode(node.id.clone()));
        };
        if affected.contains(&node.id) {
            continue;
        }
        if node.subgraph != updated.subgraph {
            return Err(ValidationError::MovedNode {
                id: node.id.clone(),
                before: node.subgraph.clone(),
                after: updated.subgraph.clone(),
            });
        }
        if node_line(node) != node_line(updated) {
            return Err(ValidationError::ChangedNode(node.id.clone()));
        }
    }
    if let Some(extra) = after.nodes().find(|n| !before.contains_node(&n.id)) {
        return Err(ValidationError::NewNode(extra.id.clone()));
    }

    let old_edges: BTreeSet<String> = before.edges().iter().map(edge_line).collect();
    let new_edges: BTreeSet<String> = after.edges().iter().map(edge_line).collect();
    if let Some(missing) = old_edges.difference(&new_edges).next() {
        return Err(ValidationError::MissingEdge(missing.clone()));
    }
    if let Some(extra) = new_edges.difference(&old_edges).next() {
        return Err(ValidationError::NewEdge(extra.clone()));
    }
    Ok(after)
}
