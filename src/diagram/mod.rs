//! Structural model of a Mermaid flowchart: nodes, edges, subgraphs, metadata.
//!
//! A [`DiagramModel`] can only be assembled through checked operations, so any
//! value of the type satisfies the invariants the rest of the pipeline relies
//! on: unique node ids, non-empty content, no dangling edge endpoints, no
//! self-loops, and at most one subgraph per node.

pub mod host;
pub mod parser;
pub mod serializer;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use host::{extract_flowchart, NotFoundError};
pub use parser::{parse, ParseError};
pub use serializer::serialize;

/// Rendering shape of a node, inferred from its bracket punctuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeShape {
    /// `A["..."]`
    Rectangle,
    /// `A("...")`
    Rounded,
    /// `A(["..."])`
    Stadium,
    /// `A[["..."]]`
    Subroutine,
    /// `A[("...")]`
    Cylinder,
    /// `A(("..."))`
    Circle,
    /// `A{"..."}`
    Diamond,
    /// `A{{"..."}}`
    Hexagon,
}

impl NodeShape {
    /// Opening and closing delimiters for this shape.
    #[must_use]
    pub fn delimiters(self) -> (&'static str, &'static str) {
        match self {
            Self::Rectangle => ("[", "]"),
            Self::Rounded => ("(", ")"),
            Self::Stadium => ("([", "])"),
            Self::Subroutine => ("[[", "]]"),
            Self::Cylinder => ("[(", ")]"),
            Self::Circle => ("((", "))"),
            Self::Diamond => ("{", "}"),
            Self::Hexagon => ("{{", "}}"),
        }
    }

    /// All shapes, longest opening delimiter first so prefix matching is unambiguous.
    pub(crate) const BY_OPENING: [Self; 8] = [
        Self::Stadium,
        Self::Subroutine,
        Self::Cylinder,
        Self::Circle,
        Self::Hexagon,
        Self::Rectangle,
        Self::Rounded,
        Self::Diamond,
    ];
}

/// A single pipeline stage in the diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagramNode {
    /// Short unique token, stable across regenerations.
    pub id: String,
    /// Bracket shape used when rendering.
    pub shape: NodeShape,
    /// Ordered text lines: the current known facts about this stage.
    pub content: Vec<String>,
    /// Whether lines are rendered with a leading bullet marker.
    pub bulleted: bool,
    /// Name of the subgraph this node belongs to, if any.
    pub subgraph: Option<String>,
}

impl DiagramNode {
    /// Creates a rectangle node with bulleted content and no subgraph.
    pub fn new(id: impl Into<String>, content: Vec<String>) -> Self {
        Self {
            id: id.into(),
            shape: NodeShape::Rectangle,
            content,
            bulleted: true,
            subgraph: None,
        }
    }

    /// Returns the node with the given shape.
    #[must_use]
    pub fn with_shape(mut self, shape: NodeShape) -> Self {
        self.shape = shape;
        self
    }

    /// Returns the node with bullet markers switched on or off.
    #[must_use]
    pub fn with_bullets(mut self, bulleted: bool) -> Self {
        self.bulleted = bulleted;
        self
    }

    /// All content lines joined with a space, lowercased. Used for keyword search.
    #[must_use]
    pub fn searchable_text(&self) -> String {
        self.content.join(" ").to_lowercase()
    }
}

/// Arrow style of an edge. Rendering only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStyle {
    /// `-->`
    #[default]
    Arrow,
    /// `---`
    Open,
    /// `-.->`
    Dotted,
    /// `==>`
    Thick,
}

impl EdgeStyle {
    /// The connector token for this style.
    #[must_use]
    pub fn token(self) -> &'static str {
        match self {
            Self::Arrow => "-->",
            Self::Open => "---",
            Self::Dotted => "-.->",
            Self::Thick => "==>",
        }
    }
}

/// A directed connection between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Source node id.
    pub source: String,
    /// Target node id.
    pub target: String,
    /// Optional edge label.
    pub label: Option<String>,
    /// Arrow style.
    pub style: EdgeStyle,
}

impl Edge {
    /// Creates a plain arrow edge without a label.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self { source: source.into(), target: target.into(), label: None, style: EdgeStyle::Arrow }
    }

    /// Returns the edge with the given label.
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// A named grouping of nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    /// Identifier token used after the `subgraph` keyword.
    pub name: String,
    /// Optional display title (`subgraph name [Title]`).
    pub title: Option<String>,
    /// Enclosing subgraph, when nested.
    pub parent: Option<String>,
    /// Member node ids in rendering order.
    pub members: Vec<String>,
}

impl Subgraph {
    /// Creates an empty top-level subgraph.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), title: None, parent: None, members: Vec::new() }
    }
}

/// Invariant violations raised while assembling a [`DiagramModel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// Two nodes share an id.
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
    /// A node was declared without any content.
    #[error("node `{0}` has no content")]
    EmptyContent(String),
    /// A node has a blank line among non-blank ones.
    #[error("node `{node}` has a blank content line at {index}")]
    BlankLine {
        /// The node id.
        node: String,
        /// Zero-based position of the blank line.
        index: usize,
    },
    /// An edge or membership references an id that was never declared.
    #[error("reference to undeclared node `{0}`")]
    UnknownNode(String),
    /// An edge connects a node to itself.
    #[error("self-loop on node `{0}`")]
    SelfLoop(String),
    /// A subgraph name is used twice.
    #[error("duplicate subgraph `{0}`")]
    DuplicateSubgraph(String),
    /// A subgraph name is referenced but not declared.
    #[error("reference to undeclared subgraph `{0}`")]
    UnknownSubgraph(String),
    /// A node is listed in a second subgraph.
    #[error("node `{node}` is already a member of subgraph `{existing}`")]
    DuplicateMembership {
        /// The node id.
        node: String,
        /// The subgraph that already owns it.
        existing: String,
    },
}

/// In-memory representation of a flowchart.
///
/// Equality ignores declaration order of nodes, subgraphs and metadata but
/// not the order of edges, subgraph members or directives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagramModel {
    direction: String,
    nodes: IndexMap<String, DiagramNode>,
    edges: Vec<Edge>,
    subgraphs: IndexMap<String, Subgraph>,
    metadata: IndexMap<String, String>,
    directives: Vec<String>,
}

impl Default for DiagramModel {
    fn default() -> Self {
        Self::new("TD")
    }
}

impl DiagramModel {
    /// Creates an empty diagram flowing in the given direction (`TD`, `LR`, ...).
    pub fn new(direction: impl Into<String>) -> Self {
        Self {
            direction: direction.into(),
            nodes: IndexMap::new(),
            edges: Vec::new(),
            subgraphs: IndexMap::new(),
            metadata: IndexMap::new(),
            directives: Vec::new(),
        }
    }

    /// Flow direction from the header line.
    #[must_use]
    pub fn direction(&self) -> &str {
        &self.direction
    }

    /// Nodes in declaration order.
    pub fn nodes(&self) -> impl Iterator<Item = &DiagramNode> {
        self.nodes.values()
    }

    /// Looks up a node by id.
    #[must_use]
    pub fn node(&self, id: &str) -> Option<&DiagramNode> {
        self.nodes.get(id)
    }

    /// Returns `true` if a node with this id exists.
    #[must_use]
    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Edges in declaration order.
    #[must_use]
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Subgraphs in declaration order.
    pub fn subgraphs(&self) -> impl Iterator<Item = &Subgraph> {
        self.subgraphs.values()
    }

    /// Looks up a subgraph by name.
    #[must_use]
    pub fn subgraph(&self, name: &str) -> Option<&Subgraph> {
        self.subgraphs.get(name)
    }

    /// Free-form key/value metadata (title, purpose, owner, commit, ...).
    #[must_use]
    pub fn metadata(&self) -> &IndexMap<String, String> {
        &self.metadata
    }

    /// Style and interaction directives carried verbatim.
    #[must_use]
    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    /// Ids of nodes with an edge pointing at `id`.
    #[must_use]
    pub fn incoming(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.target == id).map(|e| e.source.as_str()).collect()
    }

    /// Ids of nodes that `id` points at.
    #[must_use]
    pub fn outgoing(&self, id: &str) -> Vec<&str> {
        self.edges.iter().filter(|e| e.source == id).map(|e| e.target.as_str()).collect()
    }

    /// Adds a node. Its `subgraph` field is ignored here; membership is
    /// established through [`DiagramModel::add_member`].
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or the content is empty.
    pub fn add_node(&mut self, mut node: DiagramNode) -> Result<(), ModelError> {
        if self.nodes.contains_key(&node.id) {
            return Err(ModelError::DuplicateNode(node.id));
        }
        if node.content.iter().all(|line| line.trim().is_empty()) {
            return Err(ModelError::EmptyContent(node.id));
        }
        if let Some(index) = node.content.iter().position(|line| line.trim().is_empty()) {
            return Err(ModelError::BlankLine { node: node.id, index });
        }
        for line in &mut node.content {
            if line.trim().len() != line.len() {
                *line = line.trim().to_string();
            }
        }
        node.subgraph = None;
        self.nodes.insert(node.id.clone(), node);
        Ok(())
    }

    /// Adds an edge between two existing nodes.
    ///
    /// # Errors
    ///
    /// Returns an error on a dangling endpoint or a self-loop.
    pub fn add_edge(&mut self, edge: Edge) -> Result<(), ModelError> {
        for endpoint in [&edge.source, &edge.target] {
            if !self.nodes.contains_key(endpoint) {
                return Err(ModelError::UnknownNode(endpoint.clone()));
            }
        }
        if edge.source == edge.target {
            return Err(ModelError::SelfLoop(edge.source));
        }
        self.edges.push(edge);
        Ok(())
    }

    /// Declares an empty subgraph. Members are added with [`DiagramModel::add_member`].
    ///
    /// # Errors
    ///
    /// Returns an error if the name is taken or the parent is unknown.
    pub fn add_subgraph(
        &mut self,
        name: impl Into<String>,
        title: Option<String>,
        parent: Option<String>,
    ) -> Result<(), ModelError> {
        let name = name.into();
        if self.subgraphs.contains_key(&name) {
            return Err(ModelError::DuplicateSubgraph(name));
        }
        if let Some(parent) = &parent {
            if !self.subgraphs.contains_key(parent) {
                return Err(ModelError::UnknownSubgraph(parent.clone()));
            }
        }
        self.subgraphs.insert(name.clone(), Subgraph { name, title, parent, members: Vec::new() });
        Ok(())
    }

    /// Places an existing node into an existing subgraph.
    ///
    /// # Errors
    ///
    /// Returns an error if either side is unknown or the node already has a subgraph.
    pub fn add_member(&mut self, subgraph: &str, node_id: &str) -> Result<(), ModelError> {
        let node =
            self.nodes.get_mut(node_id).ok_or_else(|| ModelError::UnknownNode(node_id.into()))?;
        let group = self
            .subgraphs
            .get_mut(subgraph)
            .ok_or_else(|| ModelError::UnknownSubgraph(subgraph.into()))?;
        if let Some(existing) = &node.subgraph {
            return Err(ModelError::DuplicateMembership {
                node: node_id.into(),
                existing: existing.clone(),
            });
        }
        node.subgraph = Some(subgraph.to_string());
        group.members.push(node_id.to_string());
        Ok(())
    }

    /// Sets a metadata entry, replacing any previous value.
    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), value.into());
    }

    /// Removes a metadata entry, keeping the order of the rest.
    pub fn remove_metadata(&mut self, key: &str) -> Option<String> {
        self.metadata.shift_remove(key)
    }

    /// Appends a verbatim directive line.
    pub fn push_directive(&mut self, line: impl Into<String>) {
        self.directives.push(line.into());
    }

    /// Consumes the model and returns it with an additional metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_metadata(key, value);
        self
    }
}
