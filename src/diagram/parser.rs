//! Mermaid flowchart text to [`DiagramModel`].
//!
//! The scan is line oriented. The first pass collects every declaration
//! (nodes, subgraphs, edges, memberships) without checking references; the
//! second pass assembles the model through its checked operations so a
//! forward reference such as `A --> B` followed later by `B["..."]` is valid.

use thiserror::Error;

use super::{DiagramModel, DiagramNode, Edge, EdgeStyle, ModelError, NodeShape};

/// Ids reserved for annotation declarations; they become metadata, not nodes.
pub(crate) const ANNOTATION_IDS: [&str; 3] = ["title", "purpose", "note"];

const DIRECTIVE_KEYWORDS: [&str; 5] = ["style", "classDef", "class", "click", "linkStyle"];

/// Failure to turn flowchart text into a model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// No `flowchart` / `graph` header line.
    #[error("no flowchart header found")]
    MissingHeader,
    /// The text ends in the middle of a declaration.
    #[error("line {line}: truncated {what}")]
    Truncated {
        /// 1-based line number.
        line: usize,
        /// What was left open.
        what: &'static str,
    },
    /// A subgraph block is never closed with `end`.
    #[error("subgraph `{0}` is never closed")]
    UnclosedSubgraph(String),
    /// An `end` with no open subgraph.
    #[error("line {0}: `end` without an open subgraph")]
    UnbalancedEnd(usize),
    /// A line that is not a recognised statement.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },
    /// The same id is declared twice with different shape or content.
    #[error("line {line}: node `{id}` redeclared with different content")]
    ConflictingNode {
        /// 1-based line number of the second declaration.
        line: usize,
        /// The node id.
        id: String,
    },
    /// The declarations are well formed but violate a model invariant.
    #[error("line {line}: {source}")]
    Model {
        /// 1-based line number of the offending statement.
        line: usize,
        /// The invariant that was violated.
        #[source]
        source: ModelError,
    },
}

/// Parses flowchart text into a validated model.
///
/// # Errors
///
/// Returns [`ParseError`] on a missing header, truncated input, unbalanced
/// subgraph blocks, or any reference to an undeclared node.
pub fn parse(text: &str) -> Result<DiagramModel, ParseError> {
    let collected = collect(text)?;
    assemble(collected)
}

#[derive(Debug)]
struct NodeDecl {
    line: usize,
    node: DiagramNode,
    subgraph: Option<String>,
}

#[derive(Debug)]
struct SubgraphDecl {
    line: usize,
    name: String,
    title: Option<String>,
    parent: Option<String>,
}

#[derive(Debug)]
struct MemberRef {
    line: usize,
    subgraph: String,
    id: String,
}

#[derive(Debug)]
struct EdgeDecl {
    line: usize,
    edge: Edge,
}

#[derive(Debug, Default)]
struct Collected {
    direction: String,
    nodes: Vec<NodeDecl>,
    subgraphs: Vec<SubgraphDecl>,
    members: Vec<MemberRef>,
    edges: Vec<EdgeDecl>,
    metadata: Vec<(String, String)>,
    directives: Vec<String>,
    references: Vec<(usize, String)>,
}

fn collect(text: &str) -> Result<Collected, ParseError> {
    let mut out = Collected::default();
    let mut header_seen = false;
    let mut open: Vec<String> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(comment) = trimmed.strip_prefix("%%") {
            if let Some((key, value)) = metadata_comment(comment) {
                out.metadata.push((key, value));
            }
            continue;
        }
        if !header_seen {
            out.direction = header_direction(trimmed).ok_or(ParseError::MissingHeader)?;
            header_seen = true;
            continue;
        }

        let statement = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();
        if statement == "end" {
            open.pop().ok_or(ParseError::UnbalancedEnd(line))?;
            continue;
        }
        if let Some(rest) = keyword_rest(statement, "subgraph") {
            let (name, title) = subgraph_header(rest, line)?;
            out.subgraphs.push(SubgraphDecl {
                line,
                name: name.clone(),
                title,
                parent: open.last().cloned(),
            });
            open.push(name);
            continue;
        }
        if keyword_rest(statement, "direction").is_some() {
            log::debug!(line; "ignoring subgraph direction statement");
            continue;
        }
        if DIRECTIVE_KEYWORDS.iter().any(|k| keyword_rest(statement, k).is_some()) {
            out.directives.push(statement.to_string());
            continue;
        }

        statement_into(&mut out, statement, line, open.last())?;
    }

    if !header_seen {
        return Err(ParseError::MissingHeader);
    }
    if let Some(name) = open.pop() {
        return Err(ParseError::UnclosedSubgraph(name));
    }
    Ok(out)
}

fn assemble(collected: Collected) -> Result<DiagramModel, ParseError> {
    let mut model = DiagramModel::new(collected.direction);
    for (key, value) in collected.metadata {
        model.set_metadata(key, value);
    }

    for decl in collected.subgraphs {
        model
            .add_subgraph(decl.name, decl.title, decl.parent)
            .map_err(|source| ParseError::Model { line: decl.line, source })?;
    }

    for decl in &collected.nodes {
        match model.node(&decl.node.id) {
            Some(existing) if same_declaration(existing, &decl.node) => continue,
            Some(_) => {
                return Err(ParseError::ConflictingNode {
                    line: decl.line,
                    id: decl.node.id.clone(),
                });
            }
            None => {}
        }
        model
            .add_node(decl.node.clone())
            .map_err(|source| ParseError::Model { line: decl.line, source })?;
        if let Some(group) = &decl.subgraph {
            model
                .add_member(group, &decl.node.id)
                .map_err(|source| ParseError::Model { line: decl.line, source })?;
        }
    }

    for member in collected.members {
        let already_there = model
            .node(&member.id)
            .is_some_and(|n| n.subgraph.as_deref() == Some(member.subgraph.as_str()));
        if already_there {
            continue;
        }
        model
            .add_member(&member.subgraph, &member.id)
            .map_err(|source| ParseError::Model { line: member.line, source })?;
    }

    for (line, id) in collected.references {
        if !model.contains_node(&id) {
            return Err(ParseError::Model { line, source: ModelError::UnknownNode(id) });
        }
    }

    for decl in collected.edges {
        if is_annotation(&decl.edge.source) || is_annotation(&decl.edge.target) {
            log::debug!(line = decl.line; "dropping edge attached to an annotation");
            continue;
        }
        model.add_edge(decl.edge).map_err(|source| ParseError::Model { line: decl.line, source })?;
    }

    for directive in collected.directives {
        model.push_directive(directive);
    }
    Ok(model)
}

fn same_declaration(a: &DiagramNode, b: &DiagramNode) -> bool {
    a.shape == b.shape && a.content == b.content && a.bulleted == b.bulleted
}

fn is_annotation(id: &str) -> bool {
    ANNOTATION_IDS.contains(&id)
}

fn header_direction(line: &str) -> Option<String> {
    let rest = keyword_rest(line, "flowchart").or_else(|| keyword_rest(line, "graph"))?;
    let direction = rest.split_whitespace().next().unwrap_or("TD");
    Some(direction.trim_end_matches(';').to_string())
}

/// Returns the text after `keyword` when the line starts with it as a whole word.
fn keyword_rest<'a>(line: &'a str, keyword: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(rest);
    }
    rest.starts_with(char::is_whitespace).then(|| rest.trim_start())
}

fn metadata_comment(comment: &str) -> Option<(String, String)> {
    let (key, value) = comment.trim().split_once(':')?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    valid.then(|| (key.to_string(), value.trim().to_string()))
}

fn subgraph_header(rest: &str, line: usize) -> Result<(String, Option<String>), ParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        return Err(ParseError::Syntax { line, message: "subgraph without a name".into() });
    }
    if let Some(quoted) = rest.strip_prefix('"') {
        let title = quoted
            .strip_suffix('"')
            .ok_or(ParseError::Truncated { line, what: "subgraph title" })?;
        let name: String = title
            .chars()
            .map(|c| if is_id_char(c) { c } else { '_' })
            .collect();
        return Ok((name, Some(unescape(title))));
    }

    let mut cursor = Cursor::new(rest);
    let name = cursor.ident().ok_or_else(|| ParseError::Syntax {
        line,
        message: format!("invalid subgraph name `{rest}`"),
    })?;
    cursor.skip_ws();
    if cursor.is_done() {
        return Ok((name.to_string(), None));
    }
    if !cursor.eat("[") {
        return Err(ParseError::Syntax { line, message: format!("unexpected `{}`", cursor.rest()) });
    }
    let truncated = ParseError::Truncated { line, what: "subgraph title" };
    let inner = cursor.rest().strip_suffix(']').ok_or_else(|| truncated.clone())?;
    let inner = inner.trim();
    let title = match inner.strip_prefix('"') {
        Some(q) => q.strip_suffix('"').ok_or(truncated)?,
        None => inner,
    };
    Ok((name.to_string(), Some(unescape(title))))
}

/// A node mention inside a statement: `A`, `A["text"]`, `A("x"):::cls`.
#[derive(Debug)]
struct NodeRef {
    id: String,
    declared: Option<(NodeShape, Vec<String>, bool)>,
    class: Option<String>,
}

fn statement_into(
    out: &mut Collected,
    statement: &str,
    line: usize,
    subgraph: Option<&String>,
) -> Result<(), ParseError> {
    let mut cursor = Cursor::new(statement);
    let mut groups: Vec<Vec<NodeRef>> = vec![node_group(&mut cursor, line)?];
    let mut links: Vec<(EdgeStyle, Option<String>)> = Vec::new();

    loop {
        cursor.skip_ws();
        if cursor.is_done() {
            break;
        }
        links.push(connector(&mut cursor, line)?);
        cursor.skip_ws();
        if cursor.is_done() {
            return Err(ParseError::Truncated { line, what: "edge" });
        }
        groups.push(node_group(&mut cursor, line)?);
    }

    let standalone = links.is_empty();
    for group in &groups {
        for node in group {
            record_node(out, node, line, subgraph, standalone);
        }
    }

    for (i, (style, label)) in links.into_iter().enumerate() {
        for source in &groups[i] {
            for target in &groups[i + 1] {
                out.edges.push(EdgeDecl {
                    line,
                    edge: Edge {
                        source: source.id.clone(),
                        target: target.id.clone(),
                        label: label.clone(),
                        style,
                    },
                });
            }
        }
    }
    Ok(())
}

fn record_node(
    out: &mut Collected,
    node: &NodeRef,
    line: usize,
    subgraph: Option<&String>,
    standalone: bool,
) {
    if let Some(class) = &node.class {
        out.directives.push(format!("class {} {class}", node.id));
    }
    match &node.declared {
        Some((_, content, _)) if is_annotation(&node.id) => {
            out.metadata.push((node.id.clone(), content.join(" ")));
        }
        Some((shape, content, bulleted)) => out.nodes.push(NodeDecl {
            line,
            node: DiagramNode {
                id: node.id.clone(),
                shape: *shape,
                content: content.clone(),
                bulleted: *bulleted,
                subgraph: None,
            },
            subgraph: subgraph.cloned(),
        }),
        None if is_annotation(&node.id) => {}
        None => match subgraph {
            Some(group) if standalone => {
                out.members.push(MemberRef { line, subgraph: group.clone(), id: node.id.clone() });
            }
            _ => out.references.push((line, node.id.clone())),
        },
    }
}

fn node_group(cursor: &mut Cursor<'_>, line: usize) -> Result<Vec<NodeRef>, ParseError> {
    let mut group = vec![node_ref(cursor, line)?];
    loop {
        let checkpoint = cursor.pos;
        cursor.skip_ws();
        if cursor.eat("&") {
            cursor.skip_ws();
            group.push(node_ref(cursor, line)?);
        } else {
            cursor.pos = checkpoint;
            return Ok(group);
        }
    }
}

fn node_ref(cursor: &mut Cursor<'_>, line: usize) -> Result<NodeRef, ParseError> {
    let id = cursor.ident().ok_or_else(|| ParseError::Syntax {
        line,
        message: format!("expected a node id at `{}`", cursor.rest()),
    })?;
    let id = id.to_string();

    let mut declared = None;
    let opening = NodeShape::BY_OPENING
        .iter()
        .copied()
        .find(|s| cursor.rest().starts_with(s.delimiters().0));
    if let Some(shape) = opening {
        let (open, close) = shape.delimiters();
        cursor.advance(open.len());
        let raw = delimited(cursor, close, line)?;
        let (content, bulleted) = split_content(&raw);
        declared = Some((shape, content, bulleted));
    }

    let class = if cursor.eat(":::") {
        let name = cursor.ident().ok_or(ParseError::Truncated { line, what: "class suffix" })?;
        Some(name.to_string())
    } else {
        None
    };
    Ok(NodeRef { id, declared, class })
}

/// Reads bracket content up to and including `close`, honouring a quoted body.
fn delimited(cursor: &mut Cursor<'_>, close: &str, line: usize) -> Result<String, ParseError> {
    let rest = cursor.rest();
    if let Some(quoted) = rest.strip_prefix('"') {
        let end = quoted.find('"').ok_or(ParseError::Truncated { line, what: "quoted label" })?;
        let body = &quoted[..end];
        let after = &quoted[end + 1..];
        if !after.starts_with(close) {
            return Err(ParseError::Truncated { line, what: "node declaration" });
        }
        cursor.advance(1 + end + 1 + close.len());
        return Ok(body.to_string());
    }
    let end = rest.find(close).ok_or(ParseError::Truncated { line, what: "node declaration" })?;
    let body = rest[..end].to_string();
    cursor.advance(end + close.len());
    Ok(body)
}

fn split_content(raw: &str) -> (Vec<String>, bool) {
    let unified = raw.replace("<br />", "<br/>").replace("<br>", "<br/>");
    let lines: Vec<&str> =
        unified.split("<br/>").map(str::trim).filter(|l| !l.is_empty()).collect();
    let bulleted = !lines.is_empty() && lines.iter().all(|l| l.starts_with('•'));
    let content = lines
        .into_iter()
        .map(|l| if bulleted { l.trim_start_matches('•').trim_start() } else { l })
        .map(unescape)
        .collect();
    (content, bulleted)
}

pub(crate) fn unescape(text: &str) -> String {
    text.replace("#quot;", "\"").replace("#124;", "|").replace("#8226;", "•")
}

fn connector(
    cursor: &mut Cursor<'_>,
    line: usize,
) -> Result<(EdgeStyle, Option<String>), ParseError> {
    let token = connector_token(cursor.rest());
    if token.len() < 2 {
        return Err(ParseError::Syntax {
            line,
            message: format!("expected an edge connector at `{}`", cursor.rest()),
        });
    }
    cursor.advance(token.len());

    // `A -- text --> B` style: the opening token carries no arrow head.
    if matches!(token.as_str(), "--" | "==" | "-.") {
        let rest = cursor.rest();
        let (end, closing) = ["-->", "---", "==>", ".->", "-.-"]
            .iter()
            .filter_map(|c| rest.find(c).map(|i| (i, *c)))
            .min_by_key(|(i, _)| *i)
            .ok_or(ParseError::Truncated { line, what: "edge label" })?;
        let label = unescape(rest[..end].trim());
        cursor.advance(end);
        let tail = connector_token(cursor.rest());
        cursor.advance(tail.len());
        let style = style_of(&format!("{token}{closing}"));
        return Ok((style, (!label.is_empty()).then_some(label)));
    }

    let style = style_of(&token);
    cursor.skip_ws();
    let label = if cursor.eat("|") {
        let rest = cursor.rest();
        let end = rest.find('|').ok_or(ParseError::Truncated { line, what: "edge label" })?;
        let label = unescape(rest[..end].trim().trim_matches('"'));
        cursor.advance(end + 1);
        Some(label)
    } else {
        None
    };
    Ok((style, label))
}

fn connector_token(rest: &str) -> String {
    rest.chars().take_while(|c| matches!(c, '-' | '.' | '=' | '>')).collect()
}

fn style_of(token: &str) -> EdgeStyle {
    if token.contains('.') {
        EdgeStyle::Dotted
    } else if token.starts_with('=') {
        EdgeStyle::Thick
    } else if token.ends_with('>') {
        EdgeStyle::Arrow
    } else {
        EdgeStyle::Open
    }
}

fn is_id_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn is_done(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn advance(&mut self, bytes: usize) {
        self.pos = (self.pos + bytes).min(self.src.len());
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.advance(token.len());
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        let rest = self.rest();
        self.advance(rest.len() - rest.trim_start().len());
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len: usize = rest.chars().take_while(|c| is_id_char(*c)).map(char::len_utf8).sum();
        if len == 0 {
            return None;
        }
        self.advance(len);
        Some(&rest[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PIPELINE: &str = r#"flowchart TD
    %% commit: abc123
    title("Document Ingestion")
    purpose["Turns PDFs into embeddings"]

    subgraph Step1 [Ingestion]
        A["• Read PDFs<br/>• Source: GCS"]
    end
    subgraph Step2 ["Chunking"]
        C["• RecursiveTextSplitter<br/>• Size: 1000<br/>• Overlap: 200"]
    end
    D[("Vector DB")]:::store

    title --> A
    A --> C -->|vectors| D
    style D fill:#f9f
"#;

    #[test]
    fn parses_a_typical_pipeline() {
        let model = parse(PIPELINE).unwrap();
        assert_eq!(model.direction(), "TD");
        assert_eq!(model.node_count(), 3);
        assert_eq!(model.metadata().get("commit").map(String::as_str), Some("abc123"));
        assert_eq!(model.metadata().get("title").map(String::as_str), Some("Document Ingestion"));

        let c = model.node("C").unwrap();
        assert!(c.bulleted);
        assert_eq!(c.content, vec!["RecursiveTextSplitter", "Size: 1000", "Overlap: 200"]);
        assert_eq!(c.subgraph.as_deref(), Some("Step2"));
        assert_eq!(model.subgraph("Step2").unwrap().title.as_deref(), Some("Chunking"));

        let d = model.node("D").unwrap();
        assert_eq!(d.shape, NodeShape::Cylinder);
        assert!(!d.bulleted);

        assert_eq!(model.edges().len(), 2);
        assert_eq!(model.edges()[1].label.as_deref(), Some("vectors"));
        assert_eq!(model.directives(), ["class D store", "style D fill:#f9f"]);
    }

    #[test]
    fn forward_references_resolve_in_second_pass() {
        let model = parse("graph LR\nA --> B\nA[Load]\nB(Split)\n").unwrap();
        assert_eq!(model.direction(), "LR");
        assert_eq!(model.node("B").unwrap().shape, NodeShape::Rounded);
        assert_eq!(model.edges(), &[Edge::new("A", "B")]);
    }

    #[test]
    fn missing_header_is_an_error() {
        assert_eq!(parse("A[x] --> B[y]").unwrap_err(), ParseError::MissingHeader);
        assert_eq!(parse("").unwrap_err(), ParseError::MissingHeader);
    }

    #[test]
    fn undeclared_edge_endpoint_is_an_error() {
        let err = parse("flowchart TD\nA[x] --> B\n").unwrap_err();
        assert_eq!(err, ParseError::Model { line: 2, source: ModelError::UnknownNode("B".into()) });
    }

    #[test]
    fn truncated_inputs_are_rejected() {
        let cut_quote = "flowchart TD\nC[\"• Size: 1000<br/>• Over";
        assert!(matches!(parse(cut_quote), Err(ParseError::Truncated { line: 2, .. })));

        let cut_bracket = "flowchart TD\nC[Size: 1000";
        assert!(matches!(parse(cut_bracket), Err(ParseError::Truncated { .. })));

        let cut_edge = "flowchart TD\nA[x]\nA -->";
        assert!(matches!(parse(cut_edge), Err(ParseError::Truncated { what: "edge", .. })));

        let open_subgraph = "flowchart TD\nsubgraph S\nA[x]\n";
        assert_eq!(parse(open_subgraph).unwrap_err(), ParseError::UnclosedSubgraph("S".into()));
    }

    #[test]
    fn edge_variants() {
        let text = "flowchart TD\nA[a]\nB[b]\nC[c]\nA -- reads --> B\nB -.-> C\nA ==> C\nA --- C\n";
        let model = parse(text).unwrap();
        let styles: Vec<_> = model.edges().iter().map(|e| e.style).collect();
        assert_eq!(
            styles,
            [EdgeStyle::Arrow, EdgeStyle::Dotted, EdgeStyle::Thick, EdgeStyle::Open]
        );
        assert_eq!(model.edges()[0].label.as_deref(), Some("reads"));
    }

    #[test]
    fn ampersand_groups_fan_out() {
        let model = parse("flowchart TD\nA[a] & B[b] --> C[c]\n").unwrap();
        assert_eq!(model.edges(), &[Edge::new("A", "C"), Edge::new("B", "C")]);
    }

    #[test]
    fn bare_id_inside_subgraph_is_membership() {
        let model = parse("flowchart TD\nA[a]\nsubgraph S\nA\nend\n").unwrap();
        assert_eq!(model.subgraph("S").unwrap().members, vec!["A"]);
    }

    #[test]
    fn nested_subgraphs_record_parent() {
        let text = "flowchart TD\nsubgraph Outer\nsubgraph Inner\nA[a]\nend\nend\n";
        let model = parse(text).unwrap();
        assert_eq!(model.subgraph("Inner").unwrap().parent.as_deref(), Some("Outer"));
        assert_eq!(model.node("A").unwrap().subgraph.as_deref(), Some("Inner"));
    }

    #[test]
    fn conflicting_redeclaration_is_rejected_identical_is_not() {
        assert!(parse("flowchart TD\nA[x]\nA[x] --> B[y]\n").is_ok());
        assert_eq!(
            parse("flowchart TD\nA[x]\nA[z]\n").unwrap_err(),
            ParseError::ConflictingNode { line: 3, id: "A".into() }
        );
    }

    #[test]
    fn content_unescapes_quotes_and_br_variants() {
        let model = parse("flowchart TD\nA[\"say #quot;hi#quot;<br>two<br />three\"]\n").unwrap();
        assert_eq!(model.node("A").unwrap().content, vec!["say \"hi\"", "two", "three"]);
    }
}
