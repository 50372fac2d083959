//! [`DiagramModel`] to Mermaid flowchart text.

use std::fmt::Write as _;

use super::parser::ANNOTATION_IDS;
use super::{DiagramModel, DiagramNode, Edge};

const INDENT: &str = "    ";

/// Renders the model as flowchart text that [`super::parse`] reads back to an
/// equal model.
#[must_use]
pub fn serialize(model: &DiagramModel) -> String {
    let mut out = format!("flowchart {}\n", model.direction());

    let mut annotations = Vec::new();
    for (key, value) in model.metadata() {
        if ANNOTATION_IDS.contains(&key.as_str()) {
            annotations.push((key, value));
        } else {
            let _ = writeln!(out, "{INDENT}%% {key}: {}", value.replace('\n', " "));
        }
    }
    for (key, value) in annotations {
        let (open, close) = if key == "title" { ("(", ")") } else { ("[", "]") };
        let _ = writeln!(out, "{INDENT}{key}{open}\"{}\"{close}", escape(value));
    }

    let top_level: Vec<_> = model.subgraphs().filter(|s| s.parent.is_none()).collect();
    if !top_level.is_empty() {
        out.push('\n');
    }
    for group in top_level {
        write_subgraph(&mut out, model, &group.name, 1);
    }

    let loose: Vec<_> = model.nodes().filter(|n| n.subgraph.is_none()).collect();
    if !loose.is_empty() {
        out.push('\n');
    }
    for node in loose {
        let _ = writeln!(out, "{INDENT}{}", node_line(node));
    }

    if !model.edges().is_empty() {
        out.push('\n');
    }
    for edge in model.edges() {
        let _ = writeln!(out, "{INDENT}{}", edge_line(edge));
    }

    if !model.directives().is_empty() {
        out.push('\n');
    }
    for directive in model.directives() {
        let _ = writeln!(out, "{INDENT}{directive}");
    }
    out
}

fn write_subgraph(out: &mut String, model: &DiagramModel, name: &str, depth: usize) {
    let Some(group) = model.subgraph(name) else {
        return;
    };
    let pad = INDENT.repeat(depth);
    match &group.title {
        Some(title) => {
            let _ = writeln!(out, "{pad}subgraph {} [\"{}\"]", group.name, escape(title));
        }
        None => {
            let _ = writeln!(out, "{pad}subgraph {}", group.name);
        }
    }
    for member in &group.members {
        if let Some(node) = model.node(member) {
            let _ = writeln!(out, "{pad}{INDENT}{}", node_line(node));
        }
    }
    let children: Vec<_> = model
        .subgraphs()
        .filter(|s| s.parent.as_deref() == Some(name))
        .map(|s| s.name.clone())
        .collect();
    for child in children {
        write_subgraph(out, model, &child, depth + 1);
    }
    let _ = writeln!(out, "{pad}end");
}

/// The declaration line for one node, e.g. `C["• Size: 1000<br/>• Overlap: 200"]`.
///
/// Two nodes with equal rendering-relevant fields always produce the same line.
#[must_use]
pub fn node_line(node: &DiagramNode) -> String {
    let (open, close) = node.shape.delimiters();
    let body = node
        .content
        .iter()
        .map(|line| {
            if node.bulleted {
                format!("• {}", escape_line(line))
            } else {
                escape_line(line)
            }
        })
        .collect::<Vec<_>>()
        .join("<br/>");
    format!("{}{open}\"{body}\"{close}", node.id)
}

/// The line for one edge, e.g. `A -->|vectors| B`.
#[must_use]
pub fn edge_line(edge: &Edge) -> String {
    match &edge.label {
        Some(label) => {
            format!("{} {}|{}| {}", edge.source, edge.style.token(), escape(label), edge.target)
        }
        None => format!("{} {} {}", edge.source, edge.style.token(), edge.target),
    }
}

fn escape(text: &str) -> String {
    text.replace('"', "#quot;").replace('|', "#124;")
}

/// Escapes a node content line; a leading bullet becomes an entity so it is
/// not read back as list formatting.
fn escape_line(line: &str) -> String {
    match line.strip_prefix('•') {
        Some(rest) => format!("#8226;{}", escape(rest)),
        None => escape(line),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::diagram::{parse, EdgeStyle, NodeShape};

    fn sample() -> DiagramModel {
        let mut model =
            DiagramModel::new("LR").with_metadata("commit", "abc").with_metadata("title", "RAG");
        model.add_subgraph("Step1", Some("Ingest \"raw\"".into()), None).unwrap();
        model.add_subgraph("Inner", None, Some("Step1".into())).unwrap();
        model.add_node(DiagramNode::new("A", vec!["Read PDFs".into()])).unwrap();
        model
            .add_node(
                DiagramNode::new("B", vec!["Size: 1000".into(), "a|b".into()])
                    .with_shape(NodeShape::Hexagon),
            )
            .unwrap();
        model
            .add_node(
                DiagramNode::new("D", vec!["Pinecone".into()])
                    .with_shape(NodeShape::Cylinder)
                    .with_bullets(false),
            )
            .unwrap();
        model.add_member("Step1", "A").unwrap();
        model.add_member("Inner", "B").unwrap();
        model.add_edge(Edge::new("A", "B").with_label("chunks")).unwrap();
        model.add_edge(Edge { style: EdgeStyle::Dotted, ..Edge::new("B", "D") }).unwrap();
        model.push_directive("style D fill:#f9f");
        model
    }

    #[test]
    fn renders_nodes_quoted_with_bullets() {
        let text = serialize(&sample());
        assert!(text.starts_with("flowchart LR\n"));
        assert!(text.contains("%% commit: abc"));
        assert!(text.contains("title(\"RAG\")"));
        assert!(text.contains("B{{\"• Size: 1000<br/>• a#124;b\"}}"));
        assert!(text.contains("D[(\"Pinecone\")]"));
        assert!(text.contains("A -->|chunks| B"));
        assert!(text.contains("B -.-> D"));
        assert!(text.contains("subgraph Step1 [\"Ingest #quot;raw#quot;\"]"));
    }

    #[test]
    fn round_trips_the_sample() {
        let model = sample();
        assert_eq!(parse(&serialize(&model)).unwrap(), model);
    }

    #[test]
    fn leading_bullet_in_plain_node_survives() {
        let mut model = DiagramModel::new("TD");
        let node =
            DiagramNode::new("P", vec!["• step one".into(), "•two".into()]).with_bullets(false);
        model.add_node(node).unwrap();
        model.add_node(DiagramNode::new("Q", vec!["• nested".into()])).unwrap();

        let text = serialize(&model);
        assert!(text.contains("P[\"#8226; step one<br/>#8226;two\"]"));
        assert!(text.contains("Q[\"• #8226; nested\"]"));
        assert_eq!(parse(&text).unwrap(), model);
    }

    #[test]
    fn node_line_is_stable() {
        let node = DiagramNode::new("C", vec!["Size: 1000".into(), "Overlap: 200".into()]);
        assert_eq!(node_line(&node), "C[\"• Size: 1000<br/>• Overlap: 200\"]");
    }

    fn arb_line() -> impl Strategy<Value = String> {
        "•?[A-Za-z0-9•][A-Za-z0-9 :_.|\"•]{0,16}".prop_map(|s| s.trim_end().to_string())
    }

    fn arb_shape() -> impl Strategy<Value = NodeShape> {
        proptest::sample::select(NodeShape::BY_OPENING.to_vec())
    }

    fn arb_model() -> impl Strategy<Value = DiagramModel> {
        let nodes = proptest::collection::vec(
            (arb_shape(), proptest::collection::vec(arb_line(), 1..4), any::<bool>(), 0usize..3),
            1..8,
        );
        let edges = proptest::collection::vec(
            (0usize..8, 0usize..8, proptest::option::of("[a-z]{1,6}")),
            0..10,
        );
        (nodes, edges).prop_map(|(nodes, edges)| {
            let mut model = DiagramModel::new("TD");
            model.add_subgraph("G1", Some("Group one".into()), None).unwrap();
            model.add_subgraph("G2", None, Some("G1".into())).unwrap();
            for (i, (shape, content, bulleted, group)) in nodes.iter().enumerate() {
                let id = format!("N{i}");
                model
                    .add_node(
                        DiagramNode::new(&id, content.clone())
                            .with_shape(*shape)
                            .with_bullets(*bulleted),
                    )
                    .unwrap();
                match group {
                    1 => model.add_member("G1", &id).unwrap(),
                    2 => model.add_member("G2", &id).unwrap(),
                    _ => {}
                }
            }
            for (s, t, label) in edges {
                let (s, t) = (s % nodes.len(), t % nodes.len());
                if s != t {
                    let mut edge = Edge::new(format!("N{s}"), format!("N{t}"));
                    edge.label = label;
                    model.add_edge(edge).unwrap();
                }
            }
            model
        })
    }

    proptest! {
        #[test]
        fn serialize_then_parse_is_identity(model in arb_model()) {
            let reparsed = parse(&serialize(&model)).unwrap();
            prop_assert_eq!(&reparsed, &model);
            prop_assert_eq!(serialize(&reparsed), serialize(&model));
        }
    }
}
