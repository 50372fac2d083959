//! Prompt builders for classification, incremental and full generation.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::changes::diff::truncate;
use crate::changes::ChangeRecord;
use crate::diagram::{serialize, DiagramModel};
use crate::mapping::MappingResult;

/// Content characters shown per affected node in the incremental prompt.
const NODE_CONTENT_PREVIEW: usize = 150;

/// Optional pipeline description merged verbatim into generation prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineMetadata {
    /// Pipeline name, rendered as the diagram title.
    pub name: Option<String>,
    /// What the pipeline is for.
    pub purpose: Option<String>,
    /// Kind of data flowing through it.
    pub data_type: Option<String>,
    /// Where the data comes from.
    pub data_source: Option<String>,
    /// What consumes the output.
    pub use_case: Option<String>,
    /// Owning team or person.
    pub owner: Option<String>,
}

impl PipelineMetadata {
    /// Returns `true` if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().iter().all(|(_, value)| value.is_none())
    }

    fn fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("Pipeline Name", self.name.as_deref()),
            ("Purpose", self.purpose.as_deref()),
            ("Data Type", self.data_type.as_deref()),
            ("Data Source", self.data_source.as_deref()),
            ("Use Case", self.use_case.as_deref()),
            ("Owner", self.owner.as_deref()),
        ]
    }
}

/// The metadata block appended to generation prompts; empty when nothing is set.
#[must_use]
pub fn metadata_section(metadata: &PipelineMetadata) -> String {
    if metadata.is_empty() {
        return String::new();
    }
    let mut section = String::from("PIPELINE METADATA (use this context to enrich the diagram):\n");
    for (label, value) in metadata.fields() {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let _ = writeln!(section, "- {label}: {value}");
        }
    }
    section
}

/// Asks the model to classify a diff into pipeline change records.
#[must_use]
pub fn classification(diff: &str) -> String {
    let mut prompt = String::from(
        "You are reviewing a code diff from a data pipeline repository. Identify every change \
         that alters what the pipeline does, not formatting or comments.\n\n\
         Components: Ingestion, Chunking, Embedding, Vector DB, Storage, Database, Processing, \
         Cache, API.\n\
         Change types: config_update, method_change, new_component, removed_component, \
         flow_change.\n\n",
    );
    prompt.push_str("## Diff\n\n");
    prompt.push_str(diff);
    if !diff.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str(
        "\n## Instructions\n\n\
         Respond with JSON only:\n\
         {\n  \
           \"changes\": [\n    \
             {\n      \
               \"component\": \"Chunking\",\n      \
               \"type\": \"config_update\",\n      \
               \"field\": \"chunk_size\",\n      \
               \"old_value\": \"1000\",\n      \
               \"new_value\": \"1500\",\n      \
               \"impact\": \"One sentence on what this changes\",\n      \
               \"affected_nodes\": [\"chunking\", \"splitter\"]\n    \
             }\n  \
           ],\n  \
           \"summary\": \"One line overview\"\n\
         }\n\n\
         - Use \"N/A\" for a value that does not exist on one side.\n\
         - `affected_nodes` are lowercase words likely to appear in the diagram boxes.\n\
         - Return an empty `changes` array if nothing functional changed.\n",
    );
    prompt
}

/// Locked-template prompt: the existing flowchart may only change inside the
/// affected nodes.
#[must_use]
pub fn incremental(
    model: &DiagramModel,
    mapping: &MappingResult,
    changes: &[ChangeRecord],
    diff: &str,
    max_diff_chars: usize,
) -> String {
    let mut prompt = String::from(
        "You are updating an existing Mermaid flowchart after a small code change. The \
         diagram below is a LOCKED TEMPLATE.\n\n\
         Rules:\n\
         1. Keep the structure: every subgraph, node id, shape and edge stays as it is.\n\
         2. Rewrite only the content of the affected nodes listed below.\n\
         3. Do not add or remove nodes or connections.\n\
         4. Copy every other node character for character.\n\
         5. Put the actual new values from the code into the affected nodes.\n\n",
    );

    prompt.push_str("## Existing diagram\n\n");
    prompt.push_str(&serialize(model));

    let ids: Vec<&str> = mapping.affected_node_ids.iter().map(String::as_str).collect();
    let _ = writeln!(prompt, "\n## Affected nodes\n\n{}\n", ids.join(", "));

    prompt.push_str("## Node details\n\n");
    for id in &ids {
        let Some(node) = model.node(id) else {
            continue;
        };
        let content: String = node.content.join(" | ").chars().take(NODE_CONTENT_PREVIEW).collect();
        let _ = writeln!(prompt, "### {id}");
        let _ = writeln!(prompt, "- Content: {content}");
        if let Some(group) = node.subgraph.as_deref() {
            let title = model.subgraph(group).and_then(|s| s.title.as_deref()).unwrap_or(group);
            let _ = writeln!(prompt, "- Subgraph: {title}");
        }
        let incoming = model.incoming(id);
        if !incoming.is_empty() {
            let _ = writeln!(prompt, "- From: {}", incoming.join(", "));
        }
        let outgoing = model.outgoing(id);
        if !outgoing.is_empty() {
            let _ = writeln!(prompt, "- To: {}", outgoing.join(", "));
        }
        for reason in mapping.rationale.get(*id).into_iter().flatten() {
            let Some(record) = changes.get(reason.record_index) else {
                continue;
            };
            let _ = writeln!(
                prompt,
                "- Matched `{}` ({:?}) for {} {}: {} -> {}",
                reason.matched_term,
                reason.strategy,
                record.component,
                record.field,
                record.old_value.as_deref().unwrap_or("N/A"),
                record.new_value.as_deref().unwrap_or("N/A"),
            );
        }
        prompt.push('\n');
    }

    if !changes.is_empty() {
        prompt.push_str("## Changes\n\n");
        for record in changes {
            let _ = writeln!(
                prompt,
                "- [{}] {} `{}`: {}",
                record.change_type, record.component, record.field, record.impact_note
            );
        }
        prompt.push('\n');
    }

    prompt.push_str("## Code changes\n\n```diff\n");
    prompt.push_str(&truncate(diff, max_diff_chars));
    prompt.push_str(
        "\n```\n\n\
         ## Task\n\n\
         Return the complete flowchart with only the affected nodes rewritten. For example, if \
         `chunk_size` went from 1000 to 1500, a line `• Size: 1000` becomes `• Size: 1500` and \
         nothing else moves.\n\
         Output only the Mermaid code.\n",
    );
    prompt
}

/// Unconstrained prompt generating a whole diagram from a project summary.
#[must_use]
pub fn full(summary: &str, metadata: &PipelineMetadata) -> String {
    let mut prompt = String::from(
        "You are a technical documentation specialist. Turn the code trace below into a Mermaid \
         flowchart that an engineer can read to understand how data moves through the \
         pipeline.\n\n",
    );

    let section = metadata_section(metadata);
    if !section.is_empty() {
        prompt.push_str(&section);
        prompt.push_str(
            "\nHow to use the metadata:\n\
             - Pipeline Name goes in a `title(\"...\")` node.\n\
             - Purpose goes in a `purpose[\"Purpose: ...\"]` node.\n\
             - Data Type and Data Source belong in the first ingestion node.\n\
             - Use Case belongs in the final node.\n\
             - Owner goes in a `note[\"Owner: ...\"]` node.\n\n",
        );
    }

    prompt.push_str(
        "Extraction rules:\n\
         - Use literal values from the code: model names, sizes, bucket and index names.\n\
         - Name configuration and environment keys when values come from them.\n\
         - Mention the library call that does the work (e.g. `RecursiveCharacterTextSplitter`).\n\n\
         Output format:\n\
         - Start with `flowchart TD`.\n\
         - Group steps in subgraphs such as `subgraph Step1_Ingestion [\"Ingestion\"]`.\n\
         - Each node holds 2-3 short bullets starting with `•`, separated by `<br/>`.\n\
         - Use the cylinder shape `[(...)]` for storage and databases.\n\
         - Connect every node; no orphans.\n\n\
         Good node: `C[\"• RecursiveCharacterTextSplitter<br/>\
         • Size: 1000<br/>• Overlap: 200\"]`\n\
         Bad node: `C[Split text into chunks]`\n\n",
    );

    prompt.push_str("## Code trace\n\n");
    prompt.push_str(summary);
    if !summary.ends_with('\n') {
        prompt.push('\n');
    }
    prompt.push_str("\nOutput only the Mermaid code.\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeType;
    use crate::config::{KeywordTable, MappingConfig};
    use crate::diagram::parse;
    use crate::mapping::ChangeMapper;

    const DIAGRAM: &str = r#"flowchart TD
    subgraph Step2_Chunking ["Chunking"]
        C["• Splitter<br/>• Size: 1000"]
    end
    A["• Load PDFs"] --> C --> E["• Embed"]
"#;

    fn chunk_change() -> ChangeRecord {
        ChangeRecord {
            component: "Chunking".into(),
            change_type: ChangeType::ConfigUpdate,
            field: "chunk_size".into(),
            old_value: Some("1000".into()),
            new_value: Some("1500".into()),
            impact_note: "bigger chunks".into(),
            suggested_node_hints: Vec::new(),
        }
    }

    #[test]
    fn metadata_section_lists_only_set_fields() {
        let metadata = PipelineMetadata {
            name: Some("Docs RAG".into()),
            owner: Some("search-team".into()),
            ..PipelineMetadata::default()
        };
        let section = metadata_section(&metadata);
        assert!(section.contains("- Pipeline Name: Docs RAG"));
        assert!(section.contains("- Owner: search-team"));
        assert!(!section.contains("Purpose:"));
        assert!(metadata_section(&PipelineMetadata::default()).is_empty());
    }

    #[test]
    fn incremental_prompt_carries_template_and_node_context() {
        let model = parse(DIAGRAM).unwrap();
        let changes = [chunk_change()];
        let (config, keywords) = (MappingConfig::default(), KeywordTable::default());
        let mapping = ChangeMapper::new(&config, &keywords).map(&changes, &model);
        let diff = "-chunk_size = 1000\n+chunk_size = 1500\n".repeat(200);
        let prompt = incremental(&model, &mapping, &changes, &diff, 100);

        assert!(prompt.contains(&serialize(&model)));
        assert!(prompt.contains("## Affected nodes\n\nC\n"));
        assert!(prompt.contains("- Subgraph: Chunking"));
        assert!(prompt.contains("- From: A"));
        assert!(prompt.contains("- To: E"));
        assert!(prompt.contains("1000 -> 1500"));
        assert!(prompt.contains("(diff truncated for length)"));
    }

    #[test]
    fn full_prompt_includes_metadata_rules_only_when_present() {
        let bare = full("src/app.py: def main()", &PipelineMetadata::default());
        assert!(bare.contains("src/app.py: def main()"));
        assert!(!bare.contains("PIPELINE METADATA"));

        let metadata =
            PipelineMetadata { purpose: Some("search".into()), ..PipelineMetadata::default() };
        let with = full("trace", &metadata);
        assert!(with.contains("- Purpose: search"));
        assert!(with.contains("purpose[\"Purpose: ...\"]"));
    }

    #[test]
    fn classification_prompt_embeds_diff() {
        let prompt = classification("+x = 1");
        assert!(prompt.contains("+x = 1\n"));
        assert!(prompt.contains("config_update"));
    }
}
