//! Mapping change records onto diagram nodes.
//!
//! Each record is tried against the configured strategies in order; the
//! first strategy that matches anything decides the record's nodes (with
//! `seed` hint precedence, hint matches are also kept and the next firing
//! strategy is added to them). The result is the union over all records.

pub mod impact;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::changes::ChangeRecord;
use crate::config::{
    normalize, Category, HintPrecedence, KeywordTable, MappingConfig, MappingStrategy,
};
use crate::diagram::{DiagramModel, DiagramNode};

pub use impact::{score, ImpactAssessment, ImpactLevel};

/// Why a node was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchReason {
    /// Index of the change record in the input sequence.
    pub record_index: usize,
    /// Strategy that matched.
    pub strategy: MappingStrategy,
    /// The hint, keyword, subgraph or field text that matched.
    pub matched_term: String,
}

/// Nodes affected by a change set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MappingResult {
    /// Affected node ids, in order of first selection.
    pub affected_node_ids: IndexSet<String>,
    /// Per-node reasons.
    pub rationale: IndexMap<String, Vec<MatchReason>>,
    /// Records that matched no node.
    pub unmapped: Vec<ChangeRecord>,
}

impl MappingResult {
    /// Number of affected nodes.
    #[must_use]
    pub fn affected_count(&self) -> usize {
        self.affected_node_ids.len()
    }

    /// Returns `true` if `id` is affected.
    #[must_use]
    pub fn is_affected(&self, id: &str) -> bool {
        self.affected_node_ids.contains(id)
    }

    fn add(&mut self, node_id: &str, reason: MatchReason) {
        self.affected_node_ids.insert(node_id.to_string());
        let reasons = self.rationale.entry(node_id.to_string()).or_default();
        if !reasons.contains(&reason) {
            reasons.push(reason);
        }
    }
}

/// Maps change records to nodes using configured strategies and keywords.
pub struct ChangeMapper<'a> {
    config: &'a MappingConfig,
    keywords: &'a KeywordTable,
}

type Hits = Vec<(String, String)>;

impl<'a> ChangeMapper<'a> {
    /// Creates a mapper.
    #[must_use]
    pub fn new(config: &'a MappingConfig, keywords: &'a KeywordTable) -> Self {
        Self { config, keywords }
    }

    /// Maps every record onto the model's nodes.
    #[must_use]
    pub fn map(&self, changes: &[ChangeRecord], model: &DiagramModel) -> MappingResult {
        let mut result = MappingResult::default();
        for (index, record) in changes.iter().enumerate() {
            let mut matched_any = false;
            for &strategy in &self.config.order {
                let hits = match strategy {
                    MappingStrategy::Hint => self.by_hint(record, model),
                    MappingStrategy::Component => self.by_component(record, model),
                    MappingStrategy::Field => self.by_field(record, model),
                };
                if hits.is_empty() {
                    continue;
                }
                matched_any = true;
                for (node_id, term) in hits {
                    let reason = MatchReason { record_index: index, strategy, matched_term: term };
                    result.add(&node_id, reason);
                }
                let keep_going = strategy == MappingStrategy::Hint
                    && self.config.hint_precedence == HintPrecedence::Seed;
                if !keep_going {
                    break;
                }
            }
            if matched_any {
                log::debug!(record = index, field = record.field.as_str(); "change mapped");
            } else {
                log::info!(
                    component = record.component.as_str(),
                    field = record.field.as_str();
                    "change matched no diagram node"
                );
                result.unmapped.push(record.clone());
            }
        }
        result
    }

    fn by_hint(&self, record: &ChangeRecord, model: &DiagramModel) -> Hits {
        let hints: Vec<String> = record
            .suggested_node_hints
            .iter()
            .map(|h| h.trim().to_lowercase())
            .filter(|h| h.chars().count() >= self.config.min_hint_len)
            .collect();
        each_node(model, |node| {
            let text = node.searchable_text();
            let id = node.id.to_lowercase();
            hints.iter().find(|h| text.contains(h.as_str()) || id.contains(h.as_str())).cloned()
        })
    }

    fn by_component(&self, record: &ChangeRecord, model: &DiagramModel) -> Hits {
        let Some(category) = self.keywords.resolve(&record.component) else {
            return Vec::new();
        };
        let category_name = normalize(&category.name);
        each_node(model, |node| {
            let text = node.searchable_text();
            let hit = category.keywords.iter().find(|k| text.contains(&k.to_lowercase()));
            if let Some(keyword) = hit {
                return Some(keyword.clone());
            }
            let group = model.subgraph(node.subgraph.as_deref()?)?;
            let labels = [Some(group.name.as_str()), group.title.as_deref()];
            labels
                .into_iter()
                .flatten()
                .find(|label| {
                    !category_name.is_empty() && normalize(label).contains(&category_name)
                })
                .map(str::to_string)
        })
    }

    fn by_field(&self, record: &ChangeRecord, model: &DiagramModel) -> Hits {
        let field = record.field.trim();
        if field.is_empty() {
            return Vec::new();
        }
        let literal = field.to_lowercase();
        let spaced = spaced_form(field);
        let category = self
            .keywords
            .resolve(&record.component)
            .or_else(|| self.keywords.classify(field));
        let label_word = category.and_then(|c| descriptor(&literal, c));

        each_node(model, |node| {
            let text = node.searchable_text();
            if text.contains(&literal) {
                return Some(literal.clone());
            }
            if spaced != literal && text.contains(&spaced) {
                return Some(spaced.clone());
            }
            let label = format!("{}:", label_word.as_ref()?);
            node.content
                .iter()
                .any(|line| line.trim().to_lowercase().starts_with(&label))
                .then(|| label.clone())
        })
    }
}

fn each_node(
    model: &DiagramModel,
    mut matcher: impl FnMut(&DiagramNode) -> Option<String>,
) -> Hits {
    model.nodes().filter_map(|node| matcher(node).map(|term| (node.id.clone(), term))).collect()
}

/// `chunk_size` / `chunkSize` / `chunk-size` → `chunk size`.
fn spaced_form(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    let mut prev_lower = false;
    for c in field.chars() {
        if c == '_' || c == '-' {
            out.push(' ');
            prev_lower = false;
        } else if c.is_uppercase() && prev_lower {
            out.push(' ');
            out.extend(c.to_lowercase());
            prev_lower = false;
        } else {
            out.extend(c.to_lowercase());
            prev_lower = c.is_lowercase() || c.is_ascii_digit();
        }
    }
    out
}

/// The field minus its longest category-keyword prefix: `chunk_size` → `size`.
fn descriptor(field: &str, category: &Category) -> Option<String> {
    let mut keywords: Vec<String> = category.keywords.iter().map(|k| k.to_lowercase()).collect();
    keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));
    keywords.iter().find_map(|k| {
        let rest = field.strip_prefix(k.as_str())?.trim_start_matches(['_', '-', ' ']);
        (!rest.is_empty()).then(|| spaced_form(rest))
    })
}
