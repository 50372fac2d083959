//! Keyword heuristic: pair removed and added assignments by identifier.

use indexmap::IndexMap;

use super::diff::split_files;
use super::{ChangeExtractor, ChangeRecord, ChangeType, ExtractFuture, Strategy};
use crate::config::KeywordTable;

/// Bytes that turn a following `=` into part of a comparison or compound operator.
const OPERATOR_BYTES: [u8; 13] =
    [b'=', b'!', b'<', b'>', b':', b'+', b'-', b'*', b'/', b'%', b'&', b'|', b'^'];

/// Extracts `config-update` records from assignment-like diff lines.
pub struct HeuristicExtractor<'a> {
    keywords: &'a KeywordTable,
}

impl<'a> HeuristicExtractor<'a> {
    /// Creates an extractor classifying identifiers with `keywords`.
    #[must_use]
    pub fn new(keywords: &'a KeywordTable) -> Self {
        Self { keywords }
    }

    /// Synchronous core of the extractor.
    #[must_use]
    pub fn records(&self, diff: &str) -> Vec<ChangeRecord> {
        let mut records = Vec::new();
        for file in split_files(diff) {
            let before = first_values(&file.removed);
            let after = first_values(&file.added);
            for (field, new) in &after {
                let Some(old) = before.get(field) else {
                    continue;
                };
                if old == new {
                    continue;
                }
                let Some(category) = self.keywords.classify(field) else {
                    log::debug!(
                        field = field.as_str(),
                        path = file.path.as_str();
                        "skipping unclassified identifier"
                    );
                    continue;
                };
                records.push(ChangeRecord {
                    component: category.name.clone(),
                    change_type: ChangeType::ConfigUpdate,
                    field: field.clone(),
                    old_value: Some(old.clone()),
                    new_value: Some(new.clone()),
                    impact_note: format!("{field} changed from {old} to {new} in {}", file.path),
                    suggested_node_hints: category.hints(),
                });
            }
        }
        records
    }
}

impl ChangeExtractor for HeuristicExtractor<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Heuristic
    }

    fn extract<'b>(&'b self, diff: &'b str) -> ExtractFuture<'b> {
        Box::pin(async move { Ok(self.records(diff)) })
    }
}

/// First value seen for each identifier, in order of first appearance.
fn first_values(lines: &[String]) -> IndexMap<String, String> {
    let mut values = IndexMap::new();
    for line in lines {
        for (name, value) in assignments(line) {
            values.entry(name).or_insert(value);
        }
    }
    values
}

/// Finds `name = value`, `name: value` and keyword-argument `name=value`
/// pairs in a single source line.
pub(crate) fn assignments(line: &str) -> Vec<(String, String)> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with("//") {
        return Vec::new();
    }

    let bytes = trimmed.as_bytes();
    let mut found = Vec::new();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'=' {
            continue;
        }
        let prev = i.checked_sub(1).map(|p| bytes[p]);
        let next = bytes.get(i + 1).copied();
        let compound = prev.is_some_and(|p| OPERATOR_BYTES.contains(&p));
        if compound || matches!(next, Some(b'=' | b'>')) {
            continue;
        }
        let Some(name) = target_name(&trimmed[..i]) else {
            continue;
        };
        let value = value_at(&trimmed[i + 1..]);
        if !value.is_empty() {
            found.push((name, value));
        }
    }

    if found.is_empty() {
        if let Some((key, rest)) = trimmed.split_once(':') {
            let key = key.trim().trim_matches(|c| c == '"' || c == '\'');
            if is_identifier(key) {
                let value = value_at(rest);
                if !value.is_empty() {
                    found.push((key.to_string(), value));
                }
            }
        }
    }
    found
}

/// The assigned identifier in the text before an `=`: the last identifier of
/// the segment after the nearest `(`, `,` or `{`, ignoring a type annotation.
fn target_name(before: &str) -> Option<String> {
    let segment = before.rsplit(['(', ',', '{']).next().unwrap_or(before);
    let segment = segment.split(':').next().unwrap_or(segment).trim_end();
    let name: String = segment
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    let starts_ok = name.chars().next().is_some_and(|c| c.is_alphabetic() || c == '_');
    (starts_ok && !segment.trim_end().ends_with('.')).then_some(name)
}

/// The value text up to the first top-level `,` / `;` / unmatched closer.
fn value_at(rest: &str) -> String {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut end = rest.len();
    for (i, c) in rest.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth == 0 => {
                end = i;
                break;
            }
            ')' | ']' | '}' => depth -= 1,
            ',' | ';' if depth == 0 => {
                end = i;
                break;
            }
            '#' if depth == 0 => {
                end = i;
                break;
            }
            _ => {}
        }
    }
    rest[..end].trim().to_string()
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}
