//! Semantic classification through the generation collaborator.

use serde::Deserialize;
use serde_json::Value;

use super::diff::truncate;
use super::{
    normalize_value, ChangeExtractor, ChangeRecord, ChangeType, ExtractError, ExtractFuture,
    Strategy,
};
use crate::generate::{strip_code_fences, Generator};

/// Asks the collaborator to classify a (truncated) diff.
pub struct SemanticExtractor<'a> {
    generator: &'a Generator<'a>,
    max_diff_chars: usize,
}

impl<'a> SemanticExtractor<'a> {
    /// Creates an extractor sending at most `max_diff_chars` of diff.
    #[must_use]
    pub fn new(generator: &'a Generator<'a>, max_diff_chars: usize) -> Self {
        Self { generator, max_diff_chars }
    }
}

impl ChangeExtractor for SemanticExtractor<'_> {
    fn strategy(&self) -> Strategy {
        Strategy::Semantic
    }

    fn extract<'b>(&'b self, diff: &'b str) -> ExtractFuture<'b> {
        Box::pin(async move {
            let diff = truncate(diff, self.max_diff_chars);
            self.generator.classify(&diff).await
        })
    }
}

#[derive(Deserialize)]
struct RawChange {
    #[serde(default)]
    component: String,
    #[serde(rename = "type", alias = "change_type")]
    change_type: String,
    #[serde(default)]
    field: Option<Value>,
    #[serde(default)]
    old_value: Option<Value>,
    #[serde(default)]
    new_value: Option<Value>,
    #[serde(default, alias = "impact_note")]
    impact: Option<String>,
    #[serde(default, alias = "suggested_node_hints")]
    affected_nodes: Vec<String>,
}

/// Parses the collaborator's classification answer.
///
/// Accepts an object with a `changes` array or a bare array, optionally
/// wrapped in a markdown code fence or surrounded by prose.
///
/// # Errors
///
/// Returns [`ExtractError::Classification`] if no JSON is found, the shape is
/// wrong, or any entry has an unknown change type.
pub fn parse_classification(raw: &str) -> Result<Vec<ChangeRecord>, ExtractError> {
    let body = strip_code_fences(raw);
    let json = json_slice(&body).ok_or_else(|| {
        ExtractError::Classification(format!("no JSON found in response: {}", preview(raw)))
    })?;
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ExtractError::Classification(format!("invalid JSON: {e}")))?;

    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("changes") {
            Some(Value::Array(items)) => {
                if let Some(Value::String(summary)) = map.get("summary") {
                    log::info!(summary = summary.as_str(); "semantic diff summary");
                }
                items
            }
            Some(_) => return Err(ExtractError::Classification("`changes` is not an array".into())),
            None => {
                return Err(ExtractError::Classification("object has no `changes` array".into()));
            }
        },
        _ => return Err(ExtractError::Classification("expected a JSON object or array".into())),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(i, entry)| {
            let raw: RawChange = serde_json::from_value(entry)
                .map_err(|e| ExtractError::Classification(format!("change {i}: {e}")))?;
            let change_type = raw
                .change_type
                .parse::<ChangeType>()
                .map_err(|e| ExtractError::Classification(format!("change {i}: {e}")))?;
            Ok(ChangeRecord {
                component: raw.component.trim().to_string(),
                change_type,
                field: scalar(raw.field.as_ref()).unwrap_or_default(),
                old_value: normalize_value(scalar(raw.old_value.as_ref()).as_deref()),
                new_value: normalize_value(scalar(raw.new_value.as_ref()).as_deref()),
                impact_note: raw.impact.unwrap_or_default(),
                suggested_node_hints: raw
                    .affected_nodes
                    .into_iter()
                    .map(|h| h.trim().to_lowercase())
                    .filter(|h| !h.is_empty())
                    .collect(),
            })
        })
        .collect()
}

/// Renders a JSON scalar as plain text; `null` is absent.
fn scalar(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// The outermost `{...}` or `[...]` span, whichever starts first.
fn json_slice(text: &str) -> Option<&str> {
    let start = text.find(['{', '['])?;
    let close = if text[start..].starts_with('{') { '}' } else { ']' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
