//! Turning a raw diff into structured change records.
//!
//! Two extractors implement [`ChangeExtractor`]: a keyword heuristic that
//! needs nothing but the diff, and a semantic one that asks the generation
//! collaborator. [`extract`] picks one and downgrades from semantic to
//! heuristic when classification fails.

pub mod diff;
pub mod heuristic;
pub mod semantic;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::generate::GenerationError;

pub use heuristic::HeuristicExtractor;
pub use semantic::SemanticExtractor;

/// Kind of change a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeType {
    /// A configuration value changed.
    ConfigUpdate,
    /// An algorithm or method was swapped.
    MethodChange,
    /// A pipeline component was added.
    NewComponent,
    /// A pipeline component was removed.
    RemovedComponent,
    /// Data flow between components changed.
    FlowChange,
}

impl ChangeType {
    /// Canonical kebab-case name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigUpdate => "config-update",
            Self::MethodChange => "method-change",
            Self::NewComponent => "new-component",
            Self::RemovedComponent => "removed-component",
            Self::FlowChange => "flow-change",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeType {
    type Err = String;

    /// Accepts `config-update`, `config_update`, `Config Update`, ...
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let canonical: String = s
            .trim()
            .chars()
            .map(|c| if c == '_' || c == ' ' { '-' } else { c.to_ascii_lowercase() })
            .collect();
        match canonical.as_str() {
            "config-update" => Ok(Self::ConfigUpdate),
            "method-change" => Ok(Self::MethodChange),
            "new-component" => Ok(Self::NewComponent),
            "removed-component" => Ok(Self::RemovedComponent),
            "flow-change" => Ok(Self::FlowChange),
            _ => Err(format!("unknown change type `{s}`")),
        }
    }
}

/// One semantic change found in a diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Pipeline component the change belongs to, e.g. `Chunking`.
    pub component: String,
    /// What kind of change this is.
    pub change_type: ChangeType,
    /// Field or parameter that changed, e.g. `chunk_size`.
    pub field: String,
    /// Previous value, if there was one.
    pub old_value: Option<String>,
    /// New value, if there is one.
    pub new_value: Option<String>,
    /// Short description of what the change means.
    pub impact_note: String,
    /// Lowercase keywords likely to appear in affected nodes.
    pub suggested_node_hints: Vec<String>,
}

/// Normalises a reported value: blanks and `N/A` mean absent.
#[must_use]
pub fn normalize_value(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("n/a") {
        None
    } else {
        Some(value.to_string())
    }
}

/// Which extractor to prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keyword matching over assignment-like lines.
    Heuristic,
    /// Classification by the generation collaborator.
    #[default]
    Semantic,
}

/// Extraction failures. Both variants trigger the downgrade to heuristic.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The collaborator answered, but not with usable change records.
    #[error("classification failed: {0}")]
    Classification(String),
    /// The collaborator could not be reached or timed out.
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

/// Boxed future returned by [`ChangeExtractor::extract`].
pub type ExtractFuture<'a> =
    Pin<Box<dyn Future<Output = Result<Vec<ChangeRecord>, ExtractError>> + 'a>>;

/// Produces change records from a (pre-filtered) unified diff.
pub trait ChangeExtractor {
    /// Which strategy this extractor implements.
    fn strategy(&self) -> Strategy;

    /// Extracts change records from the diff text.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the records cannot be produced.
    fn extract<'a>(&'a self, diff: &'a str) -> ExtractFuture<'a>;
}

/// Outcome of [`extract`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// Records found, in diff order.
    pub records: Vec<ChangeRecord>,
    /// Strategy that produced them.
    pub strategy: Strategy,
    /// Why the semantic strategy was abandoned, if it was.
    pub downgrade_reason: Option<String>,
}

/// Extracts change records, preferring `hint` and downgrading to the
/// heuristic extractor when semantic classification is unavailable or fails.
///
/// `diff` must already be restricted to supported source files; an empty diff
/// yields no records without consulting either extractor.
///
/// # Errors
///
/// Returns an error only if the heuristic extractor itself fails.
pub async fn extract(
    diff: &str,
    hint: Strategy,
    heuristic: &dyn ChangeExtractor,
    semantic: Option<&dyn ChangeExtractor>,
) -> Result<Extraction, ExtractError> {
    if diff.trim().is_empty() {
        return Ok(Extraction { records: Vec::new(), strategy: hint, downgrade_reason: None });
    }

    let mut downgrade_reason = None;
    if hint == Strategy::Semantic {
        match semantic {
            Some(extractor) => match extractor.extract(diff).await {
                Ok(records) => {
                    log::debug!(count = records.len(); "semantic extraction succeeded");
                    return Ok(Extraction {
                        records,
                        strategy: extractor.strategy(),
                        downgrade_reason,
                    });
                }
                Err(err) => {
                    log::warn!(
                        err:err;
                        "semantic classification failed, using heuristic extraction"
                    );
                    downgrade_reason = Some(err.to_string());
                }
            },
            None => downgrade_reason = Some("no generation collaborator available".into()),
        }
    }

    let records = heuristic.extract(diff).await?;
    log::debug!(count = records.len(); "heuristic extraction finished");
    Ok(Extraction { records, strategy: heuristic.strategy(), downgrade_reason })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KeywordTable;

    struct Failing;

    impl ChangeExtractor for Failing {
        fn strategy(&self) -> Strategy {
            Strategy::Semantic
        }

        fn extract<'a>(&'a self, _diff: &'a str) -> ExtractFuture<'a> {
            Box::pin(async { Err(ExtractError::Classification("not json".into())) })
        }
    }

    const DIFF: &str =
        "--- a/app.py\n+++ b/app.py\n@@ -1 +1 @@\n-chunk_size = 1000\n+chunk_size = 1500\n";

    #[test]
    fn change_type_parses_loosely() {
        assert_eq!("config_update".parse::<ChangeType>().unwrap(), ChangeType::ConfigUpdate);
        assert_eq!("Flow Change".parse::<ChangeType>().unwrap(), ChangeType::FlowChange);
        assert!("rewrite".parse::<ChangeType>().is_err());
    }

    #[test]
    fn na_values_are_absent() {
        assert_eq!(normalize_value(Some("N/A")), None);
        assert_eq!(normalize_value(Some("  ")), None);
        assert_eq!(normalize_value(Some(" 1500 ")), Some("1500".into()));
        assert_eq!(normalize_value(None), None);
    }

    #[tokio::test]
    async fn failing_semantic_downgrades_to_heuristic() {
        let table = KeywordTable::default();
        let heuristic = HeuristicExtractor::new(&table);
        let failing = Some(&Failing as &dyn ChangeExtractor);
        let extraction = extract(DIFF, Strategy::Semantic, &heuristic, failing).await.unwrap();
        assert_eq!(extraction.strategy, Strategy::Heuristic);
        assert!(extraction.downgrade_reason.unwrap().contains("not json"));
        assert_eq!(extraction.records.len(), 1);
        assert_eq!(extraction.records[0].field, "chunk_size");
    }

    #[tokio::test]
    async fn missing_semantic_extractor_downgrades() {
        let table = KeywordTable::default();
        let heuristic = HeuristicExtractor::new(&table);
        let extraction = extract(DIFF, Strategy::Semantic, &heuristic, None).await.unwrap();
        assert_eq!(extraction.strategy, Strategy::Heuristic);
        assert!(extraction.downgrade_reason.is_some());
    }

    #[tokio::test]
    async fn empty_diff_yields_nothing() {
        let table = KeywordTable::default();
        let heuristic = HeuristicExtractor::new(&table);
        let failing = Some(&Failing as &dyn ChangeExtractor);
        let extraction = extract("  \n", Strategy::Semantic, &heuristic, failing).await.unwrap();
        assert!(extraction.records.is_empty());
        assert!(extraction.downgrade_reason.is_none());
    }
}
