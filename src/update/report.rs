//! Run report: what the orchestrator decided and why.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::changes::{ChangeRecord, Strategy};
use crate::mapping::{ImpactAssessment, ImpactLevel, MappingResult};

use super::{Mode, State};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// The artifact was rewritten.
    Written,
    /// Nothing needed to change; the artifact was left alone.
    NoOp,
    /// Only the decision was computed.
    Planned,
    /// No valid diagram could be produced; the artifact was left alone.
    Failed,
}

/// One state change of the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    /// State left.
    pub from: State,
    /// State entered.
    pub to: State,
    /// Human-readable cause.
    pub reason: String,
}

/// Everything a run decided, serializable as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Diagram artifact.
    pub diagram: PathBuf,
    /// Revision changes were computed against, if any.
    pub reference: Option<String>,
    /// Generation mode finally used (after any fallback).
    pub mode_used: Option<Mode>,
    /// How the run ended.
    pub outcome: Outcome,
    /// Nodes selected by the mapper.
    pub affected_node_count: usize,
    /// Impact bucket; `none` when nothing was scored.
    pub impact_level: ImpactLevel,
    /// Full impact score, when one was computed.
    pub impact: Option<ImpactAssessment>,
    /// Supported files that changed since the reference.
    pub changed_files: Vec<String>,
    /// Extraction strategy that produced `changes`.
    pub extraction_strategy: Option<Strategy>,
    /// Change records found.
    pub changes: Vec<ChangeRecord>,
    /// Mapping of changes onto nodes.
    pub mapping: Option<MappingResult>,
    /// Reasons each fallback was taken, in order.
    pub fallback_reasons: Vec<String>,
    /// Every state change, in order.
    pub transitions: Vec<Transition>,
}

impl RunReport {
    /// An empty report for a run starting now.
    #[must_use]
    pub fn new(started_at: DateTime<Utc>, diagram: PathBuf) -> Self {
        Self {
            started_at,
            diagram,
            reference: None,
            mode_used: None,
            outcome: Outcome::NoOp,
            affected_node_count: 0,
            impact_level: ImpactLevel::None,
            impact: None,
            changed_files: Vec::new(),
            extraction_strategy: None,
            changes: Vec::new(),
            mapping: None,
            fallback_reasons: Vec::new(),
            transitions: Vec::new(),
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Short human-readable summary.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let mode = self.mode_used.map_or_else(|| "-".to_string(), |m| m.to_string());
        let outcome = match self.outcome {
            Outcome::Written => "written",
            Outcome::NoOp => "no-op",
            Outcome::Planned => "planned",
            Outcome::Failed => "failed",
        };
        let _ = writeln!(out, "Diagram:  {}", self.diagram.display());
        let _ = writeln!(out, "Outcome:  {outcome} (mode: {mode})");
        if let Some(reference) = &self.reference {
            let changed = self.changed_files.len();
            let _ = writeln!(out, "Since:    {reference} ({changed} changed files)");
        }
        if let Some(impact) = &self.impact {
            let _ = writeln!(
                out,
                "Impact:   {} ({}/{} nodes, {:.1}%)",
                impact.level,
                impact.affected_count,
                impact.total_count,
                impact.percentage * 100.0
            );
        }
        for record in &self.changes {
            let _ = writeln!(
                out,
                "  - [{}] {} {}: {} -> {}",
                record.change_type,
                record.component,
                record.field,
                record.old_value.as_deref().unwrap_or("N/A"),
                record.new_value.as_deref().unwrap_or("N/A"),
            );
        }
        if let Some(mapping) = &self.mapping {
            if !mapping.affected_node_ids.is_empty() {
                let ids: Vec<&str> = mapping.affected_node_ids.iter().map(String::as_str).collect();
                let _ = writeln!(out, "Affected: {}", ids.join(", "));
            }
        }
        for reason in &self.fallback_reasons {
            let _ = writeln!(out, "Fallback: {reason}");
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::changes::ChangeType;
    use crate::mapping::score;

    #[test]
    fn json_uses_kebab_case_enums() {
        let mut report = RunReport::new(Utc::now(), PathBuf::from("diagram.html"));
        report.mode_used = Some(Mode::Incremental);
        report.outcome = Outcome::Written;
        report.impact = Some(score(1, 20, 0.5));
        report.impact_level = ImpactLevel::Low;
        report.transitions.push(Transition {
            from: State::Deciding,
            to: State::Incremental,
            reason: "impact low".into(),
        });

        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();
        assert_eq!(json["mode_used"], "incremental");
        assert_eq!(json["outcome"], "written");
        assert_eq!(json["impact_level"], "low");
        assert_eq!(json["transitions"][0]["to"], "incremental");
        assert_eq!(json["transitions"][0]["from"], "deciding");
    }

    #[test]
    fn summary_lists_changes_and_fallbacks() {
        let mut report = RunReport::new(Utc::now(), PathBuf::from("d.md"));
        report.outcome = Outcome::Written;
        report.mode_used = Some(Mode::Full);
        report.changes.push(ChangeRecord {
            component: "Chunking".into(),
            change_type: ChangeType::ConfigUpdate,
            field: "chunk_size".into(),
            old_value: Some("1000".into()),
            new_value: None,
            impact_note: String::new(),
            suggested_node_hints: Vec::new(),
        });
        report.fallback_reasons.push("diagram does not parse".into());

        let text = report.summary();
        assert!(text.contains("Outcome:  written (mode: full)"));
        assert!(text.contains("[config-update] Chunking chunk_size: 1000 -> N/A"));
        assert!(text.contains("Fallback: diagram does not parse"));
    }
}
