//! The update orchestrator: decides between a no-op, a surgical update of
//! the affected nodes, or a whole-diagram regeneration, and writes the result.
//!
//! A run moves through [`State`]s:
//!
//! ```text
//! Deciding ─┬─> Committed (no-op)
//!           ├─> New ─────────┐
//!           ├─> Full ────────┼─> Validating ─┬─> Committed
//!           └─> Incremental ─┘               ├─> Failed
//!                                            └─> FallbackToFull ─> Full (incremental only)
//! ```
//!
//! Every transition lands in the [`RunReport`]. Recoverable problems (missing
//! or corrupt diagram, failed classification, an incremental answer that
//! breaks the template) become transitions; only running out of paths,
//! having no generator, or failing to write is an [`UpdateError`]. The
//! artifact is replaced by renaming a sibling temp file, so a failed run
//! leaves it untouched.

pub mod report;
pub mod validate;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::changes::diff::{digest, retain_files, synthesize_added};
use crate::changes::{self, ChangeExtractor, HeuristicExtractor, SemanticExtractor, Strategy};
use crate::config::AppConfig;
use crate::context::ServiceContext;
use crate::diagram::host::{self, HostFormat};
use crate::diagram::{parse, serialize, DiagramModel, ParseError};
use crate::generate::{prompt, GenerationError, Generator, PipelineMetadata};
use crate::mapping::{score, ChangeMapper, ImpactLevel, MappingResult};
use crate::scan::{self, ScanMode};

pub use report::{Outcome, RunReport, Transition};
pub use validate::{check_incremental, ValidationError};

/// Metadata key holding the commit the diagram was last reconciled at.
pub const COMMIT_KEY: &str = "commit";
/// Metadata key holding the time of the last write.
pub const UPDATED_KEY: &str = "updated";
/// Metadata key holding the digest of uncommitted source changes the
/// diagram already reflects.
pub const DIGEST_KEY: &str = "source-digest";

/// How the diagram is (re)generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// First diagram for the project, from entry points and structure.
    New,
    /// Only the affected nodes are rewritten.
    Incremental,
    /// Whole diagram regenerated from a full scan.
    Full,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::New => "new",
            Self::Incremental => "incremental",
            Self::Full => "full",
        })
    }
}

/// Orchestrator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum State {
    /// Inspecting the diagram and the changes.
    Deciding,
    /// Generating a first diagram.
    New,
    /// Generating a surgical update.
    Incremental,
    /// Regenerating the whole diagram.
    Full,
    /// Checking generated text.
    Validating,
    /// Finished; the artifact is current.
    Committed,
    /// The incremental answer was rejected.
    FallbackToFull,
    /// Finished without a usable diagram.
    Failed,
}

impl From<Mode> for State {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::New => Self::New,
            Mode::Incremental => Self::Incremental,
            Mode::Full => Self::Full,
        }
    }
}

/// Unrecoverable run failures. The artifact is left as it was.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// Generation is needed but no language model is configured.
    #[error("no generation collaborator available; set ANTHROPIC_API_KEY")]
    NoGenerator,
    /// The existing artifact could not be read.
    #[error("failed to read {path}: {message}")]
    Read {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },
    /// The project could not be scanned for a full regeneration.
    #[error("project scan failed: {0}")]
    Scan(String),
    /// The last remaining generation attempt failed.
    #[error(transparent)]
    Generation(#[from] GenerationError),
    /// The last remaining generation attempt produced an unusable diagram.
    #[error("generated diagram is invalid: {0}")]
    InvalidDiagram(#[from] ParseError),
    /// The new artifact could not be written.
    #[error("failed to write {path}: {message}")]
    Write {
        /// Artifact path.
        path: PathBuf,
        /// Underlying error.
        message: String,
    },
}

/// Per-run options, usually from the command line.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    /// Diagram artifact, relative to the project root unless absolute.
    pub diagram: PathBuf,
    /// Revision to diff against; overrides the recorded commit.
    pub since: Option<String>,
    /// Skip the decision and regenerate everything.
    pub force_full: bool,
    /// Generate a new diagram from entry points and structure.
    pub entry_points_only: bool,
    /// Overrides the configured incremental ceiling.
    pub ceiling: Option<f64>,
    /// Preferred extraction strategy.
    pub strategy: Strategy,
    /// Pipeline description merged into generation prompts.
    pub metadata: PipelineMetadata,
    /// Stop after deciding; generate and write nothing.
    pub plan_only: bool,
}

/// The diagram found on disk.
struct Existing {
    document: String,
    /// `None` when the document holds no flowchart block.
    flowchart: Option<String>,
}

/// What [`Orchestrator::decide`] settled on.
enum Decision {
    NoOp(String),
    Generate(Mode, String),
    Incremental { model: DiagramModel, mapping: MappingResult, diff: String, reason: String },
}

/// Supported files changed since the reference revision.
struct ChangedSources {
    tracked: Vec<String>,
    untracked: Vec<String>,
}

/// Runs one reconciliation of the diagram against the working tree.
pub struct Orchestrator<'a> {
    ctx: &'a ServiceContext,
    config: &'a AppConfig,
    root: PathBuf,
    options: UpdateOptions,
    state: State,
    report: RunReport,
}

impl<'a> Orchestrator<'a> {
    /// Prepares a run for the project at `root`.
    #[must_use]
    pub fn new(
        ctx: &'a ServiceContext,
        config: &'a AppConfig,
        root: &Path,
        options: UpdateOptions,
    ) -> Self {
        let diagram = if options.diagram.as_os_str().is_empty() {
            root.join(&config.diagram.path)
        } else {
            root.join(&options.diagram)
        };
        let report = RunReport::new(ctx.clock.now(), diagram);
        Self {
            ctx,
            config,
            root: root.to_path_buf(),
            options,
            state: State::Deciding,
            report,
        }
    }

    /// The report so far.
    #[must_use]
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Consumes the orchestrator, returning its report.
    #[must_use]
    pub fn into_report(self) -> RunReport {
        self.report
    }

    fn transition(&mut self, to: State, reason: impl Into<String>) {
        let reason = reason.into();
        log::info!(from:? = self.state, to:? = to, reason = reason.as_str(); "state transition");
        self.report.transitions.push(Transition { from: self.state, to, reason });
        self.state = to;
    }

    fn fallback(&mut self, reason: String) {
        log::warn!(reason = reason.as_str(); "falling back");
        self.report.fallback_reasons.push(reason);
    }

    fn fail<E>(&mut self, err: E) -> Result<(), UpdateError>
    where
        E: Into<UpdateError>,
    {
        let err = err.into();
        self.transition(State::Failed, err.to_string());
        self.report.outcome = Outcome::Failed;
        Err(err)
    }

    /// Runs the state machine to completion.
    ///
    /// # Errors
    ///
    /// Returns [`UpdateError`] when no valid diagram could be produced or
    /// written. The report (see [`Self::into_report`]) is complete either way.
    pub async fn run(&mut self) -> Result<(), UpdateError> {
        let ctx = self.ctx;
        let config = self.config;
        let path = self.report.diagram.clone();

        let in_repository = ctx.git.is_repository();
        let existing = match self.load_existing(&path) {
            Ok(existing) => existing,
            Err(err) => return self.fail(err),
        };

        let decision = self.decide(in_repository, existing.as_ref()).await;
        let (mode, reason) = match &decision {
            Decision::NoOp(reason) => {
                self.transition(State::Committed, reason.clone());
                self.report.outcome = if self.options.plan_only {
                    Outcome::Planned
                } else {
                    Outcome::NoOp
                };
                return Ok(());
            }
            Decision::Generate(mode, reason) => (*mode, reason.clone()),
            Decision::Incremental { reason, .. } => (Mode::Incremental, reason.clone()),
        };
        self.transition(mode.into(), reason);
        self.report.mode_used = Some(mode);
        if self.options.plan_only {
            self.report.outcome = Outcome::Planned;
            return Ok(());
        }

        let Some(llm) = ctx.llm.as_deref() else {
            return self.fail(UpdateError::NoGenerator);
        };
        let generator = Generator::new(llm, &config.llm);

        let mut mode = mode;
        let mut previous = None;
        if let Decision::Incremental { model, mapping, diff, .. } = decision {
            match self.incremental(&generator, &model, &mapping, &diff).await {
                Ok(updated) => {
                    return self.commit(
                        updated,
                        Mode::Incremental,
                        Some(&model),
                        existing.as_ref(),
                        in_repository,
                    );
                }
                Err(reason) => {
                    self.transition(State::FallbackToFull, reason.clone());
                    self.fallback(format!("incremental update rejected: {reason}"));
                    self.transition(State::Full, "regenerating the whole diagram");
                    self.report.mode_used = Some(Mode::Full);
                    mode = Mode::Full;
                    previous = Some(model);
                }
            }
        }

        let scan_mode = if mode == Mode::New { ScanMode::EntryPoints } else { ScanMode::Full };
        let summary = match scan::scan(
            ctx,
            &self.root,
            in_repository,
            scan_mode,
            &config.scan,
            &config.update,
            &config.keywords,
        ) {
            Ok(summary) => summary,
            Err(err) => return self.fail(UpdateError::Scan(err)),
        };
        let prompt = prompt::full(&summary.text, &self.options.metadata);
        let generated = match generator.generate(prompt).await {
            Ok(text) => text,
            Err(err) => return self.fail(err),
        };
        self.transition(State::Validating, "checking generated diagram");
        match parse(&generated) {
            Ok(model) => {
                self.commit(model, mode, previous.as_ref(), existing.as_ref(), in_repository)
            }
            Err(err) => self.fail(err),
        }
    }

    fn load_existing(&self, path: &Path) -> Result<Option<Existing>, UpdateError> {
        if !self.ctx.fs.exists(path) {
            log::info!(path:? = path; "no existing diagram");
            return Ok(None);
        }
        let document = self
            .ctx
            .fs
            .read_to_string(path)
            .map_err(|e| UpdateError::Read { path: path.to_path_buf(), message: e.to_string() })?;
        let flowchart = match host::extract_flowchart(&document) {
            Ok(text) => Some(text.to_string()),
            Err(err) => {
                log::warn!(path:? = path, err:err; "existing document holds no diagram");
                None
            }
        };
        Ok(Some(Existing { document, flowchart }))
    }

    async fn decide(&mut self, in_repository: bool, existing: Option<&Existing>) -> Decision {
        let ctx = self.ctx;
        let config = self.config;

        if !in_repository {
            return Decision::Generate(Mode::Full, "project is not a git repository".into());
        }
        let Some(flowchart) = existing.and_then(|e| e.flowchart.as_deref()) else {
            if self.options.force_full {
                return Decision::Generate(
                    Mode::Full,
                    "no existing diagram; full regeneration forced".into(),
                );
            }
            return Decision::Generate(Mode::New, "no existing diagram".into());
        };
        if self.options.entry_points_only {
            return Decision::Generate(Mode::New, "entry-points-only requested".into());
        }
        if self.options.force_full {
            return Decision::Generate(Mode::Full, "full regeneration forced".into());
        }

        let model = match parse(flowchart) {
            Ok(model) => model,
            Err(err) => {
                self.fallback(format!("existing diagram does not parse: {err}"));
                return Decision::Generate(Mode::Full, "existing diagram is corrupt".into());
            }
        };

        let reference = self
            .options
            .since
            .clone()
            .or_else(|| model.metadata().get(COMMIT_KEY).cloned())
            .unwrap_or_else(|| config.update.base_ref.clone());
        log::info!(reference = reference.as_str(); "computing changes");
        self.report.reference = Some(reference.clone());

        let changed = match self.changed_sources(&reference) {
            Ok(changed) => changed,
            Err(err) => {
                self.fallback(format!("cannot list changes since {reference}: {err}"));
                return Decision::Generate(Mode::Full, "changes unavailable".into());
            }
        };
        self.report.changed_files =
            changed.tracked.iter().chain(&changed.untracked).cloned().collect();
        if self.report.changed_files.is_empty() {
            return Decision::NoOp(format!("no supported source files changed since {reference}"));
        }

        let diff = match self.collect_diff(&reference, &changed) {
            Ok(diff) => diff,
            Err(err) => {
                self.fallback(format!("cannot diff against {reference}: {err}"));
                return Decision::Generate(Mode::Full, "diff unavailable".into());
            }
        };
        let recorded = model.metadata().get(DIGEST_KEY);
        if self.options.since.is_none() && recorded.is_some_and(|d| *d == digest(&diff)) {
            return Decision::NoOp(format!(
                "working tree unchanged since the last update at {reference}"
            ));
        }

        let heuristic = HeuristicExtractor::new(&config.keywords);
        let generator = ctx.llm.as_deref().map(|llm| Generator::new(llm, &config.llm));
        let semantic =
            generator.as_ref().map(|g| SemanticExtractor::new(g, config.llm.max_diff_chars));
        let extraction = match changes::extract(
            &diff,
            self.options.strategy,
            &heuristic,
            semantic.as_ref().map(|s| s as &dyn ChangeExtractor),
        )
        .await
        {
            Ok(extraction) => extraction,
            Err(err) => {
                self.fallback(format!("change extraction failed: {err}"));
                return Decision::Generate(Mode::Full, "changes could not be classified".into());
            }
        };
        if let Some(reason) = &extraction.downgrade_reason {
            self.fallback(format!("semantic classification unavailable: {reason}"));
        }
        self.report.extraction_strategy = Some(extraction.strategy);
        self.report.changes = extraction.records;
        if self.report.changes.is_empty() {
            return Decision::NoOp("no functional changes found".into());
        }

        let mapper = ChangeMapper::new(&config.mapping, &config.keywords);
        let mapping = mapper.map(&self.report.changes, &model);
        self.report.affected_node_count = mapping.affected_count();
        let unmapped = mapping.unmapped.len();
        self.report.mapping = Some(mapping.clone());
        if mapping.affected_node_ids.is_empty() {
            return Decision::Generate(
                Mode::Full,
                format!("none of {unmapped} changes could be placed on the diagram"),
            );
        }

        let ceiling = self.options.ceiling.unwrap_or(config.update.incremental_ceiling);
        let impact = score(mapping.affected_count(), model.node_count(), ceiling);
        self.report.impact = Some(impact);
        self.report.impact_level = impact.level;
        log::info!(
            affected = impact.affected_count,
            total = impact.total_count,
            level:% = impact.level;
            "impact scored"
        );

        match impact.level {
            ImpactLevel::None => Decision::NoOp("changes affect no diagram node".into()),
            level if level.allows_incremental() => Decision::Incremental {
                reason: format!(
                    "impact {level}: {} of {} nodes",
                    impact.affected_count, impact.total_count
                ),
                model,
                mapping,
                diff,
            },
            level => Decision::Generate(
                Mode::Full,
                format!("impact {level} exceeds ceiling {ceiling}"),
            ),
        }
    }

    fn changed_sources(&self, reference: &str) -> Result<ChangedSources, String> {
        let supported = |f: &String| self.config.update.is_supported(f);
        let tracked: Vec<String> = self
            .ctx
            .git
            .changed_files(reference)
            .map_err(|e| e.to_string())?
            .into_iter()
            .filter(supported)
            .collect();
        let untracked = match self.ctx.git.untracked_files() {
            Ok(files) => files.into_iter().filter(supported).collect(),
            Err(err) => {
                log::warn!(err:% = err; "could not list untracked files");
                Vec::new()
            }
        };
        log::debug!(tracked = tracked.len(), untracked = untracked.len(); "changed source files");
        Ok(ChangedSources { tracked, untracked })
    }

    fn collect_diff(&self, reference: &str, changed: &ChangedSources) -> Result<String, String> {
        let mut diff = if changed.tracked.is_empty() {
            String::new()
        } else {
            self.ctx.git.diff(reference, &changed.tracked).map_err(|e| e.to_string())?
        };
        for file in &changed.untracked {
            match self.ctx.fs.read_to_string(&self.root.join(file)) {
                Ok(content) => diff.push_str(&synthesize_added(file, &content)),
                Err(err) => {
                    log::warn!(
                        path = file.as_str(),
                        err:% = err;
                        "skipping unreadable untracked file"
                    );
                }
            }
        }
        Ok(retain_files(&diff, |path| self.config.update.is_supported(path)))
    }

    async fn incremental(
        &mut self,
        generator: &Generator<'_>,
        model: &DiagramModel,
        mapping: &MappingResult,
        diff: &str,
    ) -> Result<DiagramModel, String> {
        let prompt = prompt::incremental(
            model,
            mapping,
            &self.report.changes,
            diff,
            self.config.llm.max_prompt_diff_chars,
        );
        let generated = generator.generate(prompt).await.map_err(|e| e.to_string())?;
        self.transition(State::Validating, "checking incremental update");
        check_incremental(model, &generated, &mapping.affected_node_ids).map_err(|e| e.to_string())
    }

    fn commit(
        &mut self,
        mut model: DiagramModel,
        mode: Mode,
        previous: Option<&DiagramModel>,
        existing: Option<&Existing>,
        in_repository: bool,
    ) -> Result<(), UpdateError> {
        if let Some(previous) = previous.filter(|_| mode == Mode::Incremental) {
            for (key, value) in previous.metadata() {
                if !model.metadata().contains_key(key) {
                    model.set_metadata(key.clone(), value.clone());
                }
            }
        }
        model.remove_metadata(DIGEST_KEY);
        if in_repository {
            match self.ctx.git.current_commit() {
                Ok(commit) => {
                    self.ctx.note_commit(&commit);
                    let pending = self.working_tree_digest(&commit);
                    model.set_metadata(COMMIT_KEY, commit);
                    if let Some(pending) = pending {
                        model.set_metadata(DIGEST_KEY, pending);
                    }
                }
                Err(err) => log::warn!(err:% = err; "could not read current commit"),
            }
        }
        model.set_metadata(UPDATED_KEY, self.ctx.clock.now().to_rfc3339());

        let path = self.report.diagram.clone();
        let flowchart = serialize(&model);
        let markdown = HostFormat::for_path(&path) == HostFormat::Markdown;
        let document = match existing {
            Some(Existing { document, flowchart: Some(_) }) => {
                host::splice(document, &flowchart).ok()
            }
            Some(Existing { document, flowchart: None }) if markdown => {
                let block = host::render_document(&path, &flowchart, None);
                Some(format!("{}\n\n{block}", document.trim_end()))
            }
            _ => None,
        }
        .unwrap_or_else(|| {
            host::render_document(&path, &flowchart, self.options.metadata.name.as_deref())
        });

        if let Err(err) = self.write_atomically(&path, &document) {
            return self.fail(err);
        }
        self.report.mode_used = Some(mode);
        self.report.outcome = Outcome::Written;
        self.transition(State::Committed, format!("{mode} diagram written"));
        Ok(())
    }

    /// Digest of the supported changes between `commit` and the working tree,
    /// or `None` when there are none or they cannot be read.
    fn working_tree_digest(&self, commit: &str) -> Option<String> {
        let changed = match self.changed_sources(commit) {
            Ok(changed) => changed,
            Err(err) => {
                log::debug!(err = err.as_str(); "not recording a source digest");
                return None;
            }
        };
        if changed.tracked.is_empty() && changed.untracked.is_empty() {
            return None;
        }
        let diff = self.collect_diff(commit, &changed).ok()?;
        (!diff.is_empty()).then(|| digest(&diff))
    }

    fn write_atomically(&self, path: &Path, contents: &str) -> Result<(), UpdateError> {
        let write_error = |e: crate::ports::PortError| UpdateError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let name = path
            .file_name()
            .map_or_else(|| "diagram".into(), |n| n.to_string_lossy().into_owned());
        let temp = path.with_file_name(format!(".{name}.tmp"));
        self.ctx.fs.write(&temp, contents).map_err(write_error)?;
        self.ctx.fs.rename(&temp, path).map_err(write_error)?;
        log::info!(path:? = path, bytes = contents.len(); "diagram written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::{json, Value};

    use super::*;
    use crate::adapters::live::filesystem::LiveFileSystem;
    use crate::cassette::{Cassette, Interaction};

    fn context(interactions: Vec<(&str, &str, Value)>) -> ServiceContext {
        let cassette = Cassette {
            name: "update".into(),
            recorded_at: Utc::now(),
            commit: "abc".into(),
            interactions: interactions
                .into_iter()
                .enumerate()
                .map(|(seq, (port, method, output))| Interaction {
                    seq: seq as u64,
                    port: port.into(),
                    method: method.into(),
                    input: Value::Null,
                    output,
                })
                .collect(),
        };
        let mut ctx = ServiceContext::replaying_cassette(&cassette);
        ctx.fs = Box::new(LiveFileSystem);
        ctx
    }

    #[test]
    fn mode_and_state_names() {
        assert_eq!(Mode::Incremental.to_string(), "incremental");
        assert_eq!(State::from(Mode::New), State::New);
        assert_eq!(serde_json::to_value(State::FallbackToFull).unwrap(), json!("fallback-to-full"));
    }

    #[tokio::test]
    async fn outside_repository_plans_full_regeneration() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(vec![
            ("clock", "now", json!("2024-06-15T10:30:00Z")),
            ("git", "is_repository", json!(false)),
        ]);
        let config = AppConfig::default();
        let options = UpdateOptions {
            diagram: "pipeline.md".into(),
            plan_only: true,
            ..UpdateOptions::default()
        };
        let mut orchestrator = Orchestrator::new(&ctx, &config, dir.path(), options);
        orchestrator.run().await.unwrap();

        let report = orchestrator.into_report();
        assert_eq!(report.outcome, Outcome::Planned);
        assert_eq!(report.mode_used, Some(Mode::Full));
        assert_eq!(report.transitions.len(), 1);
        assert_eq!(report.transitions[0].to, State::Full);
        assert!(!dir.path().join("pipeline.md").exists());
    }

    #[tokio::test]
    async fn missing_generator_fails_and_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(vec![
            ("clock", "now", json!("2024-06-15T10:30:00Z")),
            ("git", "is_repository", json!(true)),
        ]);
        ctx.llm = None;
        let config = AppConfig::default();
        let options = UpdateOptions { diagram: "pipeline.html".into(), ..UpdateOptions::default() };
        let mut orchestrator = Orchestrator::new(&ctx, &config, dir.path(), options);

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, UpdateError::NoGenerator));
        let report = orchestrator.into_report();
        assert_eq!(report.outcome, Outcome::Failed);
        assert_eq!(report.mode_used, Some(Mode::New));
        assert_eq!(report.transitions.last().unwrap().to, State::Failed);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn default_diagram_path_comes_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(vec![("clock", "now", json!("2024-06-15T10:30:00Z"))]);
        let config = AppConfig::default();
        let orchestrator = Orchestrator::new(&ctx, &config, dir.path(), UpdateOptions::default());
        assert_eq!(orchestrator.report().diagram, dir.path().join(&config.diagram.path));
    }
}
