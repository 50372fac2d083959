//! Configuration loading.
//!
//! Settings come from a TOML file: an explicit `--config` path, else
//! `pipemap.toml` in the project root, else built-in defaults. Every section
//! is optional and falls back to its defaults field by field.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the project-local configuration file.
pub const LOCAL_CONFIG: &str = "pipemap.toml";

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read configuration {path}: {source}")]
    Read {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file is not valid TOML for [`AppConfig`].
    #[error("failed to parse TOML configuration: {0}")]
    Parse(String),
    /// An explicitly requested file does not exist.
    #[error("missing configuration file: {0}")]
    MissingFile(PathBuf),
    /// A value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    Validation(String),
}

/// Complete application configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where the diagram artifact lives.
    pub diagram: DiagramConfig,
    /// Mode selection and change detection.
    pub update: UpdateConfig,
    /// Change-to-node mapping.
    pub mapping: MappingConfig,
    /// Generation collaborator settings.
    pub llm: LlmConfig,
    /// Source-tree scanning.
    pub scan: ScanConfig,
    /// Keyword table shared by the heuristic extractor and the mapper.
    pub keywords: KeywordTable,
}

/// `[diagram]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagramConfig {
    /// Artifact path, relative to the project root.
    pub path: PathBuf,
}

impl Default for DiagramConfig {
    fn default() -> Self {
        Self { path: PathBuf::from("diagram.html") }
    }
}

/// `[update]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Largest affected fraction still updated incrementally.
    pub incremental_ceiling: f64,
    /// Reference used when neither `--since` nor recorded commit metadata exist.
    pub base_ref: String,
    /// File extensions (without dot) considered source code.
    pub supported_extensions: Vec<String>,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            incremental_ceiling: 0.5,
            base_ref: "HEAD~1".into(),
            supported_extensions: ["py", "js", "ts", "java", "go", "rb", "rs"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

impl UpdateConfig {
    /// Returns `true` if `path` has one of the supported extensions.
    #[must_use]
    pub fn is_supported(&self, path: &str) -> bool {
        Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                self.supported_extensions.iter().any(|s| s.eq_ignore_ascii_case(ext))
            })
    }
}

/// One mapping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingStrategy {
    /// Match the record's suggested hints against node text.
    Hint,
    /// Resolve the component to a keyword category.
    Component,
    /// Match the changed field name.
    Field,
}

/// How hint matches combine with the other strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HintPrecedence {
    /// A hint match ends the search for that record.
    #[default]
    Override,
    /// Hint matches are kept and the next strategy that fires is added.
    Seed,
}

/// `[mapping]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingConfig {
    /// Strategies tried per record, first match wins.
    pub order: Vec<MappingStrategy>,
    /// How hint matches combine with later strategies.
    pub hint_precedence: HintPrecedence,
    /// Hints shorter than this are ignored.
    pub min_hint_len: usize,
}

impl Default for MappingConfig {
    fn default() -> Self {
        Self {
            order: vec![MappingStrategy::Hint, MappingStrategy::Component, MappingStrategy::Field],
            hint_precedence: HintPrecedence::Override,
            min_hint_len: 3,
        }
    }
}

/// `[llm]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Model identifier passed to the completion API.
    pub model: String,
    /// Response token budget.
    pub max_tokens: u32,
    /// Per-call timeout.
    pub timeout_secs: u64,
    /// Diff characters sent for semantic classification.
    pub max_diff_chars: usize,
    /// Diff characters included in incremental update prompts.
    pub max_prompt_diff_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "claude-sonnet-4-5".into(),
            max_tokens: 8192,
            timeout_secs: 120,
            max_diff_chars: 15_000,
            max_prompt_diff_chars: 3_000,
        }
    }
}

/// `[scan]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Upper bound on the project summary handed to generation.
    pub max_context_chars: usize,
    /// Directory names never descended into.
    pub skip_dirs: Vec<String>,
    /// Keep comment lines in file skeletons.
    pub include_comments: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            max_context_chars: 60_000,
            skip_dirs: ["node_modules", "target", "venv", ".venv", "__pycache__", "dist", "build"]
                .into_iter()
                .map(String::from)
                .collect(),
            include_comments: false,
        }
    }
}

/// A named group of keywords describing one kind of pipeline stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Display name, e.g. `Chunking`.
    #[serde(rename = "category")]
    pub name: String,
    /// Lowercase keywords that identify the category.
    pub keywords: Vec<String>,
}

impl Category {
    fn new(name: &str, keywords: &[&str]) -> Self {
        Self { name: name.into(), keywords: keywords.iter().map(|k| (*k).to_string()).collect() }
    }

    /// Hint tokens for this category: its name and keywords, lowercased.
    #[must_use]
    pub fn hints(&self) -> Vec<String> {
        let mut hints = vec![self.name.to_lowercase()];
        for keyword in &self.keywords {
            let keyword = keyword.to_lowercase();
            if !hints.contains(&keyword) {
                hints.push(keyword);
            }
        }
        hints
    }
}

/// Ordered keyword categories. Earlier categories win ties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeywordTable(pub Vec<Category>);

impl Default for KeywordTable {
    fn default() -> Self {
        Self(vec![
            Category::new(
                "Chunking",
                &["chunk", "split", "textsplitter", "chunk_size", "chunk_overlap"],
            ),
            Category::new(
                "Embedding",
                &["embedding", "embed", "openai", "model", "text-embedding"],
            ),
            Category::new("Storage", &["bucket", "gcs", "storage", "upload", "download"]),
            Category::new("Cache", &["pickle", "pkl", "cache", "dump", "load"]),
            Category::new(
                "Vector DB",
                &["pinecone", "turbopuffer", "weaviate", "upsert", "namespace", "index"],
            ),
            Category::new("Database", &["firestore", "mongodb", "collection", "document"]),
            Category::new("Ingestion", &["ingest", "read", "load", "source", "input"]),
            Category::new("Processing", &["process", "transform", "parse"]),
            Category::new("API", &["endpoint", "route", "handler", "api"]),
        ])
    }
}

impl KeywordTable {
    /// Categories in priority order.
    pub fn categories(&self) -> impl Iterator<Item = &Category> {
        self.0.iter()
    }

    /// First category with a keyword contained in the lowercased identifier.
    #[must_use]
    pub fn classify(&self, identifier: &str) -> Option<&Category> {
        let lower = identifier.to_lowercase();
        self.0.iter().find(|c| c.keywords.iter().any(|k| lower.contains(&k.to_lowercase())))
    }

    /// Resolves a free-form component name (`"chunking"`, `"Vector DB"`,
    /// `"text splitter"`) to a category.
    #[must_use]
    pub fn resolve(&self, component: &str) -> Option<&Category> {
        let wanted = normalize(component);
        if wanted.is_empty() {
            return None;
        }
        self.0
            .iter()
            .find(|c| normalize(&c.name) == wanted)
            .or_else(|| {
                self.0.iter().find(|c| {
                    let name = normalize(&c.name);
                    wanted.contains(&name) || name.contains(&wanted)
                })
            })
            .or_else(|| self.classify(&wanted))
    }
}

/// Lowercase with everything except letters and digits removed.
pub(crate) fn normalize(text: &str) -> String {
    text.chars().filter(char::is_ascii_alphanumeric).map(|c| c.to_ascii_lowercase()).collect()
}

impl AppConfig {
    /// Checks ranges and internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_ceiling(self.update.incremental_ceiling)?;
        if self.mapping.order.is_empty() {
            return Err(ConfigError::Validation(
                "mapping.order must name at least one strategy".into(),
            ));
        }
        for (i, strategy) in self.mapping.order.iter().enumerate() {
            if self.mapping.order[..i].contains(strategy) {
                return Err(ConfigError::Validation(format!(
                    "mapping.order lists {strategy:?} more than once"
                )));
            }
        }
        if self.update.supported_extensions.is_empty() {
            return Err(ConfigError::Validation("update.supported_extensions is empty".into()));
        }
        if let Some(empty) = self.keywords.0.iter().find(|c| c.keywords.is_empty()) {
            return Err(ConfigError::Validation(format!(
                "keyword category `{}` has no keywords",
                empty.name
            )));
        }
        if self.llm.timeout_secs == 0 {
            return Err(ConfigError::Validation("llm.timeout_secs must be positive".into()));
        }
        Ok(())
    }
}

/// Checks that a ceiling lies in `(0, 1]`.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when it does not.
pub fn validate_ceiling(ceiling: f64) -> Result<(), ConfigError> {
    if ceiling > 0.0 && ceiling <= 1.0 {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "incremental ceiling must be in (0, 1], got {ceiling}"
        )))
    }
}

/// Finds and loads configuration.
///
/// Search order:
/// 1. Explicit path if provided
/// 2. `pipemap.toml` in `root`
/// 3. Defaults
///
/// # Errors
///
/// Returns an error if an explicit path is missing, a file cannot be read or
/// parsed, or the result fails validation.
pub fn load_config(explicit_path: Option<&Path>, root: &Path) -> Result<AppConfig, ConfigError> {
    let config = if let Some(path) = explicit_path {
        info!(path = path.display().to_string(); "Loading configuration from explicit path");
        load_config_file(path)?
    } else {
        let local = root.join(LOCAL_CONFIG);
        if local.exists() {
            info!(path = local.display().to_string(); "Loading configuration from project root");
            load_config_file(&local)?
        } else {
            debug!("No configuration file found, using defaults");
            AppConfig::default()
        }
    };
    config.validate()?;
    Ok(config)
}

fn load_config_file(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::MissingFile(path.to_path_buf()));
    }
    let content = fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
}
