//! Source-tree scanner: builds the project summary handed to full and new
//! diagram generation.
//!
//! Files come from git when the project is a repository (tracked plus
//! untracked), otherwise from walking the filesystem. Each supported source
//! file is reduced to a skeleton of definitions, configuration-like
//! assignments and log messages, plus comments when asked for.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use serde::Serialize;

use crate::changes::heuristic::assignments;
use crate::config::{KeywordTable, ScanConfig, UpdateConfig};
use crate::context::ServiceContext;

/// File stems treated as pipeline entry points.
const ENTRY_STEMS: [&str; 10] =
    ["main", "__main__", "app", "run", "pipeline", "index", "server", "cli", "manage", "handler"];

/// Keywords that make an assignment worth keeping even when unclassified.
const CONFIG_WORDS: [&str; 7] =
    ["chunk_size", "chunk_overlap", "model", "namespace", "index", "bucket", "path"];

/// What to include in the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    /// Directory structure plus entry-point files only.
    EntryPoints,
    /// Every supported source file.
    Full,
}

/// Scanner output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectSummary {
    /// Mode used.
    pub mode: ScanMode,
    /// Source files whose skeleton is included.
    pub files: Vec<String>,
    /// Text handed to the generation prompt.
    pub text: String,
}

/// Scans the project at `root`.
///
/// # Errors
///
/// Returns an error if the file list cannot be obtained. Unreadable files are
/// skipped with a warning.
pub fn scan(
    ctx: &ServiceContext,
    root: &Path,
    in_repository: bool,
    mode: ScanMode,
    scan_config: &ScanConfig,
    update_config: &UpdateConfig,
    keywords: &KeywordTable,
) -> Result<ProjectSummary, String> {
    let all_files = list_files(ctx, root, in_repository, scan_config)?;
    let sources: Vec<&String> =
        all_files.iter().filter(|f| update_config.is_supported(f)).collect();
    let selected: Vec<&String> = match mode {
        ScanMode::Full => sources,
        ScanMode::EntryPoints => sources.into_iter().filter(|f| is_entry_point(f)).collect(),
    };
    log::info!(mode:? = mode, files = selected.len(); "scanning project sources");

    let mut text = String::new();
    if mode == ScanMode::EntryPoints {
        text.push_str(&structure(&all_files));
    }

    let mut files = Vec::new();
    for file in selected {
        if text.chars().count() >= scan_config.max_context_chars {
            log::warn!(limit = scan_config.max_context_chars; "project summary truncated");
            break;
        }
        let content = match ctx.fs.read_to_string(&root.join(file)) {
            Ok(content) => content,
            Err(err) => {
                log::warn!(path = file.as_str(), err:% = err; "skipping unreadable file");
                continue;
            }
        };
        let _ = writeln!(text, "\n--- FILE: {file} ---");
        text.push_str(&skeleton(&content, keywords, scan_config.include_comments));
        files.push(file.clone());
    }

    let text = match text.char_indices().nth(scan_config.max_context_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text,
    };
    Ok(ProjectSummary { mode, files, text })
}

fn list_files(
    ctx: &ServiceContext,
    root: &Path,
    in_repository: bool,
    config: &ScanConfig,
) -> Result<Vec<String>, String> {
    if !in_repository {
        return ctx
            .fs
            .walk(root, &config.skip_dirs)
            .map_err(|e| format!("failed to walk {}: {e}", root.display()));
    }
    let mut files = ctx.git.list_files().map_err(|e| format!("failed to list files: {e}"))?;
    match ctx.git.untracked_files() {
        Ok(untracked) => files.extend(untracked),
        Err(err) => log::warn!(err:% = err; "could not list untracked files"),
    }
    files.retain(|f| !f.split('/').any(|part| config.skip_dirs.iter().any(|s| s == part)));
    files.sort();
    files.dedup();
    Ok(files)
}

fn is_entry_point(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    let stem = name.split('.').next().unwrap_or(name).to_lowercase();
    ENTRY_STEMS.contains(&stem.as_str())
}

/// Directory listing with per-directory file counts.
fn structure(files: &[String]) -> String {
    let mut dirs: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for file in files {
        let (dir, name) = file.rsplit_once('/').unwrap_or((".", file.as_str()));
        dirs.entry(dir).or_default().push(name);
    }
    let mut text = String::from("--- PROJECT STRUCTURE ---\n");
    for (dir, names) in dirs {
        let _ = writeln!(text, "{dir}/ ({} files): {}", names.len(), names.join(", "));
    }
    text
}

/// Definitions, configuration-like assignments and log messages of one file.
fn skeleton(content: &str, keywords: &KeywordTable, include_comments: bool) -> String {
    let mut out = String::new();
    for line in content.lines() {
        let trimmed = line.trim();
        if let Some(comment) = comment(trimmed) {
            if include_comments && !comment.is_empty() {
                let _ = writeln!(out, "COMMENT {comment}");
            }
            continue;
        }
        if let Some(name) = definition(trimmed) {
            let _ = writeln!(out, "DEF {name}");
            continue;
        }
        if let Some(message) = log_message(trimmed) {
            let _ = writeln!(out, "LOG \"{message}\"");
            continue;
        }
        for (name, value) in assignments(trimmed) {
            let lower = name.to_lowercase();
            let config_like = CONFIG_WORDS.iter().any(|w| lower.contains(w));
            if config_like || keywords.classify(&name).is_some() {
                let _ = writeln!(out, "CONFIG {name} = {value}");
            }
        }
    }
    out
}

/// Text of a `#` or `//` line comment. Shebangs and attributes are not comments.
fn comment(line: &str) -> Option<&str> {
    if line.starts_with("#!") || line.starts_with("#[") {
        return None;
    }
    line.strip_prefix("//")
        .or_else(|| line.strip_prefix('#'))
        .map(|rest| rest.trim_start_matches(['/', '!']).trim())
}

fn definition(line: &str) -> Option<&str> {
    const PREFIXES: [&str; 9] = [
        "def ",
        "async def ",
        "class ",
        "fn ",
        "pub fn ",
        "async fn ",
        "pub async fn ",
        "function ",
        "func ",
    ];
    let rest = PREFIXES.iter().find_map(|p| line.strip_prefix(p))?;
    let name = rest.split(|c: char| !(c.is_alphanumeric() || c == '_')).next()?;
    (!name.is_empty()).then_some(name)
}

/// The string literal passed to a logging or print call.
fn log_message(line: &str) -> Option<&str> {
    let open = line.find('(')?;
    let callee = line[..open].to_lowercase();
    let logging = callee.contains("log")
        || callee.contains("print")
        || callee.ends_with("info")
        || callee.ends_with("warn");
    if !logging {
        return None;
    }
    let args = line[open + 1..].trim_start().trim_start_matches('f');
    let quote = args.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    let body = &args[1..];
    body.find(quote).map(|end| &body[..end])
}
