//! Locating the flowchart inside the document that hosts it.
//!
//! A diagram artifact is one of: an HTML page with a `<div class="mermaid">`
//! block, a Markdown file with a fenced `mermaid` block, or bare flowchart
//! text. Extraction and splicing work on byte spans so everything outside
//! the block survives an update untouched.

use std::ops::Range;
use std::path::Path;

use thiserror::Error;

const HTML_OPEN: &str = "<div class=\"mermaid\">";
const HTML_CLOSE: &str = "</div>";
const FENCE_OPEN: &str = "```mermaid";
const FENCE_CLOSE: &str = "```";

/// The document holds no recognisable flowchart block.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no mermaid flowchart block found in document")]
pub struct NotFoundError;

/// How a flowchart is embedded in its host document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFormat {
    /// `<div class="mermaid">` inside an HTML page.
    Html,
    /// A fenced `mermaid` code block.
    Markdown,
    /// The document is the flowchart.
    Bare,
}

impl HostFormat {
    /// Format used when creating a new artifact at `path`.
    #[must_use]
    pub fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("html" | "htm") => Self::Html,
            Some("md" | "markdown") => Self::Markdown,
            _ => Self::Bare,
        }
    }
}

#[derive(Debug)]
struct Block {
    format: HostFormat,
    span: Range<usize>,
}

fn locate(document: &str) -> Result<Block, NotFoundError> {
    if let Some(block) = between(document, HTML_OPEN, HTML_CLOSE, HostFormat::Html) {
        return Ok(block);
    }
    if let Some(block) = between(document, FENCE_OPEN, FENCE_CLOSE, HostFormat::Markdown) {
        return Ok(block);
    }
    let first = document
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty() && !l.starts_with("%%"))
        .ok_or(NotFoundError)?;
    if first.starts_with("flowchart") || first.starts_with("graph") {
        return Ok(Block { format: HostFormat::Bare, span: 0..document.trim_end().len() });
    }
    Err(NotFoundError)
}

fn between(document: &str, open: &str, close: &str, format: HostFormat) -> Option<Block> {
    let start = document.find(open)? + open.len();
    let end = start + document[start..].find(close)?;
    let body = &document[start..end];
    let leading = body.len() - body.trim_start().len();
    let trailing = body.len() - body.trim_end().len();
    let span = (start + leading)..(end - trailing).max(start + leading);
    Some(Block { format, span })
}

/// Returns the flowchart text embedded in `document`.
///
/// # Errors
///
/// Returns [`NotFoundError`] when no block is present.
pub fn extract_flowchart(document: &str) -> Result<&str, NotFoundError> {
    let block = locate(document)?;
    Ok(&document[block.span])
}

/// Format of the block found in `document`.
///
/// # Errors
///
/// Returns [`NotFoundError`] when no block is present.
pub fn detect_format(document: &str) -> Result<HostFormat, NotFoundError> {
    locate(document).map(|b| b.format)
}

/// Replaces the flowchart block inside `document`, keeping the surroundings.
///
/// # Errors
///
/// Returns [`NotFoundError`] when no block is present.
pub fn splice(document: &str, flowchart: &str) -> Result<String, NotFoundError> {
    let block = locate(document)?;
    let flowchart = flowchart.trim_end();
    if block.format == HostFormat::Bare {
        return Ok(format!("{flowchart}\n"));
    }
    let mut out = String::with_capacity(document.len() + flowchart.len());
    out.push_str(&document[..block.span.start]);
    out.push_str(flowchart);
    out.push_str(&document[block.span.end..]);
    Ok(out)
}

/// Builds a fresh host document for a new artifact at `path`.
#[must_use]
pub fn render_document(path: &Path, flowchart: &str, title: Option<&str>) -> String {
    let flowchart = flowchart.trim_end();
    match HostFormat::for_path(path) {
        HostFormat::Html => {
            let title = title.unwrap_or("Pipeline Diagram");
            format!(
                r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>{title}</title>
</head>
<body>
    <div class="mermaid">
{flowchart}
    </div>
    <script type="module">
        import mermaid from 'https://cdn.jsdelivr.net/npm/mermaid@10/dist/mermaid.esm.min.mjs';
        mermaid.initialize({{ startOnLoad: true }});
    </script>
</body>
</html>
"#
            )
        }
        HostFormat::Markdown => {
            let heading = title.map(|t| format!("# {t}\n\n")).unwrap_or_default();
            format!("{heading}```mermaid\n{flowchart}\n```\n")
        }
        HostFormat::Bare => format!("{flowchart}\n"),
    }
}
