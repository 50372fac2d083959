//! Unified diff handling: per-file splitting, filtering, truncation, and
//! synthesis of all-added diffs for untracked files.

use std::fmt::Write as _;

/// One file's section of a unified diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    /// Path of the file after the change (before it, for deletions).
    pub path: String,
    /// Hunk lines removed, without the leading `-`.
    pub removed: Vec<String>,
    /// Hunk lines added, without the leading `+`.
    pub added: Vec<String>,
    /// The raw section text, headers included.
    pub text: String,
}

impl FileDiff {
    fn new() -> Self {
        Self { path: String::new(), removed: Vec::new(), added: Vec::new(), text: String::new() }
    }

    fn push_raw(&mut self, line: &str) {
        self.text.push_str(line);
        self.text.push('\n');
    }

    /// Returns `true` if the section has no added or removed lines.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

/// Splits a unified diff into per-file sections.
///
/// Hunk bodies are consumed by their `@@` line counts, so content lines that
/// happen to look like headers (a removed `-- comment` shows up as `--- comment`)
/// are never mistaken for the start of a new file.
#[must_use]
pub fn split_files(diff: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut current: Option<FileDiff> = None;
    let (mut old_left, mut new_left) = (0usize, 0usize);

    for line in diff.lines() {
        if old_left > 0 || new_left > 0 {
            if let Some(file) = current.as_mut() {
                file.push_raw(line);
                match line.chars().next() {
                    Some('-') => {
                        file.removed.push(line[1..].to_string());
                        old_left = old_left.saturating_sub(1);
                    }
                    Some('+') => {
                        file.added.push(line[1..].to_string());
                        new_left = new_left.saturating_sub(1);
                    }
                    Some('\\') => {}
                    _ => {
                        old_left = old_left.saturating_sub(1);
                        new_left = new_left.saturating_sub(1);
                    }
                }
            }
            continue;
        }

        if let Some(rest) = line.strip_prefix("diff --git ") {
            files.extend(current.take());
            let mut file = FileDiff::new();
            if let Some((_, b)) = rest.rsplit_once(" b/") {
                file.path = b.to_string();
            }
            file.push_raw(line);
            current = Some(file);
            continue;
        }

        let starts_headerless = line.starts_with("--- ")
            && current.as_ref().is_none_or(|f| !f.is_empty() || f.text.contains("\n+++ "));
        if starts_headerless {
            files.extend(current.take());
            current = Some(FileDiff::new());
        }

        let Some(file) = current.as_mut() else {
            continue;
        };
        file.push_raw(line);
        if let Some(path) = line.strip_prefix("+++ ") {
            if let Some(path) = clean_header_path(path) {
                file.path = path;
            }
        } else if let Some(path) = line.strip_prefix("--- ") {
            if file.path.is_empty() {
                if let Some(path) = clean_header_path(path) {
                    file.path = path;
                }
            }
        } else if line.starts_with("@@") {
            (old_left, new_left) = hunk_counts(line);
        }
    }
    files.extend(current);
    files
}

fn clean_header_path(raw: &str) -> Option<String> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" {
        return None;
    }
    let path = raw.strip_prefix("a/").or_else(|| raw.strip_prefix("b/")).unwrap_or(raw);
    Some(path.to_string())
}

/// Parses `@@ -a,b +c,d @@` into `(b, d)`; an omitted count means 1.
fn hunk_counts(line: &str) -> (usize, usize) {
    let mut old = 0;
    let mut new = 0;
    let count = |range: &str| match range.split_once(',') {
        Some((_, n)) => n.parse().unwrap_or(0),
        None => 1,
    };
    for token in line.split_whitespace().skip(1).take(2) {
        if let Some(range) = token.strip_prefix('-') {
            old = count(range);
        } else if let Some(range) = token.strip_prefix('+') {
            new = count(range);
        }
    }
    (old, new)
}

/// Keeps only the sections whose path satisfies `keep`, re-joined as diff text.
pub fn retain_files(diff: &str, keep: impl Fn(&str) -> bool) -> String {
    split_files(diff)
        .into_iter()
        .filter(|f| {
            let kept = keep(&f.path);
            if !kept {
                log::debug!(path = f.path.as_str(); "dropping diff section for unsupported file");
            }
            kept
        })
        .map(|f| f.text)
        .collect()
}

/// Builds an all-added diff section for a file that git does not track yet.
#[must_use]
pub fn synthesize_added(path: &str, content: &str) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = format!(
        "diff --git a/{path} b/{path}\nnew file mode 100644\n\
         --- /dev/null\n+++ b/{path}\n@@ -0,0 +1,{} @@\n",
        lines.len()
    );
    for line in lines {
        let _ = writeln!(out, "+{line}");
    }
    out
}

/// Cuts `diff` to at most `max_chars` characters, marking the cut.
#[must_use]
pub fn truncate(diff: &str, max_chars: usize) -> String {
    match diff.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}\n\n... (diff truncated for length)", &diff[..cut]),
        None => diff.to_string(),
    }
}

/// Hex BLAKE3 digest of a diff, used to recognise an unchanged working tree.
#[must_use]
pub fn digest(diff: &str) -> String {
    blake3::hash(diff.as_bytes()).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_FILES: &str = "\
diff --git a/src/ingest.py b/src/ingest.py
index 1111111..2222222 100644
--- a/src/ingest.py
+++ b/src/ingest.py
@@ -10,3 +10,3 @@ def split(docs):
 splitter = RecursiveCharacterTextSplitter(
-    chunk_size=1000,
+    chunk_size=1500,
     chunk_overlap=200,
diff --git a/README.md b/README.md
index 3333333..4444444 100644
--- a/README.md
+++ b/README.md
@@ -1 +1 @@
-# Old
+# New
";

    #[test]
    fn splits_per_file() {
        let files = split_files(TWO_FILES);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].path, "src/ingest.py");
        assert_eq!(files[0].removed, vec!["    chunk_size=1000,"]);
        assert_eq!(files[0].added, vec!["    chunk_size=1500,"]);
        assert_eq!(files[1].path, "README.md");
    }

    #[test]
    fn removed_line_that_looks_like_a_header_stays_in_hunk() {
        let diff = "--- a/q.sql\n+++ b/q.sql\n@@ -1,2 +1,1 @@\n--- note\n select 1;\n";
        let files = split_files(diff);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].removed, vec!["-- note"]);
    }

    #[test]
    fn retain_drops_excluded_files() {
        let kept = retain_files(TWO_FILES, |p| p.ends_with(".py"));
        assert!(kept.contains("chunk_size=1500"));
        assert!(!kept.contains("README"));
        assert!(retain_files(TWO_FILES, |_| false).is_empty());
    }

    #[test]
    fn deleted_file_uses_old_path() {
        let diff = "diff --git a/old.py b/old.py\ndeleted file mode 100644\n\
                    --- a/old.py\n+++ /dev/null\n@@ -1 +0,0 @@\n-x = 1\n";
        let files = split_files(diff);
        assert_eq!(files[0].path, "old.py");
        assert_eq!(files[0].removed, vec!["x = 1"]);
    }

    #[test]
    fn synthesized_diff_parses_back() {
        let text = synthesize_added("new.py", "a = 1\nb = 2\n");
        let files = split_files(&text);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "new.py");
        assert_eq!(files[0].added, vec!["a = 1", "b = 2"]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("short", 10), "short");
        let cut = truncate("ééééé", 2);
        assert!(cut.starts_with("éé\n"));
        assert!(cut.ends_with("(diff truncated for length)"));
    }

    #[test]
    fn digest_tracks_content_only() {
        assert_eq!(digest(TWO_FILES), digest(&TWO_FILES.to_string()));
        assert_eq!(digest(TWO_FILES).len(), 64);
        assert_ne!(digest(TWO_FILES), digest(&TWO_FILES.replace("1500", "1501")));
    }
}
