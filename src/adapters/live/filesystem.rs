//! Live filesystem adapter using `std::fs` and `ignore`.

use std::path::Path;

use ignore::WalkBuilder;

use crate::ports::filesystem::FileSystem;
use crate::ports::PortError;

/// Live filesystem adapter backed by real disk I/O.
pub struct LiveFileSystem;

impl FileSystem for LiveFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        Ok(std::fs::read_to_string(path)?)
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(std::fs::write(path, contents)?)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        Ok(std::fs::rename(from, to)?)
    }

    fn walk(&self, root: &Path, skip_dirs: &[String]) -> Result<Vec<String>, PortError> {
        if !root.is_dir() {
            return Err(format!("not a directory: {}", root.display()).into());
        }
        let skip: Vec<String> = skip_dirs.to_vec();
        let walker = WalkBuilder::new(root)
            .require_git(false)
            .filter_entry(move |entry| {
                let name = entry.file_name().to_str();
                let skipped = name.is_some_and(|name| skip.iter().any(|s| s == name));
                entry.depth() == 0 || !entry.file_type().is_some_and(|t| t.is_dir()) || !skipped
            })
            .build();
        let mut files = Vec::new();
        let entries = walker.filter_map(Result::ok);
        for entry in entries.filter(|e| e.file_type().is_some_and(|t| t.is_file())) {
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let parts: Vec<_> =
                relative.components().map(|c| c.as_os_str().to_string_lossy()).collect();
            files.push(parts.join("/"));
        }
        files.sort();
        Ok(files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_lists_relative_paths_and_skips_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        fs.write(&dir.path().join("src/app.py"), "x = 1\n").unwrap();
        fs.write(&dir.path().join("node_modules/lib.js"), "").unwrap();
        fs.write(&dir.path().join("README.md"), "").unwrap();

        let files = fs.walk(dir.path(), &["node_modules".to_string()]).unwrap();
        assert_eq!(files, vec!["README.md", "src/app.py"]);
    }

    #[test]
    fn walk_honours_gitignore_outside_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        fs.write(&dir.path().join(".gitignore"), "generated/\n*.log\n").unwrap();
        fs.write(&dir.path().join("pipeline.py"), "run()\n").unwrap();
        fs.write(&dir.path().join("generated/schema.py"), "").unwrap();
        fs.write(&dir.path().join("ingest.log"), "").unwrap();
        fs.write(&dir.path().join(".cache/blob.py"), "").unwrap();

        let files = fs.walk(dir.path(), &[]).unwrap();
        assert_eq!(files, vec!["pipeline.py"]);
    }

    #[test]
    fn rename_replaces_target() {
        let dir = tempfile::tempdir().unwrap();
        let fs = LiveFileSystem;
        let tmp = dir.path().join("diagram.html.tmp");
        let target = dir.path().join("diagram.html");
        fs.write(&target, "old").unwrap();
        fs.write(&tmp, "new").unwrap();

        fs.rename(&tmp, &target).unwrap();
        assert_eq!(fs.read_to_string(&target).unwrap(), "new");
        assert!(!fs.exists(&tmp));
    }
}
