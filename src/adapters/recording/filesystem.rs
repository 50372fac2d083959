//! Recording adapter for the `FileSystem` port.

use std::path::Path;

use serde_json::json;

use super::{record_interaction, record_result, SharedRecorder};
use crate::ports::{FileSystem, PortError};

/// Records filesystem calls while delegating to an inner implementation.
///
/// File contents passed to `write` are recorded so a replayed run can be
/// checked against what the live run produced.
pub struct RecordingFileSystem {
    inner: Box<dyn FileSystem>,
    recorder: SharedRecorder,
}

impl RecordingFileSystem {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn FileSystem>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl FileSystem for RecordingFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, PortError> {
        let result = self.inner.read_to_string(path);
        let input = json!({ "path": path.display().to_string() });
        record_result(&self.recorder, "fs", "read_to_string", &input, &result);
        result
    }

    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError> {
        let result = self.inner.write(path, contents);
        let input = json!({ "path": path.display().to_string(), "contents": contents });
        record_result(&self.recorder, "fs", "write", &input, &result);
        result
    }

    fn exists(&self, path: &Path) -> bool {
        let exists = self.inner.exists(path);
        let input = json!({ "path": path.display().to_string() });
        record_interaction(&self.recorder, "fs", "exists", &input, &exists);
        exists
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError> {
        let result = self.inner.rename(from, to);
        let input = json!({ "from": from.display().to_string(), "to": to.display().to_string() });
        record_result(&self.recorder, "fs", "rename", &input, &result);
        result
    }

    fn walk(&self, root: &Path, skip_dirs: &[String]) -> Result<Vec<String>, PortError> {
        let result = self.inner.walk(root, skip_dirs);
        let input = json!({ "root": root.display().to_string(), "skip_dirs": skip_dirs });
        record_result(&self.recorder, "fs", "walk", &input, &result);
        result
    }
}
