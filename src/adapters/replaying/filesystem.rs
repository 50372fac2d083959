//! Replaying adapter for the `FileSystem` port.

use std::path::Path;

use super::{next_output, replay_result, replay_value, SharedReplayer};
use crate::ports::{FileSystem, PortError};

/// Serves recorded filesystem results; nothing touches the disk.
pub struct ReplayingFileSystem {
    replayer: SharedReplayer,
}

impl ReplayingFileSystem {
    /// Creates a filesystem backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self { replayer }
    }

    fn replay<T: serde::de::DeserializeOwned>(&self, method: &str) -> Result<T, PortError> {
        replay_result(next_output(&self.replayer, "fs", method), &format!("fs::{method}"))
    }
}

impl FileSystem for ReplayingFileSystem {
    fn read_to_string(&self, _path: &Path) -> Result<String, PortError> {
        self.replay("read_to_string")
    }

    fn write(&self, _path: &Path, _contents: &str) -> Result<(), PortError> {
        self.replay("write")
    }

    fn exists(&self, _path: &Path) -> bool {
        replay_value(&self.replayer, "fs", "exists")
    }

    fn rename(&self, _from: &Path, _to: &Path) -> Result<(), PortError> {
        self.replay("rename")
    }

    fn walk(&self, _root: &Path, _skip_dirs: &[String]) -> Result<Vec<String>, PortError> {
        self.replay("walk")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::replayer_for;
    use super::*;

    #[test]
    fn replays_reads_and_failures() {
        let replayer = replayer_for(vec![
            ("fs", "exists", json!(true)),
            ("fs", "read_to_string", json!({"Ok": "flowchart TD"})),
            ("fs", "read_to_string", json!({"Err": "permission denied"})),
            ("fs", "write", json!({"Ok": null})),
        ]);
        let fs = ReplayingFileSystem::new(replayer);
        let path = Path::new("diagram.md");
        assert!(fs.exists(path));
        assert_eq!(fs.read_to_string(path).unwrap(), "flowchart TD");
        assert!(fs.read_to_string(path).unwrap_err().to_string().contains("permission"));
        fs.write(path, "x").unwrap();
    }
}
