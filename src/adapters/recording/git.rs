//! Recording adapter for the `GitRepo` port.

use serde_json::json;

use super::{record_interaction, record_result, SharedRecorder};
use crate::ports::{GitRepo, PortError};

/// Records git queries while delegating to an inner implementation.
pub struct RecordingGitRepo {
    inner: Box<dyn GitRepo>,
    recorder: SharedRecorder,
}

impl RecordingGitRepo {
    /// Wraps `inner`.
    pub fn new(inner: Box<dyn GitRepo>, recorder: SharedRecorder) -> Self {
        Self { inner, recorder }
    }
}

impl GitRepo for RecordingGitRepo {
    fn is_repository(&self) -> bool {
        let answer = self.inner.is_repository();
        record_interaction(&self.recorder, "git", "is_repository", &(), &answer);
        answer
    }

    fn current_commit(&self) -> Result<String, PortError> {
        let result = self.inner.current_commit();
        record_result(&self.recorder, "git", "current_commit", &(), &result);
        result
    }

    fn changed_files(&self, since: &str) -> Result<Vec<String>, PortError> {
        let result = self.inner.changed_files(since);
        record_result(&self.recorder, "git", "changed_files", &json!({ "since": since }), &result);
        result
    }

    fn diff(&self, since: &str, paths: &[String]) -> Result<String, PortError> {
        let result = self.inner.diff(since, paths);
        let input = json!({ "since": since, "paths": paths });
        record_result(&self.recorder, "git", "diff", &input, &result);
        result
    }

    fn untracked_files(&self) -> Result<Vec<String>, PortError> {
        let result = self.inner.untracked_files();
        record_result(&self.recorder, "git", "untracked_files", &(), &result);
        result
    }

    fn list_files(&self) -> Result<Vec<String>, PortError> {
        let result = self.inner.list_files();
        record_result(&self.recorder, "git", "list_files", &(), &result);
        result
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::adapters::live::git::LiveGitRepo;
    use crate::cassette::{Cassette, CassetteRecorder};

    #[test]
    fn records_is_repository_and_failed_commit() {
        let dir = tempfile::tempdir().unwrap();
        let cassette_path = dir.path().join("git.cassette.yaml");
        let recorder = Arc::new(Mutex::new(CassetteRecorder::new(&cassette_path, "test", "abc")));

        let git =
            RecordingGitRepo::new(Box::new(LiveGitRepo::new(dir.path())), Arc::clone(&recorder));
        assert!(!git.is_repository());
        assert!(git.current_commit().is_err());

        recorder.lock().unwrap().save().unwrap();
        let cassette = Cassette::load(&cassette_path).unwrap();
        assert_eq!(cassette.interactions[0].method, "is_repository");
        assert_eq!(cassette.interactions[0].output, json!(false));
        assert!(cassette.interactions[1].output.get("Err").is_some());
    }
}
