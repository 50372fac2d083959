//! Replaying adapter for the `GitRepo` port.

use super::{next_output, replay_result, replay_value, SharedReplayer};
use crate::ports::{GitRepo, PortError};

/// Serves recorded git answers.
pub struct ReplayingGitRepo {
    replayer: SharedReplayer,
}

impl ReplayingGitRepo {
    /// Creates a repository backed by `replayer`.
    #[must_use]
    pub fn new(replayer: SharedReplayer) -> Self {
        Self { replayer }
    }

    fn replay<T: serde::de::DeserializeOwned>(&self, method: &str) -> Result<T, PortError> {
        replay_result(next_output(&self.replayer, "git", method), &format!("git::{method}"))
    }
}

impl GitRepo for ReplayingGitRepo {
    fn is_repository(&self) -> bool {
        replay_value(&self.replayer, "git", "is_repository")
    }

    fn current_commit(&self) -> Result<String, PortError> {
        self.replay("current_commit")
    }

    fn changed_files(&self, _since: &str) -> Result<Vec<String>, PortError> {
        self.replay("changed_files")
    }

    fn diff(&self, _since: &str, _paths: &[String]) -> Result<String, PortError> {
        self.replay("diff")
    }

    fn untracked_files(&self) -> Result<Vec<String>, PortError> {
        self.replay("untracked_files")
    }

    fn list_files(&self) -> Result<Vec<String>, PortError> {
        self.replay("list_files")
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::super::replayer_for;
    use super::*;

    #[test]
    fn replays_repository_queries() {
        let replayer = replayer_for(vec![
            ("git", "is_repository", json!(true)),
            ("git", "current_commit", json!({"Ok": "abc123def"})),
            ("git", "changed_files", json!({"Ok": ["src/chunk.py", "README.md"]})),
            ("git", "diff", json!({"Err": "unknown revision"})),
        ]);
        let git = ReplayingGitRepo::new(replayer);
        assert!(git.is_repository());
        assert_eq!(git.current_commit().unwrap(), "abc123def");
        assert_eq!(git.changed_files("HEAD~1").unwrap().len(), 2);
        assert!(git.diff("nope", &[]).is_err());
        assert!(git.untracked_files().is_err());
    }
}
