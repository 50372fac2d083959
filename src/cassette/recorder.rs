//! Records interactions into a cassette file.

use std::path::{Path, PathBuf};

use chrono::Utc;

use super::format::{Cassette, Interaction};
use super::CassetteError;

/// Accumulates interactions and writes them as a YAML cassette.
#[derive(Debug)]
pub struct CassetteRecorder {
    path: PathBuf,
    name: String,
    commit: String,
    interactions: Vec<Interaction>,
}

impl CassetteRecorder {
    /// Creates a recorder that will write to `path`.
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        commit: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            commit: commit.into(),
            interactions: Vec::new(),
        }
    }

    /// Appends an interaction; `seq` is its position in the recording.
    pub fn record(
        &mut self,
        port: impl Into<String>,
        method: impl Into<String>,
        input: serde_json::Value,
        output: serde_json::Value,
    ) {
        let seq = self.interactions.len() as u64;
        self.interactions.push(Interaction {
            seq,
            port: port.into(),
            method: method.into(),
            input,
            output,
        });
    }

    /// Sets the commit stamped on the cassette.
    pub fn set_commit(&mut self, commit: impl Into<String>) {
        self.commit = commit.into();
    }

    /// Number of interactions recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Returns `true` if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Destination file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes everything recorded so far. Can be called repeatedly.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self) -> Result<PathBuf, CassetteError> {
        let cassette = Cassette {
            name: self.name.clone(),
            recorded_at: Utc::now(),
            commit: self.commit.clone(),
            interactions: self.interactions.clone(),
        };
        cassette.save(&self.path)?;
        Ok(self.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_assigns_sequence_and_saves() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.cassette.yaml");

        let mut recorder = CassetteRecorder::new(&path, "recording", "unknown");
        recorder.record("git", "current_commit", json!(null), json!({"Ok": "deadbeef"}));
        recorder.record("llm", "complete", json!({"prompt": "hi"}), json!({"Ok": {"text": "bye"}}));
        recorder.set_commit("deadbeef");
        assert_eq!(recorder.len(), 2);

        assert_eq!(recorder.save().unwrap(), path);
        let cassette = Cassette::load(&path).unwrap();
        assert_eq!(cassette.commit, "deadbeef");
        assert_eq!(cassette.interactions[1].seq, 1);
        assert_eq!(cassette.interactions[1].port, "llm");
    }
}
