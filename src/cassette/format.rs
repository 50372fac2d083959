//! Cassette data structures.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CassetteError;

/// A single recorded interaction with an external port.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    /// Sequence number, assigned by the recorder.
    pub seq: u64,
    /// Port name (`llm`, `fs`, `git`, `clock`).
    pub port: String,
    /// Method name invoked on the port.
    pub method: String,
    /// Arguments of the call.
    pub input: serde_json::Value,
    /// Returned value; fallible methods use `{"Ok": v}` / `{"Err": "msg"}`.
    pub output: serde_json::Value,
}

/// A named, ordered sequence of recorded interactions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cassette {
    /// Human-readable name for this cassette.
    pub name: String,
    /// When this cassette was recorded.
    pub recorded_at: DateTime<Utc>,
    /// Git commit hash at recording time.
    pub commit: String,
    /// Ordered list of interactions.
    pub interactions: Vec<Interaction>,
}

impl Cassette {
    /// Reads a YAML cassette file.
    ///
    /// # Errors
    ///
    /// Returns [`CassetteError::Io`] or [`CassetteError::Yaml`].
    pub fn load(path: &Path) -> Result<Self, CassetteError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| CassetteError::Io { path: path.to_path_buf(), source })?;
        serde_yaml::from_str(&content)
            .map_err(|source| CassetteError::Yaml { path: path.to_path_buf(), source })
    }

    /// Writes the cassette as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`CassetteError::Io`] or [`CassetteError::Yaml`].
    pub fn save(&self, path: &Path) -> Result<(), CassetteError> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|source| CassetteError::Yaml { path: path.to_path_buf(), source })?;
        std::fs::write(path, yaml)
            .map_err(|source| CassetteError::Io { path: path.to_path_buf(), source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn save_then_load_preserves_interactions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.cassette.yaml");
        let cassette = Cassette {
            name: "update".into(),
            recorded_at: Utc::now(),
            commit: "abc123".into(),
            interactions: vec![Interaction {
                seq: 0,
                port: "git".into(),
                method: "changed_files".into(),
                input: json!({"since": "HEAD~1"}),
                output: json!({"Ok": ["src/chunk.py"]}),
            }],
        };
        cassette.save(&path).unwrap();
        assert_eq!(Cassette::load(&path).unwrap(), cassette);
    }

    #[test]
    fn load_reports_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "interactions: [").unwrap();
        assert!(matches!(Cassette::load(&path), Err(CassetteError::Yaml { .. })));
        let missing = Cassette::load(&dir.path().join("missing.yaml"));
        assert!(matches!(missing, Err(CassetteError::Io { .. })));
    }
}
