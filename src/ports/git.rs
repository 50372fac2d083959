//! Git repository port for version-control queries.

use super::PortError;

/// Read access to the repository holding the pipeline sources.
///
/// Paths are relative to the repository root; `since` is any revision git
/// understands (`HEAD~1`, a commit hash, a tag).
pub trait GitRepo: Send + Sync {
    /// Returns `true` if the project root is inside a git work tree.
    fn is_repository(&self) -> bool;

    /// Returns the hash of the current HEAD commit.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository has no commits or is invalid.
    fn current_commit(&self) -> Result<String, PortError>;

    /// Lists tracked files that differ between `since` and the working tree.
    ///
    /// # Errors
    ///
    /// Returns an error if `since` does not resolve.
    fn changed_files(&self, since: &str) -> Result<Vec<String>, PortError>;

    /// Unified diff between `since` and the working tree, limited to `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if the diff cannot be computed.
    fn diff(&self, since: &str, paths: &[String]) -> Result<String, PortError>;

    /// Lists untracked files that are not ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the listing fails.
    fn untracked_files(&self) -> Result<Vec<String>, PortError>;

    /// Lists all tracked files.
    ///
    /// # Errors
    ///
    /// Returns an error if the file list cannot be retrieved.
    fn list_files(&self) -> Result<Vec<String>, PortError>;
}
