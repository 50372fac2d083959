//! Filesystem port for file I/O operations.

use std::path::Path;

use super::PortError;

/// Reads, writes and walks files on behalf of the core.
pub trait FileSystem: Send + Sync {
    /// Reads the entire contents of a file as a UTF-8 string.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist or is not valid UTF-8.
    fn read_to_string(&self, path: &Path) -> Result<String, PortError>;

    /// Writes the given contents to a file, creating or overwriting it.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails (permissions, disk full, etc.).
    fn write(&self, path: &Path, contents: &str) -> Result<(), PortError>;

    /// Returns `true` if the path exists.
    fn exists(&self, path: &Path) -> bool;

    /// Renames `from` over `to`, replacing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(&self, from: &Path, to: &Path) -> Result<(), PortError>;

    /// Lists files under `root` as `/`-separated paths relative to it, sorted,
    /// skipping hidden entries, paths excluded by `.gitignore` files and
    /// directories whose name is in `skip_dirs`.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` cannot be read.
    fn walk(&self, root: &Path, skip_dirs: &[String]) -> Result<Vec<String>, PortError>;
}
