//! Live git adapter using `git` CLI commands.

use std::path::PathBuf;
use std::process::Command;

use crate::ports::git::GitRepo;
use crate::ports::PortError;

/// Live git adapter that shells out to the `git` CLI inside `root`.
pub struct LiveGitRepo {
    root: PathBuf,
}

impl LiveGitRepo {
    /// Creates an adapter for the repository containing `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn run(&self, args: &[&str]) -> Result<String, PortError> {
        let output = Command::new("git").arg("-C").arg(&self.root).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(format!("git {} failed: {}", args.join(" "), stderr.trim()).into());
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn run_lines(&self, args: &[&str]) -> Result<Vec<String>, PortError> {
        Ok(self.run(args)?.lines().filter(|l| !l.is_empty()).map(String::from).collect())
    }
}

impl GitRepo for LiveGitRepo {
    fn is_repository(&self) -> bool {
        self.run(&["rev-parse", "--is-inside-work-tree"]).is_ok_and(|out| out.trim() == "true")
    }

    fn current_commit(&self) -> Result<String, PortError> {
        Ok(self.run(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn changed_files(&self, since: &str) -> Result<Vec<String>, PortError> {
        self.run_lines(&["diff", "--name-only", since])
    }

    fn diff(&self, since: &str, paths: &[String]) -> Result<String, PortError> {
        let mut args = vec!["diff", since, "--"];
        args.extend(paths.iter().map(String::as_str));
        self.run(&args)
    }

    fn untracked_files(&self) -> Result<Vec<String>, PortError> {
        self.run_lines(&["ls-files", "--others", "--exclude-standard"])
    }

    fn list_files(&self) -> Result<Vec<String>, PortError> {
        self.run_lines(&["ls-files"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_directory_is_not_a_repository() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!LiveGitRepo::new(dir.path()).is_repository());
    }
}
