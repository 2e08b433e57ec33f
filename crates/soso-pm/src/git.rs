//! Source-control collaborators
//!
//! Package contents are fetched by cloning a tagged revision; publishing tags
//! the project's repository and pushes the tag. Both go through the `git`
//! executable.

use crate::registry::Locator;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Errors from running source-control commands
#[derive(Debug, Error)]
pub enum FetchError {
    /// `git` could not be started
    #[error("Git is not installed or not in PATH")]
    GitNotFound,

    /// Process spawn failed for another reason
    #[error("Failed to run git: {0}")]
    Spawn(#[source] std::io::Error),

    /// Command exited unsuccessfully
    #[error("Git command failed (git {command}): {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Locator names no repository
    #[error("Invalid locator: {0}")]
    InvalidLocator(String),
}

/// Materializes a version's file tree from its locator
pub trait Fetcher: Send + Sync {
    /// Place the tree for `locator` at `destination`, which must not exist yet
    fn fetch(&self, locator: &Locator, destination: &Path) -> Result<(), FetchError>;
}

/// Repository operations needed to publish
pub trait SourceControl {
    /// True when the working tree has no uncommitted changes
    fn is_clean(&self, repo: &Path) -> Result<bool, FetchError>;

    /// URL of the `origin` remote, if configured
    fn remote_url(&self, repo: &Path) -> Result<Option<String>, FetchError>;

    /// Create an annotated tag
    fn create_tag(&self, repo: &Path, tag: &str, message: &str) -> Result<(), FetchError>;

    /// Delete a local tag
    fn delete_tag(&self, repo: &Path, tag: &str) -> Result<(), FetchError>;

    /// Push all tags to the default remote
    fn push_tags(&self, repo: &Path) -> Result<(), FetchError>;
}

/// Collaborator backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitClient {
    program: PathBuf,
}

impl Default for GitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GitClient {
    /// Use `git` from `PATH`
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }

    /// Use a specific git executable
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Run git and return trimmed stdout
    fn run(&self, args: &[&str], cwd: Option<&Path>) -> Result<String, FetchError> {
        debug!("Executing: git {}", args.join(" "));

        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::GitNotFound
            } else {
                FetchError::Spawn(e)
            }
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(FetchError::CommandFailed {
                command: args.join(" "),
                stderr: if stderr.is_empty() { stdout } else { stderr },
            });
        }

        Ok(stdout)
    }
}

impl Fetcher for GitClient {
    fn fetch(&self, locator: &Locator, destination: &Path) -> Result<(), FetchError> {
        if locator.url.is_empty() {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }

        let dest = destination.to_string_lossy();
        self.run(&clone_args(locator, &dest), None).map(|_| ())
    }
}

/// `git clone` arguments; `--` keeps a hostile URL from reading as an option
fn clone_args<'a>(locator: &'a Locator, dest: &'a str) -> Vec<&'a str> {
    let mut args = vec!["clone", "--depth", "1"];
    if let Some(tag) = &locator.tag {
        args.extend(["--branch", tag.as_str()]);
    }
    args.extend(["--", locator.url.as_str(), dest]);
    args
}

impl SourceControl for GitClient {
    fn is_clean(&self, repo: &Path) -> Result<bool, FetchError> {
        Ok(self.run(&["status", "--porcelain"], Some(repo))?.is_empty())
    }

    fn remote_url(&self, repo: &Path) -> Result<Option<String>, FetchError> {
        match self.run(&["remote", "get-url", "origin"], Some(repo)) {
            Ok(url) if !url.is_empty() => Ok(Some(url)),
            Ok(_) | Err(FetchError::CommandFailed { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn create_tag(&self, repo: &Path, tag: &str, message: &str) -> Result<(), FetchError> {
        self.run(&["tag", "-a", tag, "-m", message], Some(repo))
            .map(|_| ())
    }

    fn delete_tag(&self, repo: &Path, tag: &str) -> Result<(), FetchError> {
        self.run(&["tag", "-d", tag], Some(repo)).map(|_| ())
    }

    fn push_tags(&self, repo: &Path) -> Result<(), FetchError> {
        self.run(&["push", "--tags"], Some(repo)).map(|_| ())
    }
}
