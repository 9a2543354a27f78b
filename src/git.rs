//! Git access for the publish stage.
//!
//! Repository probing (is this a repo, where is origin, which branch is
//! checked out) goes through `git2` and never prints anything. Operations
//! that need the porcelain or the LFS extension (`lfs`, `commit`, `push`)
//! shell out to the `git` binary through [`run_git`].

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use git2::Repository;

#[derive(thiserror::Error, Debug)]
pub enum GitError {
    #[error("failed to execute git {command}: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("git {command} failed (exit code {code}): {}", .output.message())]
    Command {
        command: String,
        code: i32,
        output: GitOutput,
    },

    #[error("failed to open repository at {path}: {source}")]
    Open { path: PathBuf, source: git2::Error },

    #[error("no remote 'origin' found, set a remote and try again")]
    MissingOrigin,
}

impl GitError {
    /// `git commit` refused because the index matches HEAD.
    pub fn is_nothing_to_commit(&self) -> bool {
        match self {
            GitError::Command { output, .. } => {
                output.stdout.contains("nothing to commit")
                    || output.stderr.contains("nothing to commit")
            }
            _ => false,
        }
    }
}

/// Captured output of a git invocation.
#[derive(Debug, Clone, Default)]
pub struct GitOutput {
    /// Standard output (trimmed)
    pub stdout: String,
    /// Standard error (trimmed)
    pub stderr: String,
}

impl GitOutput {
    fn from_output(output: &Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }

    /// The most useful diagnostic: stderr, or stdout when stderr is empty.
    pub fn message(&self) -> &str {
        if self.stderr.is_empty() {
            &self.stdout
        } else {
            &self.stderr
        }
    }
}

/// Run `git <args>` in `cwd`, failing on a non-zero exit.
pub fn run_git<P: AsRef<Path>>(cwd: P, args: &[&str]) -> Result<GitOutput, GitError> {
    let command = args.first().copied().unwrap_or_default().to_string();

    let output = Command::new("git")
        .current_dir(cwd.as_ref())
        .args(args)
        .output()
        .map_err(|source| GitError::Spawn {
            command: command.clone(),
            source,
        })?;

    let git_output = GitOutput::from_output(&output);
    if output.status.success() {
        Ok(git_output)
    } else {
        Err(GitError::Command {
            command,
            code: output.status.code().unwrap_or(-1),
            output: git_output,
        })
    }
}

/// A repository discovered from a path inside its working tree.
pub struct GitRepo {
    repo: Repository,
}

impl GitRepo {
    /// Find the repository containing `path`. `None` when there is none.
    pub fn discover(path: &Path) -> Option<Self> {
        match Repository::discover(path) {
            Ok(repo) => Some(Self { repo }),
            Err(e) => {
                tracing::debug!("no git repository at {}: {}", path.display(), e.message());
                None
            }
        }
    }

    /// Open the repository rooted exactly at `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = Repository::open(path).map_err(|source| GitError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { repo })
    }

    /// Working tree root; `None` for bare repositories.
    pub fn workdir(&self) -> Option<&Path> {
        self.repo.workdir()
    }

    /// URL of the `origin` remote.
    pub fn origin_url(&self) -> Result<String, GitError> {
        let remote = self
            .repo
            .find_remote("origin")
            .map_err(|_| GitError::MissingOrigin)?;
        match remote.url() {
            Some(url) if !url.is_empty() => Ok(url.to_string()),
            _ => Err(GitError::MissingOrigin),
        }
    }

    /// Short name of the checked-out branch; `None` on a detached or unborn HEAD.
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }
}
