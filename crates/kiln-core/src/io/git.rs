//! Git operations through the `git` executable.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use thiserror::Error;

use super::tool::{ToolError, find_tool};

#[derive(Error, Debug)]
pub enum GitError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {args} failed ({status}): {stderr}")]
    Failed {
        args: String,
        status: String,
        stderr: String,
    },
}

/// Handle to the host `git` binary.
#[derive(Debug, Clone)]
pub struct GitClient {
    binary: PathBuf,
}

impl GitClient {
    /// Find `git` on the `PATH`.
    pub fn locate() -> Result<Self, GitError> {
        Ok(Self {
            binary: find_tool("git")?,
        })
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Create a bare mirror of `url` at `dest`.
    pub fn clone_bare(&self, url: &str, dest: &Path) -> Result<(), GitError> {
        self.run(
            None,
            [
                OsStr::new("clone"),
                OsStr::new("--bare"),
                OsStr::new(url),
                dest.as_os_str(),
            ],
        )
        .map(drop)
    }

    /// Bring a bare mirror up to date with its origin. Branches and tags are
    /// force-updated; deleted upstream branches are pruned.
    pub fn fetch(&self, mirror: &Path) -> Result<(), GitError> {
        self.run(
            Some(mirror),
            [
                "fetch",
                "--prune",
                "--tags",
                "origin",
                "+refs/heads/*:refs/heads/*",
            ]
            .map(OsStr::new),
        )
        .map(drop)
    }

    /// Clone a working copy from a local mirror.
    pub fn clone_from_mirror(&self, mirror: &Path, dest: &Path) -> Result<(), GitError> {
        self.run(
            None,
            [OsStr::new("clone"), mirror.as_os_str(), dest.as_os_str()],
        )
        .map(drop)
    }

    /// Point `origin` of a working copy at `url`.
    pub fn set_origin(&self, repo: &Path, url: &str) -> Result<(), GitError> {
        self.run(Some(repo), ["remote", "set-url", "origin", url].map(OsStr::new))
            .map(drop)
    }

    /// Check out a branch, tag or commit, discarding local changes.
    pub fn checkout(&self, repo: &Path, reference: &str) -> Result<(), GitError> {
        self.run(Some(repo), ["checkout", "-f", reference].map(OsStr::new))
            .map(drop)
    }

    /// Commit that `reference` points at in `remote` (a URL or a local
    /// repository path), if any.
    pub fn ls_remote(&self, remote: &str, reference: &str) -> Result<Option<String>, GitError> {
        let out = self.run(None, ["ls-remote", remote, reference].map(OsStr::new))?;
        Ok(out
            .lines()
            .filter_map(|line| line.split_whitespace().next())
            .next()
            .map(str::to_string))
    }

    fn run<I, S>(&self, cwd: Option<&Path>, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        tracing::debug!("git {:?}", args);
        let output = cmd.output()?;
        if !output.status.success() {
            return Err(GitError::Failed {
                args: args
                    .iter()
                    .map(|a| a.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Whether `reference` is a full 40-character commit hash.
pub fn is_commit_hash(reference: &str) -> bool {
    reference.len() == 40 && reference.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Whether `path` looks like a usable bare repository.
pub fn is_bare_repository(path: &Path) -> bool {
    path.join("HEAD").is_file() && path.join("objects").is_dir()
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Throwaway repositories for tests that need a real `git`.

    use std::ffi::OsStr;
    use std::fs;
    use std::path::Path;

    use super::GitClient;

    /// The host git, or `None` to skip the calling test.
    pub(crate) fn git() -> Option<GitClient> {
        GitClient::locate().ok()
    }

    /// Make `dir` a repository on `main` with `file.txt` = "hello". Returns
    /// the commit.
    pub(crate) fn init_repo(git: &GitClient, dir: &Path) -> String {
        fs::create_dir_all(dir).unwrap();
        git.run(Some(dir), ["init", "-q", "-b", "main"].map(OsStr::new))
            .unwrap();
        commit_file(git, dir, "file.txt", "hello")
    }

    /// Commit `body` as `name` on the current branch. Returns the commit.
    pub(crate) fn commit_file(git: &GitClient, dir: &Path, name: &str, body: &str) -> String {
        fs::write(dir.join(name), body).unwrap();
        git.run(Some(dir), ["add", name].map(OsStr::new)).unwrap();
        git.run(
            Some(dir),
            [
                "-c",
                "user.name=kiln",
                "-c",
                "user.email=kiln@example.com",
                "commit",
                "-q",
                "-m",
                name,
            ]
            .map(OsStr::new),
        )
        .unwrap();
        head(git, dir)
    }

    pub(crate) fn branch(git: &GitClient, dir: &Path, name: &str) {
        git.run(Some(dir), ["branch", name].map(OsStr::new)).unwrap();
    }

    pub(crate) fn head(git: &GitClient, dir: &Path) -> String {
        git.run(Some(dir), ["rev-parse", "HEAD"].map(OsStr::new))
            .unwrap()
            .trim()
            .to_string()
    }
}
