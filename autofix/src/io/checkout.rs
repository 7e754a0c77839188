//! Local checkout capability backed by the `git` CLI.
//!
//! When a run names a repository, `setup_repo` clones it into a run-scoped
//! directory and later phases execute there. `create_pr` commits and pushes
//! the feature branch before the agent opens the pull request.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

/// Fallback when the remote does not advertise a default branch.
pub const FALLBACK_DEFAULT_BRANCH: &str = "main";

/// `<root>/.autofix/checkouts/<run-id>`.
pub fn checkout_dir(root: &Path, run_id: &str) -> PathBuf {
    root.join(".autofix").join("checkouts").join(run_id)
}

/// Feature branch for an issue: `fix/<issue-key>`, with characters git would
/// refuse replaced by `-`.
pub fn feature_branch(issue_key: Option<&str>) -> String {
    let key: String = issue_key
        .unwrap_or("issue")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '-'
            }
        })
        .collect();
    format!("fix/{key}")
}

/// Operations on a local working copy.
pub trait LocalCheckout {
    fn workdir(&self) -> &Path;

    /// Check out `branch`, creating it at HEAD when `create` is set. Creating a
    /// branch that already exists checks it out instead.
    fn checkout_branch(&self, branch: &str, create: bool) -> Result<()>;

    /// Stage everything and commit. Returns the new commit sha, or `None`
    /// when there was nothing to commit.
    fn commit_all(&self, message: &str) -> Result<Option<String>>;

    /// Push the current branch to `origin`, setting upstream.
    fn push(&self) -> Result<()>;

    /// Default branch advertised by `origin`.
    fn default_branch(&self) -> Result<String>;

    fn current_branch(&self) -> Result<String>;
}

/// Working copy driven through `git` subprocess calls.
#[derive(Debug, Clone)]
pub struct GitCheckout {
    workdir: PathBuf,
}

impl GitCheckout {
    pub fn open(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    /// Clone `url` into `target`, replacing whatever is there.
    #[instrument(skip_all, fields(url, target = %target.display()))]
    pub fn clone_repo(url: &str, target: &Path) -> Result<Self> {
        if target.exists() {
            warn!("clone target exists, removing");
            fs::remove_dir_all(target)
                .with_context(|| format!("remove existing {}", target.display()))?;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create directory {}", parent.display()))?;
        }
        let output = Command::new("git")
            .arg("clone")
            .arg(url)
            .arg(target)
            .output()
            .context("spawn git clone")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git clone {url} failed: {}", stderr.trim()));
        }
        info!("cloned repository");
        Ok(Self::open(target))
    }

    fn head_sha(&self) -> Result<String> {
        Ok(self.run_capture(&["rev-parse", "HEAD"])?.trim().to_string())
    }

    fn has_staged_changes(&self) -> Result<bool> {
        let out = self.run(&["diff", "--cached", "--name-only"])?;
        Ok(!String::from_utf8_lossy(&out.stdout).trim().is_empty())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

impl LocalCheckout for GitCheckout {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    #[instrument(skip(self))]
    fn checkout_branch(&self, branch: &str, create: bool) -> Result<()> {
        if create {
            let out = self.run(&["checkout", "-b", branch])?;
            if out.status.success() {
                debug!("created branch");
                return Ok(());
            }
            let stderr = String::from_utf8_lossy(&out.stderr);
            if !stderr.contains("already exists") {
                return Err(anyhow!("git checkout -b {branch} failed: {}", stderr.trim()));
            }
            debug!("branch exists, checking it out");
        }
        self.run_checked(&["checkout", branch])?;
        Ok(())
    }

    #[instrument(skip_all)]
    fn commit_all(&self, message: &str) -> Result<Option<String>> {
        self.run_checked(&["add", "-A"])?;
        if !self.has_staged_changes()? {
            debug!("no staged changes, skipping commit");
            return Ok(None);
        }
        self.run_checked(&["commit", "-m", message])?;
        let sha = self.head_sha()?;
        debug!(sha = %sha, "committed");
        Ok(Some(sha))
    }

    #[instrument(skip(self))]
    fn push(&self) -> Result<()> {
        self.run_checked(&["push", "-u", "origin", "HEAD"])?;
        Ok(())
    }

    fn default_branch(&self) -> Result<String> {
        let out = self.run(&["symbolic-ref", "refs/remotes/origin/HEAD"])?;
        if !out.status.success() {
            debug!("origin HEAD unknown, assuming {FALLBACK_DEFAULT_BRANCH}");
            return Ok(FALLBACK_DEFAULT_BRANCH.to_string());
        }
        let full = String::from_utf8_lossy(&out.stdout);
        Ok(full
            .trim()
            .strip_prefix("refs/remotes/origin/")
            .unwrap_or(FALLBACK_DEFAULT_BRANCH)
            .to_string())
    }

    fn current_branch(&self) -> Result<String> {
        let name = self.run_capture(&["rev-parse", "--abbrev-ref", "HEAD"])?;
        let name = name.trim();
        if name == "HEAD" {
            return Err(anyhow!("detached HEAD"));
        }
        Ok(name.to_string())
    }
}
