//! Test-only helpers: a scripted executor, a throwaway workspace, and git
//! fixtures.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Result, anyhow};
use tempfile::TempDir;

use crate::io::config::{AutofixConfig, config_path, write_config};
use crate::io::executor::{ExecRequest, ExecResponse, Executor};
use crate::io::run_store::SnapshotStore;

/// Executor that replays canned outputs in order and records every request.
///
/// `Err` entries become executor failures with that message. Running past the
/// end of the script is an error.
pub struct ScriptedExecutor {
    script: RefCell<VecDeque<Result<String, String>>>,
    requests: RefCell<Vec<ExecRequest>>,
}

impl ScriptedExecutor {
    pub fn new(script: Vec<Result<String, String>>) -> Self {
        Self {
            script: RefCell::new(script.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    /// Executor that succeeds `n` times with `"output <k>"`.
    pub fn succeeding(n: usize) -> Self {
        Self::new((1..=n).map(|k| Ok(format!("output {k}"))).collect())
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    /// Phase names in call order.
    pub fn phases(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.phase.clone()).collect()
    }

    /// Rendered instructions in call order.
    pub fn instructions(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.instruction.clone())
            .collect()
    }

    /// Working directories in call order.
    pub fn workdirs(&self) -> Vec<PathBuf> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.workdir.clone())
            .collect()
    }

    pub fn remaining(&self) -> usize {
        self.script.borrow().len()
    }
}

impl Executor for ScriptedExecutor {
    fn exec(&self, request: &ExecRequest) -> Result<ExecResponse> {
        self.requests.borrow_mut().push(request.clone());
        match self.script.borrow_mut().pop_front() {
            Some(Ok(output)) => Ok(ExecResponse { output }),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted executor exhausted at {}", request.phase)),
        }
    }
}

/// Temporary workspace root with a default config written out.
pub struct TestWorkspace {
    dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let workspace = Self { dir };
        workspace.write_config(&AutofixConfig::default());
        workspace
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::for_root(self.root())
    }

    pub fn write_config(&self, cfg: &AutofixConfig) {
        write_config(&config_path(self.root()), cfg).expect("write config");
    }
}

impl Default for TestWorkspace {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `git` in `dir`, panicking with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("spawn git");
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
}

/// Give a repository a committer identity.
pub fn git_identify(dir: &Path) {
    git(dir, &["config", "user.name", "Autofix Test"]);
    git(dir, &["config", "user.email", "autofix@example.com"]);
}

/// Bare `<root>/origin.git` with one commit (`README.md`) on `main`.
pub fn git_origin(root: &Path) -> PathBuf {
    let origin = root.join("origin.git");
    fs::create_dir_all(&origin).expect("mkdir origin");
    git(&origin, &["init", "--bare", "-b", "main"]);

    let seed = root.join("seed");
    fs::create_dir_all(&seed).expect("mkdir seed");
    git(&seed, &["init", "-b", "main"]);
    git_identify(&seed);
    fs::write(seed.join("README.md"), "seed\n").expect("write");
    git(&seed, &["add", "-A"]);
    git(&seed, &["commit", "-m", "seed"]);
    git(&seed, &["remote", "add", "origin", origin.to_str().expect("utf8")]);
    git(&seed, &["push", "origin", "main"]);
    origin
}
