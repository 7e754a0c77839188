//! Starting a workflow run and reading its state back.
//!
//! A run lives under a caller-chosen run id (for example a browser session).
//! Starting again under the same id discards the previous run and its
//! checkout.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::core::snapshot::WorkflowSnapshot;
use crate::core::workflow::WorkflowRun;
use crate::io::checkout::checkout_dir;
use crate::io::run_store::{SnapshotStore, validate_run_id};

/// Create and persist a fresh run for `issue_key`.
///
/// A blank `repo_url` is treated as absent, which leaves repository detection
/// to the executor.
pub fn start_run(
    root: &Path,
    run_id: &str,
    issue_key: &str,
    repo_url: Option<&str>,
) -> Result<WorkflowRun> {
    let issue_key = issue_key.trim();
    if issue_key.is_empty() {
        return Err(anyhow!("issue key is required"));
    }
    let repo_url = repo_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);

    validate_run_id(run_id)?;
    let store = SnapshotStore::for_root(root);
    match store.load(run_id) {
        Ok(Some(_)) => info!(run_id, "replacing existing run"),
        Ok(None) => {}
        Err(err) => warn!(run_id, error = %format!("{err:#}"), "replacing unreadable run"),
    }
    let checkout = checkout_dir(root, run_id);
    if checkout.exists() {
        fs::remove_dir_all(&checkout)
            .with_context(|| format!("remove stale checkout {}", checkout.display()))?;
    }
    let run = WorkflowRun::for_issue(issue_key, repo_url);
    store.save(run_id, &run)?;

    info!(run_id, issue_key, repo_url = ?run.repo_url, "run started");
    Ok(run)
}

/// Snapshot of the run saved under `run_id`, or `None` if there is none.
pub fn load_status(root: &Path, run_id: &str) -> Result<Option<WorkflowSnapshot>> {
    let store = SnapshotStore::for_root(root);
    Ok(store.load(run_id)?.map(|run| run.snapshot()))
}
