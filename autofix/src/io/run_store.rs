//! Snapshot persistence keyed by run id (`.autofix/runs/<run-id>.json`).
//!
//! One file per run. The caller owns concurrency: two writers on the same run
//! id race, and the last rename wins.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::core::snapshot::WorkflowSnapshot;
use crate::core::workflow::WorkflowRun;
use crate::io::fs_util::{read_optional, write_atomic};

const SNAPSHOT_SCHEMA: &str = include_str!("../../schemas/workflow_snapshot.schema.json");

static RUN_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._-]*$").unwrap());

/// Reject run ids that are not safe as a single file name.
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.is_empty() {
        return Err(anyhow!("run id must not be empty"));
    }
    if !RUN_ID_RE.is_match(run_id) {
        return Err(anyhow!(
            "run id must be [A-Za-z0-9._-] and start alphanumeric (got '{run_id}')"
        ));
    }
    Ok(())
}

/// Directory-backed store of workflow snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under `<root>/.autofix/runs`.
    pub fn for_root(root: &Path) -> Self {
        Self::new(root.join(".autofix").join("runs"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, run_id: &str) -> Result<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.dir.join(format!("{run_id}.json")))
    }

    /// Load the run saved under `run_id`; `None` if there is no active run.
    #[instrument(skip(self))]
    pub fn load(&self, run_id: &str) -> Result<Option<WorkflowRun>> {
        let path = self.path_for(run_id)?;
        let Some(contents) = read_optional(&path)? else {
            debug!(path = %path.display(), "no snapshot");
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse snapshot {}", path.display()))?;
        validate_snapshot(&value).with_context(|| format!("snapshot {}", path.display()))?;
        let snapshot: WorkflowSnapshot = serde_json::from_value(value)
            .with_context(|| format!("deserialize snapshot {}", path.display()))?;
        let run = WorkflowRun::restore(&snapshot);
        debug!(
            issue_key = ?run.issue_key,
            phase_index = run.current_phase_index(),
            "snapshot loaded"
        );
        Ok(Some(run))
    }

    /// Atomically persist `run` under `run_id`, replacing any previous snapshot.
    #[instrument(skip(self, run))]
    pub fn save(&self, run_id: &str, run: &WorkflowRun) -> Result<()> {
        let path = self.path_for(run_id)?;
        debug!(
            path = %path.display(),
            phase_index = run.current_phase_index(),
            "writing snapshot"
        );
        let mut buf = serde_json::to_string_pretty(&run.snapshot())?;
        buf.push('\n');
        write_atomic(&path, &buf)
    }
}

fn validate_snapshot(instance: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SNAPSHOT_SCHEMA).context("parse snapshot schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    let messages: Vec<String> = compiled
        .iter_errors(instance)
        .map(|err| err.to_string())
        .collect();
    if !messages.is_empty() {
        return Err(anyhow!(
            "snapshot schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use crate::core::types::PhaseUpdate;

    #[test]
    fn save_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::for_root(temp.path());

        let mut run = WorkflowRun::for_issue("TEST-1", Some("https://example.com/r".into()));
        run.record(PhaseUpdate::Completed {
            output: Some("issue summary".to_string()),
        });
        run.advance_phase();

        store.save("session-1", &run).expect("save");
        let loaded = store.load("session-1").expect("load").expect("present");
        assert_eq!(loaded, run);
    }

    #[test]
    fn missing_run_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::for_root(temp.path());
        assert!(store.load("nobody").expect("load").is_none());
    }

    #[test]
    fn rejects_path_like_run_ids() {
        let store = SnapshotStore::new("/tmp/unused");
        for bad in ["", "../escape", "a/b", ".hidden"] {
            assert!(store.path_for(bad).is_err(), "{bad:?} should be rejected");
        }
        assert!(store.path_for("run-1.retry_2").is_ok());
    }

    #[test]
    fn load_rejects_schema_violations() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::for_root(temp.path());
        let path = store.path_for("bad").expect("path");
        fs::create_dir_all(store.dir()).expect("mkdir");
        fs::write(&path, r#"{"phases": [{"status": "done"}]}"#).expect("write");

        let err = store.load("bad").unwrap_err();
        assert!(format!("{err:#}").contains("schema validation failed"));
    }

    /// Hand-trimmed snapshots still load: absent fields take defaults.
    #[test]
    fn load_accepts_partial_snapshot() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::for_root(temp.path());
        fs::create_dir_all(store.dir()).expect("mkdir");
        fs::write(
            store.path_for("partial").expect("path"),
            r#"{"issue_key": "ABC-9", "current_phase_index": 1}"#,
        )
        .expect("write");

        let run = store.load("partial").expect("load").expect("present");
        assert_eq!(run.issue_key.as_deref(), Some("ABC-9"));
        assert_eq!(run.current_phase_index(), 1);
        assert!(run.repo_url.is_none());
    }

    /// Out-of-range indexes and surplus phase entries load like `restore`
    /// treats them: index as-is, extra entries ignored.
    #[test]
    fn load_tolerates_out_of_range_shape() {
        let temp = tempfile::tempdir().expect("tempdir");
        let store = SnapshotStore::for_root(temp.path());
        fs::create_dir_all(store.dir()).expect("mkdir");
        let phases: Vec<String> = (0..9)
            .map(|_| r#"{"status": "completed"}"#.to_string())
            .collect();
        fs::write(
            store.path_for("wide").expect("path"),
            format!(r#"{{"current_phase_index": 12, "phases": [{}]}}"#, phases.join(",")),
        )
        .expect("write");

        let run = store.load("wide").expect("load").expect("present");
        assert_eq!(run.current_phase_index(), 12);
        assert_eq!(run.phases().len(), 7);
        assert!(run.current_phase().is_none());
        assert!(run.is_complete());
    }
}
