//! Human decisions at approval checkpoints.

use std::path::Path;

use anyhow::Result;
use tracing::info;

use crate::core::workflow::WorkflowRun;
use crate::io::run_store::SnapshotStore;

/// Reason recorded when a rejection carries none.
pub const DEFAULT_REJECTION_REASON: &str = "Rejected by user";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApprovalOutcome {
    NoActiveWorkflow,
    /// The current phase is not waiting on a decision; nothing changed.
    NotAwaitingApproval,
    /// The gate was approved and the run moved on. `next_phase` is `None`
    /// when the approved phase was the last one.
    Approved {
        phase: String,
        next_phase: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionOutcome {
    NoActiveWorkflow,
    /// Every phase is resolved; there is nothing to reject.
    Finished,
    /// The current phase is rejected and stays current for a retry.
    Rejected { phase: String, reason: String },
}

/// Approve the pending gate of the run under `run_id` and advance past it.
pub fn approve(root: &Path, run_id: &str) -> Result<ApprovalOutcome> {
    let store = SnapshotStore::for_root(root);
    let Some(mut run) = store.load(run_id)? else {
        return Ok(ApprovalOutcome::NoActiveWorkflow);
    };
    let phase = current_name(&run);
    if !run.approve_current_phase() {
        info!(run_id, phase = ?phase, "approve ignored: not awaiting approval");
        return Ok(ApprovalOutcome::NotAwaitingApproval);
    }
    let next_phase = if run.advance_phase() {
        current_name(&run)
    } else {
        None
    };
    store.save(run_id, &run)?;

    info!(run_id, phase = ?phase, next_phase = ?next_phase, "phase approved");
    Ok(ApprovalOutcome::Approved {
        phase: phase.unwrap_or_default(),
        next_phase,
    })
}

/// Reject the current phase of the run under `run_id`.
///
/// Any unresolved phase may be rejected, gated or not. A finished run stays
/// finished. A blank `reason` falls back to [`DEFAULT_REJECTION_REASON`]. The
/// run does not advance.
pub fn reject(root: &Path, run_id: &str, reason: Option<&str>) -> Result<RejectionOutcome> {
    let store = SnapshotStore::for_root(root);
    let Some(mut run) = store.load(run_id)? else {
        return Ok(RejectionOutcome::NoActiveWorkflow);
    };
    if run.is_complete() {
        info!(run_id, "reject ignored: run finished");
        return Ok(RejectionOutcome::Finished);
    }
    let reason = reason
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REJECTION_REASON);
    let Some(phase) = current_name(&run) else {
        return Ok(RejectionOutcome::Finished);
    };
    run.reject_current_phase(Some(reason));
    store.save(run_id, &run)?;

    info!(run_id, phase = %phase, reason, "phase rejected");
    Ok(RejectionOutcome::Rejected {
        phase,
        reason: reason.to_string(),
    })
}

fn current_name(run: &WorkflowRun) -> Option<String> {
    run.current_phase().map(|p| p.name().to_string())
}
