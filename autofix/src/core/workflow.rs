//! Workflow run state and its transition operations.
//!
//! A [`WorkflowRun`] is plain data: every operation is an in-memory read or
//! mutation with no I/O, and degraded conditions (no current phase, wrong
//! status for the operation) come back as `false`/`None` rather than errors.
//! Persistence and concurrency control belong to the caller.

use crate::core::phase::{PHASE_COUNT, PHASES, PhaseTemplate};
use crate::core::snapshot::{PhaseSnapshot, WorkflowSnapshot};
use crate::core::types::{PhaseOutcome, PhaseResult, PhaseStatus, PhaseUpdate, non_empty};

/// One phase of one run: registry shape plus mutable status and result.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseInstance {
    template: &'static PhaseTemplate,
    status: PhaseStatus,
    result: Option<PhaseResult>,
}

impl PhaseInstance {
    fn from_template(template: &'static PhaseTemplate) -> Self {
        Self {
            template,
            status: PhaseStatus::Pending,
            result: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.template.name
    }

    pub fn description(&self) -> &'static str {
        self.template.description
    }

    pub fn requires_approval(&self) -> bool {
        self.template.requires_approval
    }

    pub fn approval_message(&self) -> Option<&'static str> {
        self.template.approval_message
    }

    pub fn status(&self) -> PhaseStatus {
        self.status
    }

    pub fn result(&self) -> Option<&PhaseResult> {
        self.result.as_ref()
    }

    /// Typed view of status and payload.
    pub fn outcome(&self) -> PhaseOutcome<'_> {
        PhaseOutcome::from_parts(self.status, self.result.as_ref())
    }

    fn snapshot(&self) -> PhaseSnapshot {
        PhaseSnapshot {
            name: self.name().to_string(),
            description: self.description().to_string(),
            status: self.status,
            requires_approval: self.requires_approval(),
            result: self.result.clone(),
        }
    }
}

/// Mutable state of one issue-resolution attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowRun {
    /// External issue identifier.
    pub issue_key: Option<String>,
    /// Target repository. `None` defers detection to the executor.
    pub repo_url: Option<String>,
    current_phase_index: usize,
    phases: [PhaseInstance; PHASE_COUNT],
}

impl Default for WorkflowRun {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowRun {
    /// Fresh run: every phase pending, pointer at the first phase.
    pub fn new() -> Self {
        Self {
            issue_key: None,
            repo_url: None,
            current_phase_index: 0,
            phases: std::array::from_fn(|i| PhaseInstance::from_template(&PHASES[i])),
        }
    }

    /// Fresh run for `issue_key`, optionally pinned to `repo_url`.
    pub fn for_issue(issue_key: impl Into<String>, repo_url: Option<String>) -> Self {
        Self {
            issue_key: Some(issue_key.into()),
            repo_url,
            ..Self::new()
        }
    }

    pub fn current_phase_index(&self) -> usize {
        self.current_phase_index
    }

    pub fn phases(&self) -> &[PhaseInstance] {
        &self.phases
    }

    pub fn phase(&self, name: &str) -> Option<&PhaseInstance> {
        self.phases.iter().find(|phase| phase.name() == name)
    }

    /// Phase under the pointer, or `None` once the index is past the end.
    pub fn current_phase(&self) -> Option<&PhaseInstance> {
        self.phases.get(self.current_phase_index)
    }

    fn current_phase_mut(&mut self) -> Option<&mut PhaseInstance> {
        self.phases.get_mut(self.current_phase_index)
    }

    pub fn is_awaiting_approval(&self) -> bool {
        self.current_phase()
            .is_some_and(|phase| phase.status == PhaseStatus::AwaitingApproval)
    }

    /// True when there is nothing left to run: the pointer is past the end, or
    /// it rests on the last phase and that phase resolved successfully.
    pub fn is_complete(&self) -> bool {
        match self.current_phase() {
            None => true,
            Some(phase) => {
                self.current_phase_index == PHASE_COUNT - 1
                    && matches!(phase.status, PhaseStatus::Completed | PhaseStatus::Approved)
            }
        }
    }

    /// Set the current phase's status, replacing its result when one is given.
    ///
    /// Returns `false` without changing anything when there is no current
    /// phase, or when `AwaitingApproval` is requested on a phase that has no
    /// approval gate.
    pub fn set_phase_status(&mut self, status: PhaseStatus, result: Option<PhaseResult>) -> bool {
        let Some(phase) = self.current_phase_mut() else {
            return false;
        };
        if status == PhaseStatus::AwaitingApproval && !phase.requires_approval() {
            return false;
        }
        phase.status = status;
        if let Some(result) = result {
            phase.result = Some(result);
        }
        true
    }

    /// Apply a typed update to the current phase (see [`Self::set_phase_status`]).
    pub fn record(&mut self, update: PhaseUpdate) -> bool {
        let (status, result) = update.into_parts();
        self.set_phase_status(status, result)
    }

    /// Move the pointer forward by one phase.
    ///
    /// Returns `false` and leaves the pointer unchanged when already on (or
    /// past) the last phase, or when the current phase is still waiting at its
    /// approval gate. No other status is checked.
    pub fn advance_phase(&mut self) -> bool {
        if self.is_awaiting_approval() {
            return false;
        }
        if self.current_phase_index + 1 < PHASE_COUNT {
            self.current_phase_index += 1;
            return true;
        }
        false
    }

    /// Approve the current phase if it is awaiting approval. Does not advance.
    pub fn approve_current_phase(&mut self) -> bool {
        if !self.is_awaiting_approval() {
            return false;
        }
        self.set_phase_status(PhaseStatus::Approved, None)
    }

    /// Reject the current phase from any status. A non-empty `reason` replaces
    /// the result with `{"rejection_reason": reason}`. Does not advance.
    pub fn reject_current_phase(&mut self, reason: Option<&str>) -> bool {
        let result = non_empty(reason.map(str::to_string)).map(PhaseResult::rejection);
        self.set_phase_status(PhaseStatus::Rejected, result)
    }

    /// Canonical serializable form.
    pub fn snapshot(&self) -> WorkflowSnapshot {
        WorkflowSnapshot {
            issue_key: self.issue_key.clone(),
            repo_url: self.repo_url.clone(),
            current_phase_index: self.current_phase_index,
            phases: self.phases.iter().map(PhaseInstance::snapshot).collect(),
        }
    }

    /// Rebuild a run from a snapshot.
    ///
    /// Phase shape always comes from the registry. Snapshot phase entries are
    /// applied by position (status and result only); entries beyond the
    /// registry are ignored and missing ones stay pending. The index is taken
    /// as-is, even when out of range.
    pub fn restore(snapshot: &WorkflowSnapshot) -> Self {
        let mut run = Self::new();
        run.issue_key = snapshot.issue_key.clone();
        run.repo_url = snapshot.repo_url.clone();
        run.current_phase_index = snapshot.current_phase_index;
        for (phase, saved) in run.phases.iter_mut().zip(&snapshot.phases) {
            phase.status = saved.status;
            phase.result = saved.result.clone();
        }
        run
    }
}

impl From<&WorkflowSnapshot> for WorkflowRun {
    fn from(snapshot: &WorkflowSnapshot) -> Self {
        Self::restore(snapshot)
    }
}
