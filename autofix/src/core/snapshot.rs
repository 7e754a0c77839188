//! Canonical serialized form of a workflow run.
//!
//! This shape is what gets persisted between invocations, so field names and
//! order are a stable contract. Every field is optional on input.

use serde::{Deserialize, Serialize};

use crate::core::types::{PhaseResult, PhaseStatus};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WorkflowSnapshot {
    #[serde(default)]
    pub issue_key: Option<String>,
    #[serde(default)]
    pub repo_url: Option<String>,
    #[serde(default)]
    pub current_phase_index: usize,
    #[serde(default)]
    pub phases: Vec<PhaseSnapshot>,
}

/// Per-phase entry. `name`, `description` and `requires_approval` are written
/// for readers of the snapshot; restore only reads `status` and `result`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: PhaseStatus,
    #[serde(default)]
    pub requires_approval: bool,
    #[serde(default)]
    pub result: Option<PhaseResult>,
}
