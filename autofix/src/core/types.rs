//! Status and payload types for per-run phase instances.
//!
//! A phase instance stores a [`PhaseStatus`] and an optional [`PhaseResult`]
//! object, which is exactly what a snapshot carries. Callers should not poke at
//! the result object by key: writes go through [`PhaseUpdate`] and reads
//! through [`PhaseOutcome`], which tie the payload shape to the status.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle status of one phase within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    #[default]
    Pending,
    InProgress,
    AwaitingApproval,
    Approved,
    Rejected,
    Completed,
    Failed,
}

impl PhaseStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// True for statuses the core never transitions out of on its own.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Approved | Self::Rejected | Self::Completed | Self::Failed
        )
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const OUTPUT_KEY: &str = "result";
const ERROR_KEY: &str = "error";
const REJECTION_KEY: &str = "rejection_reason";

/// Structured payload attached to a phase (executor output, error, or
/// rejection reason). Serialized as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhaseResult(Map<String, Value>);

impl PhaseResult {
    /// `{"result": text}`
    pub fn output(text: impl Into<String>) -> Self {
        Self::single(OUTPUT_KEY, text.into())
    }

    /// `{"error": message}`
    pub fn error(message: impl Into<String>) -> Self {
        Self::single(ERROR_KEY, message.into())
    }

    /// `{"rejection_reason": reason}`
    pub fn rejection(reason: impl Into<String>) -> Self {
        Self::single(REJECTION_KEY, reason.into())
    }

    fn single(key: &str, value: String) -> Self {
        let mut map = Map::new();
        map.insert(key.to_string(), Value::String(value));
        Self(map)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }
}

impl From<Map<String, Value>> for PhaseResult {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A typed status change, lowered onto `(status, result)` by
/// [`PhaseUpdate::into_parts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseUpdate {
    Pending,
    InProgress,
    AwaitingApproval { preview: Option<String> },
    Approved { output: Option<String> },
    Rejected { reason: Option<String> },
    Completed { output: Option<String> },
    Failed { error: String },
}

impl PhaseUpdate {
    pub fn status(&self) -> PhaseStatus {
        match self {
            Self::Pending => PhaseStatus::Pending,
            Self::InProgress => PhaseStatus::InProgress,
            Self::AwaitingApproval { .. } => PhaseStatus::AwaitingApproval,
            Self::Approved { .. } => PhaseStatus::Approved,
            Self::Rejected { .. } => PhaseStatus::Rejected,
            Self::Completed { .. } => PhaseStatus::Completed,
            Self::Failed { .. } => PhaseStatus::Failed,
        }
    }

    /// Status plus the result to store. `None` leaves the existing result.
    pub fn into_parts(self) -> (PhaseStatus, Option<PhaseResult>) {
        let status = self.status();
        let result = match self {
            Self::Pending | Self::InProgress => None,
            Self::AwaitingApproval { preview: text }
            | Self::Approved { output: text }
            | Self::Completed { output: text } => text.map(PhaseResult::output),
            Self::Rejected { reason } => non_empty(reason).map(PhaseResult::rejection),
            Self::Failed { error } => Some(PhaseResult::error(error)),
        };
        (status, result)
    }
}

/// Empty reasons count as absent.
pub(crate) fn non_empty(reason: Option<String>) -> Option<String> {
    reason.filter(|r| !r.trim().is_empty())
}

/// Typed read view of a phase instance's status and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseOutcome<'a> {
    Pending,
    InProgress,
    AwaitingApproval { preview: Option<&'a str> },
    Approved { output: Option<&'a str> },
    Rejected { reason: Option<&'a str> },
    Completed { output: Option<&'a str> },
    Failed { error: Option<&'a str> },
}

impl<'a> PhaseOutcome<'a> {
    pub fn from_parts(status: PhaseStatus, result: Option<&'a PhaseResult>) -> Self {
        let field = |key: &str| result.and_then(|r| r.str_field(key));
        match status {
            PhaseStatus::Pending => Self::Pending,
            PhaseStatus::InProgress => Self::InProgress,
            PhaseStatus::AwaitingApproval => Self::AwaitingApproval {
                preview: field(OUTPUT_KEY),
            },
            PhaseStatus::Approved => Self::Approved {
                output: field(OUTPUT_KEY),
            },
            PhaseStatus::Rejected => Self::Rejected {
                reason: field(REJECTION_KEY),
            },
            PhaseStatus::Completed => Self::Completed {
                output: field(OUTPUT_KEY),
            },
            PhaseStatus::Failed => Self::Failed {
                error: field(ERROR_KEY),
            },
        }
    }
}
