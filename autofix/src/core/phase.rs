//! The fixed phase registry.
//!
//! Seven phases, in order, with approval gates at `plan_fix` and
//! `security_review`. Every run copies its phase shape from here, both when it
//! is created and when it is restored from a snapshot.

/// Immutable template for one workflow position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTemplate {
    /// Stable identifier used for lookup and in snapshots.
    pub name: &'static str,
    /// Human-readable label.
    pub description: &'static str,
    /// Whether the run must halt here for a human decision.
    pub requires_approval: bool,
    /// Text shown at the gate. `Some` exactly when `requires_approval`.
    pub approval_message: Option<&'static str>,
}

impl PhaseTemplate {
    const fn step(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            requires_approval: false,
            approval_message: None,
        }
    }

    const fn gate(name: &'static str, description: &'static str, message: &'static str) -> Self {
        Self {
            name,
            description,
            requires_approval: true,
            approval_message: Some(message),
        }
    }
}

/// Number of phases in every run.
pub const PHASE_COUNT: usize = 7;

/// The ordered phase registry.
pub static PHASES: [PhaseTemplate; PHASE_COUNT] = [
    PhaseTemplate::step("gather_context", "Gather Jira Context"),
    PhaseTemplate::step("setup_repo", "Set Up Repository"),
    PhaseTemplate::gate(
        "plan_fix",
        "Plan the Fix",
        "Please review the proposed fix plan before implementation.",
    ),
    PhaseTemplate::step("implement_fix", "Implement the Fix"),
    PhaseTemplate::gate(
        "security_review",
        "Security & Code Review",
        "Please review the security findings before creating a PR.",
    ),
    PhaseTemplate::step("create_pr", "Create Pull Request"),
    PhaseTemplate::step("update_jira", "Update Jira Ticket"),
];

/// Template at `index`, or `None` past the end.
pub fn template_at(index: usize) -> Option<&'static PhaseTemplate> {
    PHASES.get(index)
}

/// Template with the given `name`.
pub fn template_named(name: &str) -> Option<&'static PhaseTemplate> {
    PHASES.iter().find(|template| template.name == name)
}

/// Registry phase names in workflow order.
pub fn phase_names() -> impl Iterator<Item = &'static str> {
    PHASES.iter().map(|template| template.name)
}
