//! Phase instructions handed to the executor.
//!
//! Every registry phase maps to exactly one template, checked when the table
//! is built. A standing system section describing the whole workflow is
//! prepended to each instruction, and dropped first when the instruction would
//! exceed its byte budget.

use std::collections::BTreeSet;

use anyhow::{Context, Result, anyhow};
use minijinja::{Environment, context};
use serde::Serialize;
use tracing::debug;

use crate::core::phase::{self, PHASES, PhaseTemplate};
use crate::core::workflow::WorkflowRun;
use crate::io::config::AutofixConfig;

const SYSTEM_TEMPLATE: &str = include_str!("prompts/system.md");

const PHASE_TEMPLATES: [(&str, &str); 7] = [
    ("gather_context", include_str!("prompts/phases/gather_context.md")),
    ("setup_repo", include_str!("prompts/phases/setup_repo.md")),
    ("plan_fix", include_str!("prompts/phases/plan_fix.md")),
    ("implement_fix", include_str!("prompts/phases/implement_fix.md")),
    ("security_review", include_str!("prompts/phases/security_review.md")),
    ("create_pr", include_str!("prompts/phases/create_pr.md")),
    ("update_jira", include_str!("prompts/phases/update_jira.md")),
];

/// Instruction for a phase name with no template. Unreachable for registry
/// phases once [`validate_coverage`] has passed.
pub const FALLBACK_INSTRUCTION: &str = "Continue with the workflow";

const UNKNOWN_ISSUE: &str = "(unknown issue)";
const TRUNCATION_MARKER: &str = "\n[truncated]";

/// Check that `names` covers the registry exactly: no phase missing, no
/// unknown or duplicated name.
pub fn validate_coverage<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = BTreeSet::new();
    let mut errors = Vec::new();
    for name in names {
        if !seen.insert(name) {
            errors.push(format!("duplicate instruction for '{name}'"));
        }
        if phase::template_named(name).is_none() {
            errors.push(format!("instruction for unknown phase '{name}'"));
        }
    }
    for name in phase::phase_names() {
        if !seen.contains(name) {
            errors.push(format!("no instruction for phase '{name}'"));
        }
    }
    if errors.is_empty() {
        return Ok(());
    }
    Err(anyhow!("instruction table invalid: {}", errors.join("; ")))
}

#[derive(Debug, Clone, Serialize)]
struct PhaseContext {
    name: &'static str,
    description: &'static str,
    requires_approval: bool,
}

impl From<&PhaseTemplate> for PhaseContext {
    fn from(template: &PhaseTemplate) -> Self {
        Self {
            name: template.name,
            description: template.description,
            requires_approval: template.requires_approval,
        }
    }
}

/// A rendered instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub phase: String,
    /// Workflow-wide preamble; `None` once dropped for budget.
    pub system: Option<String>,
    /// Phase-specific task text.
    pub task: String,
}

impl Instruction {
    pub fn render(&self) -> String {
        match &self.system {
            Some(system) => format!("{system}\n\n## Current phase\n\n{}", self.task),
            None => self.task.clone(),
        }
    }

    fn fit_to_budget(&mut self, budget: usize) {
        if self.render().len() <= budget {
            return;
        }
        if self.system.take().is_some() {
            debug!(phase = %self.phase, "dropped system section for budget");
        }
        if self.task.len() <= budget {
            return;
        }
        let before_len = self.task.len();
        let mut cut = budget.saturating_sub(TRUNCATION_MARKER.len());
        while !self.task.is_char_boundary(cut) {
            cut -= 1;
        }
        self.task.truncate(cut);
        if budget > TRUNCATION_MARKER.len() {
            self.task.push_str(TRUNCATION_MARKER);
        }
        debug!(
            phase = %self.phase,
            before_len,
            after_len = self.task.len(),
            "truncated instruction for budget"
        );
    }
}

/// Total mapping from phase name to instruction template.
pub struct InstructionTable {
    env: Environment<'static>,
    budget_bytes: usize,
}

impl InstructionTable {
    /// Build the table, failing if the templates do not cover the registry.
    pub fn new(budget_bytes: usize) -> Result<Self> {
        validate_coverage(PHASE_TEMPLATES.iter().map(|(name, _)| *name))?;
        let mut env = Environment::new();
        env.add_template("system", SYSTEM_TEMPLATE)
            .context("load system template")?;
        for (name, source) in PHASE_TEMPLATES {
            env.add_template(name, source)
                .with_context(|| format!("load {name} template"))?;
        }
        Ok(Self { env, budget_bytes })
    }

    pub fn from_config(cfg: &AutofixConfig) -> Result<Self> {
        Self::new(cfg.instruction_budget_bytes)
    }

    /// Instruction for the run's current phase.
    pub fn render_current(&self, run: &WorkflowRun) -> Result<Instruction> {
        let phase = run
            .current_phase()
            .ok_or_else(|| anyhow!("no current phase (workflow already complete)"))?;
        self.render(run, phase.name())
    }

    /// Instruction for `phase_name` in the context of `run`.
    pub fn render(&self, run: &WorkflowRun, phase_name: &str) -> Result<Instruction> {
        let issue_key = run.issue_key.as_deref().unwrap_or(UNKNOWN_ISSUE);
        let repo_url = run.repo_url.as_deref();

        let task = match self.env.get_template(phase_name) {
            Ok(template) => template
                .render(context! { issue_key, repo_url })
                .with_context(|| format!("render {phase_name} instruction"))?,
            Err(_) => {
                debug!(phase = phase_name, "no template, using fallback instruction");
                FALLBACK_INSTRUCTION.to_string()
            }
        };

        let phases: Vec<PhaseContext> = PHASES.iter().map(PhaseContext::from).collect();
        let current = phase::template_named(phase_name).map(PhaseContext::from);
        let system = self
            .env
            .get_template("system")?
            .render(context! { issue_key, phases, current })
            .context("render system instruction")?;

        let mut instruction = Instruction {
            phase: phase_name.to_string(),
            system: Some(system.trim().to_string()),
            task: task.trim().to_string(),
        };
        instruction.fit_to_budget(self.budget_bytes);
        Ok(instruction)
    }
}
