//! One turn of the driving loop: run the current phase through the executor.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::core::types::PhaseUpdate;
use crate::core::workflow::WorkflowRun;
use crate::io::checkout::{GitCheckout, LocalCheckout, checkout_dir, feature_branch};
use crate::io::config::{config_path, load_config};
use crate::io::executor::{CommandExecutor, ExecRequest, Executor};
use crate::io::instructions::InstructionTable;
use crate::io::run_store::SnapshotStore;

/// Phase that clones the run's repository, when it names one.
const SETUP_PHASE: &str = "setup_repo";
/// Phase that publishes the feature branch before the agent opens the PR.
const PUBLISH_PHASE: &str = "create_pr";

/// What a step did. Only I/O problems (store, config, rendering) are errors;
/// executor and checkout failures are recorded on the phase and reported as
/// `Failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing saved under the run id.
    NoActiveWorkflow,
    /// Every phase is resolved.
    Finished,
    /// The current phase waits for a human decision; nothing was run.
    AwaitingApproval {
        phase: String,
        message: Option<String>,
    },
    /// The executor finished the phase. Gated phases now await approval;
    /// others are completed and the run has moved on.
    Ran {
        phase: String,
        output: String,
        awaiting_approval: bool,
    },
    /// The phase failed; it is marked failed and not advanced.
    Failed { phase: String, error: String },
}

/// Run the current phase with the agent command and instruction budget from
/// `<root>/.autofix/config.toml`.
pub fn run_configured_step(root: &Path, run_id: &str) -> Result<StepOutcome> {
    let cfg = load_config(&config_path(root))?;
    let executor = CommandExecutor::from_config(&cfg)?;
    let instructions = InstructionTable::from_config(&cfg)?;
    run_step(root, run_id, &executor, &instructions)
}

/// Run the current phase of the run saved under `run_id`.
///
/// The phase is marked in progress and saved before any work starts, so an
/// interrupted step is visible in the snapshot. Running a failed or rejected
/// phase again retries it.
pub fn run_step<E: Executor>(
    root: &Path,
    run_id: &str,
    executor: &E,
    instructions: &InstructionTable,
) -> Result<StepOutcome> {
    let store = SnapshotStore::for_root(root);

    let Some(mut run) = store.load(run_id)? else {
        return Ok(StepOutcome::NoActiveWorkflow);
    };
    if run.is_complete() {
        return Ok(StepOutcome::Finished);
    }
    if run.is_awaiting_approval() {
        let phase = current_name(&run);
        info!(run_id, phase = %phase, "awaiting approval");
        return Ok(StepOutcome::AwaitingApproval {
            message: run
                .current_phase()
                .and_then(|p| p.approval_message())
                .map(str::to_string),
            phase,
        });
    }

    let cfg = load_config(&config_path(root))?;
    let instruction = instructions.render_current(&run)?;
    let phase = instruction.phase.clone();
    let requires_approval = run
        .current_phase()
        .is_some_and(|p| p.requires_approval());

    run.record(PhaseUpdate::InProgress);
    store.save(run_id, &run)?;
    info!(run_id, phase = %phase, "running phase");

    let executed = prepare_workdir(root, run_id, &run, &phase).and_then(|workdir| {
        let request = ExecRequest {
            workdir,
            phase: phase.clone(),
            instruction: instruction.render(),
            log_path: log_path(root, run_id, &run),
            timeout: cfg.executor_timeout(),
            output_limit_bytes: cfg.executor_output_limit_bytes,
        };
        executor.exec(&request)
    });

    let outcome = match executed {
        Ok(response) => {
            if requires_approval {
                run.record(PhaseUpdate::AwaitingApproval {
                    preview: Some(response.output.clone()),
                });
            } else {
                run.record(PhaseUpdate::Completed {
                    output: Some(response.output.clone()),
                });
                run.advance_phase();
            }
            info!(run_id, phase = %phase, awaiting_approval = requires_approval, "phase finished");
            StepOutcome::Ran {
                phase,
                output: response.output,
                awaiting_approval: requires_approval,
            }
        }
        Err(err) => {
            let error = format!("{err:#}");
            warn!(run_id, phase = %phase, error = %error, "phase failed");
            run.record(PhaseUpdate::Failed {
                error: error.clone(),
            });
            StepOutcome::Failed { phase, error }
        }
    };

    store.save(run_id, &run)?;
    Ok(outcome)
}

/// Directory the executor runs in for `phase`.
///
/// `setup_repo` clones the run's repository (when it names one) and creates
/// the feature branch. `create_pr` commits and pushes whatever the agent left
/// in the checkout. Every phase runs in the checkout once it exists, and in
/// `root` otherwise.
fn prepare_workdir(root: &Path, run_id: &str, run: &WorkflowRun, phase: &str) -> Result<PathBuf> {
    let dir = checkout_dir(root, run_id);
    match (phase, run.repo_url.as_deref()) {
        (SETUP_PHASE, Some(url)) => {
            let checkout = GitCheckout::clone_repo(url, &dir)?;
            let base = checkout.default_branch()?;
            let branch = feature_branch(run.issue_key.as_deref());
            checkout.checkout_branch(&branch, true)?;
            info!(run_id, base = %base, branch = %branch, "checkout ready");
        }
        (PUBLISH_PHASE, _) if dir.exists() => {
            let checkout = GitCheckout::open(&dir);
            let message = format!("Fix {}", run.issue_key.as_deref().unwrap_or("issue"));
            if let Some(sha) = checkout.commit_all(&message)? {
                debug!(sha = %sha, "committed agent changes");
            }
            let branch = checkout.current_branch()?;
            checkout.push()?;
            info!(run_id, branch = %branch, "pushed feature branch");
        }
        _ => {}
    }
    if dir.exists() {
        return Ok(dir);
    }
    Ok(root.to_path_buf())
}

fn current_name(run: &WorkflowRun) -> String {
    run.current_phase()
        .map(|p| p.name().to_string())
        .unwrap_or_default()
}

/// `.autofix/logs/<run-id>/<n>-<phase>.log`, one file per phase (latest attempt).
fn log_path(root: &Path, run_id: &str, run: &WorkflowRun) -> PathBuf {
    root.join(".autofix")
        .join("logs")
        .join(run_id)
        .join(format!(
            "{}-{}.log",
            run.current_phase_index() + 1,
            current_name(run)
        ))
}
