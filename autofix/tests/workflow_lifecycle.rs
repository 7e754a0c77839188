//! Lifecycle tests that drive persisted runs through the public operations.
//!
//! Each transition goes through the snapshot store, so these also check that
//! nothing is lost between a save and the next load.

use std::fs;
use std::process::Command;

use autofix::core::types::{PhaseOutcome, PhaseStatus, PhaseUpdate};
use autofix::decide::{ApprovalOutcome, RejectionOutcome, approve, reject};
use autofix::io::config::AutofixConfig;
use autofix::io::instructions::InstructionTable;
use autofix::start::{load_status, start_run};
use autofix::step::{StepOutcome, run_step};
use autofix::io::checkout::checkout_dir;
use autofix::test_support::{ScriptedExecutor, TestWorkspace, git_identify, git_origin};

fn instructions() -> InstructionTable {
    InstructionTable::from_config(&AutofixConfig::default()).expect("instructions")
}

/// Walk a run from start to finish with both gates approved.
///
/// Sequence:
/// 1. `gather_context`, `setup_repo` run and complete.
/// 2. `plan_fix` runs, then waits. A further step does not call the executor.
/// 3. Approve, `implement_fix` runs, `security_review` runs and waits.
/// 4. Approve, `create_pr` and `update_jira` run.
/// 5. The next step reports `Finished`.
#[test]
fn full_run_with_both_gates_approved() {
    let ws = TestWorkspace::new();
    let root = ws.root();
    let table = instructions();
    let executor = ScriptedExecutor::succeeding(7);

    start_run(root, "s1", "TEST-1", None).expect("start");

    for expected in ["gather_context", "setup_repo"] {
        let outcome = run_step(root, "s1", &executor, &table).expect("step");
        assert!(
            matches!(outcome, StepOutcome::Ran { ref phase, awaiting_approval: false, .. } if phase == expected)
        );
    }

    let outcome = run_step(root, "s1", &executor, &table).expect("plan");
    assert!(matches!(outcome, StepOutcome::Ran { awaiting_approval: true, .. }));

    let outcome = run_step(root, "s1", &executor, &table).expect("blocked");
    assert_eq!(
        outcome,
        StepOutcome::AwaitingApproval {
            phase: "plan_fix".to_string(),
            message: Some("Please review the proposed fix plan before implementation.".to_string()),
        }
    );
    assert_eq!(executor.calls(), 3);

    assert_eq!(
        approve(root, "s1").expect("approve plan"),
        ApprovalOutcome::Approved {
            phase: "plan_fix".to_string(),
            next_phase: Some("implement_fix".to_string()),
        }
    );

    run_step(root, "s1", &executor, &table).expect("implement");
    let outcome = run_step(root, "s1", &executor, &table).expect("review");
    assert!(
        matches!(outcome, StepOutcome::Ran { ref phase, awaiting_approval: true, .. } if phase == "security_review")
    );
    assert!(matches!(
        approve(root, "s1").expect("approve review"),
        ApprovalOutcome::Approved { ref next_phase, .. } if next_phase.as_deref() == Some("create_pr")
    ));

    run_step(root, "s1", &executor, &table).expect("create pr");
    run_step(root, "s1", &executor, &table).expect("update jira");
    assert_eq!(
        run_step(root, "s1", &executor, &table).expect("done"),
        StepOutcome::Finished
    );

    // A finished run stays finished: nothing is reopened or run again.
    assert_eq!(
        reject(root, "s1", Some("late")).expect("reject"),
        RejectionOutcome::Finished
    );
    assert_eq!(
        run_step(root, "s1", &executor, &table).expect("still done"),
        StepOutcome::Finished
    );

    assert_eq!(
        executor.phases(),
        vec![
            "gather_context",
            "setup_repo",
            "plan_fix",
            "implement_fix",
            "security_review",
            "create_pr",
            "update_jira",
        ]
    );
    assert_eq!(executor.remaining(), 0);

    let snapshot = load_status(root, "s1").expect("status").expect("present");
    assert_eq!(snapshot.current_phase_index, 6);
    let statuses: Vec<PhaseStatus> = snapshot.phases.iter().map(|p| p.status).collect();
    assert_eq!(
        statuses,
        vec![
            PhaseStatus::Completed,
            PhaseStatus::Completed,
            PhaseStatus::Approved,
            PhaseStatus::Completed,
            PhaseStatus::Approved,
            PhaseStatus::Completed,
            PhaseStatus::Completed,
        ]
    );

    // Approved gates keep the agent's output from when they were awaiting.
    let plan = &snapshot.phases[2];
    let result = plan.result.as_ref().expect("plan result");
    assert_eq!(result.as_map()["result"], "output 3");
}

/// Reject the plan, run the phase again, then approve the retry.
#[test]
fn rejected_plan_is_retried() {
    let ws = TestWorkspace::new();
    let root = ws.root();
    let table = instructions();
    let executor = ScriptedExecutor::new(vec![
        Ok("context".into()),
        Ok("repo".into()),
        Ok("first plan".into()),
        Ok("second plan".into()),
    ]);

    start_run(root, "s1", "TEST-1", None).expect("start");
    for _ in 0..3 {
        run_step(root, "s1", &executor, &table).expect("step");
    }

    assert_eq!(
        reject(root, "s1", Some("insufficient detail")).expect("reject"),
        RejectionOutcome::Rejected {
            phase: "plan_fix".to_string(),
            reason: "insufficient detail".to_string(),
        }
    );
    assert_eq!(
        approve(root, "s1").expect("approve"),
        ApprovalOutcome::NotAwaitingApproval
    );

    let run = ws.store().load("s1").expect("load").expect("present");
    assert_eq!(run.current_phase_index(), 2);
    assert_eq!(
        run.phases()[2].outcome(),
        PhaseOutcome::Rejected {
            reason: Some("insufficient detail")
        }
    );

    let outcome = run_step(root, "s1", &executor, &table).expect("retry");
    assert_eq!(
        outcome,
        StepOutcome::Ran {
            phase: "plan_fix".to_string(),
            output: "second plan".to_string(),
            awaiting_approval: true,
        }
    );
    assert!(matches!(
        approve(root, "s1").expect("approve"),
        ApprovalOutcome::Approved { .. }
    ));
}

#[test]
fn failed_phase_is_retried_on_next_step() {
    let ws = TestWorkspace::new();
    let root = ws.root();
    let table = instructions();
    let executor = ScriptedExecutor::new(vec![Err("rate limited".into()), Ok("context".into())]);

    start_run(root, "s1", "TEST-1", None).expect("start");

    let outcome = run_step(root, "s1", &executor, &table).expect("step");
    assert_eq!(
        outcome,
        StepOutcome::Failed {
            phase: "gather_context".to_string(),
            error: "rate limited".to_string(),
        }
    );
    let snapshot = load_status(root, "s1").expect("status").expect("present");
    assert_eq!(snapshot.current_phase_index, 0);
    assert_eq!(snapshot.phases[0].status, PhaseStatus::Failed);
    assert_eq!(
        snapshot.phases[0].result.as_ref().expect("result").as_map()["error"],
        "rate limited"
    );

    let outcome = run_step(root, "s1", &executor, &table).expect("retry");
    assert!(matches!(outcome, StepOutcome::Ran { .. }));
    assert_eq!(executor.phases(), vec!["gather_context", "gather_context"]);
}

/// The core scenario from start to the first gate, saved after every change.
#[test]
fn manual_transitions_survive_persistence() {
    let ws = TestWorkspace::new();
    let store = ws.store();
    start_run(ws.root(), "s1", "TEST-1", None).expect("start");

    for _ in 0..2 {
        let mut run = store.load("s1").expect("load").expect("present");
        assert!(run.record(PhaseUpdate::Completed { output: None }));
        assert!(run.advance_phase());
        store.save("s1", &run).expect("save");
    }

    let mut run = store.load("s1").expect("load").expect("present");
    assert_eq!(run.current_phase_index(), 2);
    assert!(run.record(PhaseUpdate::AwaitingApproval { preview: None }));
    store.save("s1", &run).expect("save");

    let mut run = store.load("s1").expect("load").expect("present");
    assert!(run.is_awaiting_approval());
    assert!(run.approve_current_phase());
    assert!(run.advance_phase());
    store.save("s1", &run).expect("save");

    let run = store.load("s1").expect("load").expect("present");
    assert_eq!(run.current_phase_index(), 3);
    assert_eq!(run.phases()[2].status(), PhaseStatus::Approved);
    assert_eq!(run.current_phase().map(|p| p.name()), Some("implement_fix"));
}

#[test]
fn operations_without_a_run() {
    let ws = TestWorkspace::new();
    let executor = ScriptedExecutor::new(Vec::new());

    assert_eq!(
        run_step(ws.root(), "nobody", &executor, &instructions()).expect("step"),
        StepOutcome::NoActiveWorkflow
    );
    assert_eq!(
        approve(ws.root(), "nobody").expect("approve"),
        ApprovalOutcome::NoActiveWorkflow
    );
    assert_eq!(
        reject(ws.root(), "nobody", None).expect("reject"),
        RejectionOutcome::NoActiveWorkflow
    );
    assert!(load_status(ws.root(), "nobody").expect("status").is_none());
    assert_eq!(executor.calls(), 0);
}

#[test]
fn unsafe_run_id_is_an_error() {
    let ws = TestWorkspace::new();
    assert!(start_run(ws.root(), "../escape", "TEST-1", None).is_err());
    assert!(load_status(ws.root(), "a/b").is_err());
}

/// With a repository named, `setup_repo` clones it onto a feature branch,
/// later phases run inside the checkout, and `create_pr` commits and pushes
/// what the agent left there.
#[test]
fn repository_run_clones_and_pushes_feature_branch() {
    let ws = TestWorkspace::new();
    let root = ws.root();
    let table = instructions();
    let executor = ScriptedExecutor::succeeding(6);
    let origin = git_origin(root);

    start_run(root, "s1", "TEST-1", origin.to_str()).expect("start");
    let checkout = checkout_dir(root, "s1");

    run_step(root, "s1", &executor, &table).expect("gather");
    run_step(root, "s1", &executor, &table).expect("setup");
    assert!(checkout.join("README.md").exists());
    git_identify(&checkout);

    run_step(root, "s1", &executor, &table).expect("plan");
    approve(root, "s1").expect("approve plan");
    run_step(root, "s1", &executor, &table).expect("implement");
    // Stand-in for the agent's edit.
    fs::write(checkout.join("fix.txt"), "patched\n").expect("write");
    run_step(root, "s1", &executor, &table).expect("review");
    approve(root, "s1").expect("approve review");

    let outcome = run_step(root, "s1", &executor, &table).expect("create pr");
    assert!(matches!(outcome, StepOutcome::Ran { ref phase, .. } if phase == "create_pr"));

    let workdirs = executor.workdirs();
    assert_eq!(workdirs[0], root.to_path_buf());
    assert!(workdirs[1..].iter().all(|dir| *dir == checkout));

    let shown = Command::new("git")
        .arg("--git-dir")
        .arg(&origin)
        .args(["show", "fix/TEST-1:fix.txt"])
        .output()
        .expect("spawn git");
    assert!(shown.status.success(), "{}", String::from_utf8_lossy(&shown.stderr));
    assert_eq!(String::from_utf8_lossy(&shown.stdout), "patched\n");
}
