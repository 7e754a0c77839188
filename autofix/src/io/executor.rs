//! Executor abstraction for agent invocation.
//!
//! The [`Executor`] trait decouples the driving loop from the agent backend.
//! [`CommandExecutor`] runs a configured command with the instruction on
//! stdin and treats its stdout as the phase result. Tests use scripted
//! executors that return canned outputs without spawning processes.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::config::AutofixConfig;
use crate::io::process::{ProcessOutput, run_with_timeout};

/// Parameters for one executor invocation.
#[derive(Debug, Clone)]
pub struct ExecRequest {
    /// Working directory for the agent.
    pub workdir: PathBuf,
    /// Phase being executed (for logs).
    pub phase: String,
    /// Instruction text fed to the agent.
    pub instruction: String,
    /// Where to write the captured stdout/stderr.
    pub log_path: PathBuf,
    pub timeout: Duration,
    /// Truncate captured output beyond this many bytes.
    pub output_limit_bytes: usize,
}

/// What the agent reported for a phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecResponse {
    pub output: String,
}

/// Abstraction over agent execution backends.
pub trait Executor {
    fn exec(&self, request: &ExecRequest) -> Result<ExecResponse>;
}

/// Executor that spawns an external agent command.
#[derive(Debug, Clone)]
pub struct CommandExecutor {
    command: Vec<String>,
}

impl CommandExecutor {
    pub fn new(command: Vec<String>) -> Result<Self> {
        if command.first().is_none_or(|program| program.trim().is_empty()) {
            return Err(anyhow!("executor command must not be empty"));
        }
        Ok(Self { command })
    }

    pub fn from_config(cfg: &AutofixConfig) -> Result<Self> {
        Self::new(cfg.executor.command.clone())
    }
}

impl Executor for CommandExecutor {
    #[instrument(skip_all, fields(phase = %request.phase, timeout_secs = request.timeout.as_secs()))]
    fn exec(&self, request: &ExecRequest) -> Result<ExecResponse> {
        info!(workdir = %request.workdir.display(), program = %self.command[0], "starting executor");

        let mut cmd = Command::new(&self.command[0]);
        cmd.args(&self.command[1..]).current_dir(&request.workdir);

        let output = run_with_timeout(
            cmd,
            Some(request.instruction.as_bytes()),
            request.timeout,
            request.output_limit_bytes,
        )
        .with_context(|| format!("run executor {}", self.command[0]))?;

        write_executor_log(&request.log_path, &output)?;

        if output.timed_out {
            warn!("executor timed out");
            return Err(anyhow!("executor timed out after {:?}", request.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "executor failed");
            let stderr = output.stderr_lossy();
            return Err(anyhow!(
                "executor failed with status {:?}: {}",
                output.status.code(),
                stderr.trim()
            ));
        }

        let text = output.stdout_lossy().trim().to_string();
        if text.is_empty() {
            return Err(anyhow!("executor produced no output"));
        }
        debug!(output_len = text.len(), "executor completed");
        Ok(ExecResponse { output: text })
    }
}

fn write_executor_log(path: &Path, output: &ProcessOutput) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("create executor log dir {}", parent.display()))?;
    }
    let mut buf = String::new();
    buf.push_str("=== stdout ===\n");
    buf.push_str(&output.stdout_lossy());
    if output.stdout_dropped > 0 {
        buf.push_str(&format!("\n[stdout truncated {} bytes]\n", output.stdout_dropped));
    }
    buf.push_str("\n=== stderr ===\n");
    buf.push_str(&output.stderr_lossy());
    if output.stderr_dropped > 0 {
        buf.push_str(&format!("\n[stderr truncated {} bytes]\n", output.stderr_dropped));
    }
    if output.timed_out {
        buf.push_str("\n[executor timed out]\n");
    }
    fs::write(path, buf).with_context(|| format!("write executor log {}", path.display()))
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn request(dir: &Path) -> ExecRequest {
        ExecRequest {
            workdir: dir.to_path_buf(),
            phase: "plan_fix".to_string(),
            instruction: "Analyze the codebase".to_string(),
            log_path: dir.join("logs").join("plan_fix.log"),
            timeout: Duration::from_secs(5),
            output_limit_bytes: 10_000,
        }
    }

    fn sh(script: &str) -> CommandExecutor {
        CommandExecutor::new(vec!["sh".into(), "-c".into(), script.into()]).expect("executor")
    }

    #[test]
    fn returns_trimmed_stdout_and_writes_log() {
        let temp = tempfile::tempdir().expect("tempdir");
        let req = request(temp.path());
        let response = sh("read line; echo \"plan for: $line\"")
            .exec(&req)
            .expect("exec");
        assert_eq!(response.output, "plan for: Analyze the codebase");

        let log = fs::read_to_string(&req.log_path).expect("log");
        assert!(log.contains("=== stdout ===\nplan for: Analyze the codebase"));
    }

    #[test]
    fn non_zero_exit_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = sh("echo quota exceeded >&2; exit 2")
            .exec(&request(temp.path()))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Some(2)"));
        assert!(msg.contains("quota exceeded"));
    }

    #[test]
    fn empty_output_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = sh("cat >/dev/null").exec(&request(temp.path())).unwrap_err();
        assert!(err.to_string().contains("no output"));
    }

    #[test]
    fn rejects_empty_command() {
        assert!(CommandExecutor::new(Vec::new()).is_err());
        assert!(CommandExecutor::new(vec![" ".to_string()]).is_err());
    }
}
