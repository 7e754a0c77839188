//! Autofix configuration stored under `.autofix/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::io::fs_util::{read_optional, write_atomic};

/// Autofix configuration (TOML).
///
/// Edited by humans; missing fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AutofixConfig {
    /// Wall-clock limit for one executor invocation, in seconds.
    pub executor_timeout_secs: u64,

    /// Truncate captured executor stdout/stderr beyond this many bytes.
    pub executor_output_limit_bytes: usize,

    /// Upper bound on the rendered instruction handed to the executor.
    pub instruction_budget_bytes: usize,

    pub executor: ExecutorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Agent command; the instruction is written to its stdin.
    pub command: Vec<String>,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            command: vec!["claude".to_string(), "-p".to_string()],
        }
    }
}

impl Default for AutofixConfig {
    fn default() -> Self {
        Self {
            executor_timeout_secs: 10 * 60,
            executor_output_limit_bytes: 200_000,
            instruction_budget_bytes: 40_000,
            executor: ExecutorConfig::default(),
        }
    }
}

impl AutofixConfig {
    pub fn validate(&self) -> Result<()> {
        if self.executor_timeout_secs == 0 {
            return Err(anyhow!("executor_timeout_secs must be > 0"));
        }
        if self.executor_output_limit_bytes == 0 {
            return Err(anyhow!("executor_output_limit_bytes must be > 0"));
        }
        if self.instruction_budget_bytes == 0 {
            return Err(anyhow!("instruction_budget_bytes must be > 0"));
        }
        match self.executor.command.first() {
            Some(program) if !program.trim().is_empty() => Ok(()),
            _ => Err(anyhow!("executor.command must be a non-empty array")),
        }
    }

    pub fn executor_timeout(&self) -> Duration {
        Duration::from_secs(self.executor_timeout_secs)
    }
}

/// Default config location for a workspace `root`.
pub fn config_path(root: &Path) -> PathBuf {
    root.join(".autofix").join("config.toml")
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AutofixConfig::default()`.
pub fn load_config(path: &Path) -> Result<AutofixConfig> {
    let Some(contents) = read_optional(path)? else {
        debug!(path = %path.display(), "config missing, using defaults");
        return Ok(AutofixConfig::default());
    };
    let cfg: AutofixConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AutofixConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}
