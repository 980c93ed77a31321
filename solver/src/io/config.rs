//! Solver configuration stored as `solver.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

/// Solver configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to
/// sensible values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SolverConfig {
    /// Command that turns a prompt on stdin into a completion on stdout.
    pub model_command: Vec<String>,

    /// Wall-clock budget for one model call in seconds.
    pub model_timeout_secs: u64,

    /// Wall-clock budget for one candidate-code execution in seconds.
    ///
    /// Generated code can loop forever; this bound is what keeps a
    /// pathological candidate from hanging the run.
    pub exec_timeout_secs: u64,

    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,

    /// Hard cap on stage transitions per workflow invocation.
    pub step_budget: u32,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            model_command: vec!["codex".to_string(), "exec".to_string(), "-".to_string()],
            model_timeout_secs: 120,
            exec_timeout_secs: 5,
            output_limit_bytes: 100_000,
            step_budget: 70,
        }
    }
}

impl SolverConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model_command.is_empty() || self.model_command[0].trim().is_empty() {
            return Err(anyhow!("model_command must be a non-empty array"));
        }
        if self.model_timeout_secs == 0 {
            return Err(anyhow!("model_timeout_secs must be > 0"));
        }
        if self.exec_timeout_secs == 0 {
            return Err(anyhow!("exec_timeout_secs must be > 0"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        if self.step_budget == 0 {
            return Err(anyhow!("step_budget must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `SolverConfig::default()`.
pub fn load_config(path: &Path) -> Result<SolverConfig> {
    if !path.exists() {
        let cfg = SolverConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SolverConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &SolverConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, SolverConfig::default());
    }

    #[test]
    fn write_then_load_round_trips() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("solver.toml");
        let cfg = SolverConfig {
            exec_timeout_secs: 2,
            ..SolverConfig::default()
        };
        write_config(&path, &cfg).expect("write");
        let loaded = load_config(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn validate_rejects_empty_model_command() {
        let cfg = SolverConfig {
            model_command: Vec::new(),
            ..SolverConfig::default()
        };
        assert!(cfg.validate().is_err());
    }
}
