//! Code-execution judge for candidate solutions.
//!
//! The [`CodeJudge`] trait decouples the execute stage from how candidate
//! code actually runs. [`PythonJudge`] runs the candidate as a single-file
//! script under an embedded harness that restricts the builtin namespace,
//! inside a child process with a hard wall-clock limit. This is a weak
//! sandbox for accident containment, not a security boundary against hostile
//! code.

use std::fs;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};

use crate::core::extract::normalize;
use crate::core::types::ExecResult;
use crate::io::process::run_command_with_timeout;

const HARNESS: &str = include_str!("py/harness.py");

/// Harness exit code for a runtime fault in the candidate.
const EXIT_RUNTIME_FAULT: i32 = 2;
/// Harness exit code when the candidate invoked a termination primitive.
const EXIT_EXPLICIT: i32 = 3;

/// Abstraction over candidate-code execution backends.
///
/// A judge never fails: every failure mode is encoded in the returned
/// [`ExecResult`] so the pipeline can route it into debugging.
pub trait CodeJudge {
    fn judge(&self, code: &str, sample_input: &str, expected_output: &str) -> ExecResult;
}

/// Judge that executes candidates with the system `python3`.
#[derive(Debug, Clone)]
pub struct PythonJudge {
    python: String,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl PythonJudge {
    pub fn new(timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            python: "python3".to_string(),
            timeout,
            output_limit_bytes,
        }
    }

    #[instrument(skip_all, fields(code_bytes = code.len()))]
    fn run(&self, code: &str, sample_input: &str, expected_output: &str) -> Result<ExecResult> {
        let workdir = tempfile::tempdir().context("create judge workdir")?;
        let harness_path = workdir.path().join("harness.py");
        let solution_path = workdir.path().join("solution.py");
        fs::write(&harness_path, HARNESS).context("write harness")?;
        fs::write(&solution_path, code).context("write solution")?;

        let mut cmd = Command::new(&self.python);
        cmd.arg(&harness_path).arg(&solution_path);
        let mut stdin = sample_input.trim().to_string();
        stdin.push('\n');

        let output = run_command_with_timeout(
            cmd,
            Some(stdin.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run candidate")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "candidate timed out");
            return Ok(fault(
                format!("time limit exceeded after {:?}", self.timeout),
                expected_output,
            ));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        let result = match output.status.code() {
            Some(0) => {
                let captured = stdout.trim().to_string();
                let output_matches = normalize(&captured) == normalize(expected_output);
                ExecResult {
                    execution_successful: true,
                    output_matches,
                    output: captured,
                    expected_output: expected_output.to_string(),
                    error_message: String::new(),
                }
            }
            Some(EXIT_EXPLICIT) => fault("SystemExit called in the code".to_string(), expected_output),
            Some(EXIT_RUNTIME_FAULT) => fault(stderr, expected_output),
            code => fault(
                format!("candidate process exited abnormally (status {code:?}): {stderr}"),
                expected_output,
            ),
        };
        debug!(
            execution_successful = result.execution_successful,
            output_matches = result.output_matches,
            "verdict computed"
        );
        Ok(result)
    }
}

impl CodeJudge for PythonJudge {
    fn judge(&self, code: &str, sample_input: &str, expected_output: &str) -> ExecResult {
        match self.run(code, sample_input, expected_output) {
            Ok(result) => result,
            // Judge-internal failures (spawn errors, tempdir trouble) are
            // still encoded as a fault so the pipeline keeps moving.
            Err(err) => fault(format!("judge error: {err:#}"), expected_output),
        }
    }
}

fn fault(error_message: String, expected_output: &str) -> ExecResult {
    ExecResult {
        execution_successful: false,
        output_matches: false,
        output: format!("Generated code has an error:{error_message}"),
        expected_output: expected_output.to_string(),
        error_message,
    }
}
