//! Model-client abstraction for prompt completion.
//!
//! The [`ModelClient`] trait decouples stage orchestration from the actual
//! language-model backend. The call is synchronous and single-shot: prompt
//! text in, completion text out. Tests use scripted clients that return
//! predetermined completions without spawning processes.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, instrument, warn};

use crate::io::process::run_command_with_timeout;

/// Abstraction over language-model backends.
pub trait ModelClient {
    /// Turn a prompt into a completion. A failure here is fatal for the run.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Model client that pipes the prompt over stdin to a configured command and
/// reads the completion from stdout.
#[derive(Debug, Clone)]
pub struct CommandModelClient {
    command: Vec<String>,
    timeout: Duration,
    output_limit_bytes: usize,
}

impl CommandModelClient {
    pub fn new(command: Vec<String>, timeout: Duration, output_limit_bytes: usize) -> Self {
        Self {
            command,
            timeout,
            output_limit_bytes,
        }
    }
}

impl ModelClient for CommandModelClient {
    #[instrument(skip_all, fields(prompt_bytes = prompt.len()))]
    fn complete(&self, prompt: &str) -> Result<String> {
        let program = self
            .command
            .first()
            .ok_or_else(|| anyhow!("model command is empty"))?;
        info!(program = %program, "calling model");

        let mut cmd = Command::new(program);
        cmd.args(&self.command[1..]);
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            self.timeout,
            self.output_limit_bytes,
        )
        .context("run model command")?;

        if output.timed_out {
            warn!(timeout_secs = self.timeout.as_secs(), "model call timed out");
            return Err(anyhow!("model call timed out after {:?}", self.timeout));
        }
        if !output.status.success() {
            warn!(exit_code = ?output.status.code(), "model command failed");
            return Err(anyhow!(
                "model command failed with status {:?}: {}",
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }

        let completion = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(completion_bytes = completion.len(), "model call completed");
        Ok(completion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Verifies the command client feeds the prompt via stdin and returns
    /// stdout as the completion.
    #[test]
    fn command_client_round_trips_through_cat() {
        let client = CommandModelClient::new(
            vec!["cat".to_string()],
            Duration::from_secs(5),
            10_000,
        );
        let completion = client.complete("the prompt").expect("complete");
        assert_eq!(completion, "the prompt");
    }

    #[test]
    fn command_client_surfaces_failure_as_error() {
        let client = CommandModelClient::new(
            vec!["false".to_string()],
            Duration::from_secs(5),
            10_000,
        );
        assert!(client.complete("prompt").is_err());
    }
}
