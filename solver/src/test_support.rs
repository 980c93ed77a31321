//! Scripted fakes and fixtures for pipeline tests.
//!
//! Enabled via the `test-support` feature so integration tests and in-crate
//! unit tests share one set of fakes. The fakes are deterministic scripts:
//! each call pops the next canned response, and running past the script is a
//! test bug surfaced as a panic.

use std::cell::RefCell;
use std::collections::VecDeque;

use anyhow::{Result, anyhow};

use crate::core::types::ExecResult;
use crate::io::judge::CodeJudge;
use crate::io::model::ModelClient;

/// Model client that replays a fixed sequence of completions.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    completions: RefCell<VecDeque<String>>,
}

impl ScriptedModel {
    pub fn new(completions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            completions: RefCell::new(completions.into_iter().map(Into::into).collect()),
        }
    }

    pub fn push(&self, completion: impl Into<String>) {
        self.completions.borrow_mut().push_back(completion.into());
    }

    /// Completions not yet consumed, for asserting a test used its script.
    pub fn remaining(&self) -> usize {
        self.completions.borrow().len()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, prompt: &str) -> Result<String> {
        self.completions
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted model exhausted; unexpected prompt: {prompt:.80}"))
    }
}

/// Judge that replays a fixed sequence of verdicts.
#[derive(Debug, Default)]
pub struct ScriptedJudge {
    verdicts: RefCell<VecDeque<ExecResult>>,
}

impl ScriptedJudge {
    pub fn new(verdicts: impl IntoIterator<Item = ExecResult>) -> Self {
        Self {
            verdicts: RefCell::new(verdicts.into_iter().collect()),
        }
    }

    pub fn push(&self, verdict: ExecResult) {
        self.verdicts.borrow_mut().push_back(verdict);
    }

    pub fn remaining(&self) -> usize {
        self.verdicts.borrow().len()
    }
}

impl CodeJudge for ScriptedJudge {
    fn judge(&self, _code: &str, _sample_input: &str, _expected_output: &str) -> ExecResult {
        self.verdicts
            .borrow_mut()
            .pop_front()
            .expect("scripted judge exhausted")
    }
}

/// Problem text with the structural markers the extractors rely on.
pub fn sample_problem() -> String {
    "Add two numbers.\n\
     You are given two integers a and b. Print their sum.\n\
     -----Example-----\n\
     Input:\n\
     1 2\n\
     Output:\n\
     3\n\
     -----Note-----\n\
     1 + 2 = 3."
        .to_string()
}

/// A retrieval completion that satisfies the retrieval schema.
pub fn retrieval_completion() -> String {
    serde_json::json!({
        "problems": [
            {
                "description": "Sum of a list",
                "code": "print(sum(map(int, input().split())))",
                "planning": "Read the numbers, add them, print the total.",
                "algorithm": "arithmetic"
            },
            {
                "description": "Difference of two numbers",
                "code": "a, b = map(int, input().split())\nprint(a - b)",
                "planning": "Read both numbers and subtract.",
                "algorithm": "arithmetic"
            },
            {
                "description": "Maximum of two numbers",
                "code": "a, b = map(int, input().split())\nprint(max(a, b))",
                "planning": "Read both numbers and compare.",
                "algorithm": "comparison"
            }
        ]
    })
    .to_string()
}

/// Verdict for code that ran and matched the sample output.
pub fn passing_verdict() -> ExecResult {
    ExecResult {
        execution_successful: true,
        output_matches: true,
        output: "3".to_string(),
        expected_output: "3".to_string(),
        error_message: String::new(),
    }
}

/// Verdict for code that ran but printed the wrong answer.
pub fn mismatch_verdict(output: &str, expected: &str) -> ExecResult {
    ExecResult {
        execution_successful: true,
        output_matches: false,
        output: output.to_string(),
        expected_output: expected.to_string(),
        error_message: String::new(),
    }
}

/// Verdict for code that crashed before producing an answer.
pub fn fault_verdict(error_message: &str) -> ExecResult {
    ExecResult {
        execution_successful: false,
        output_matches: false,
        output: format!("Generated code has an error:{error_message}"),
        expected_output: String::new(),
        error_message: error_message.to_string(),
    }
}
