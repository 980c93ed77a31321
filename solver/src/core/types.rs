//! Shared deterministic types for the solve pipeline.
//!
//! These types define stable contracts between pipeline components. They must
//! not depend on external state or I/O and must remain deterministic across
//! runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Pipeline stages, in the order they appear in the transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    AnalyzeTests,
    CheckCorrectness,
    FixMisunderstanding,
    Retrieve,
    Plan,
    Code,
    Execute,
    AdvancePlan,
    Debug,
    HumanFeedback,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::AnalyzeTests => "analyze_tests",
            Stage::CheckCorrectness => "check_correctness",
            Stage::FixMisunderstanding => "fix_misunderstanding",
            Stage::Retrieve => "retrieve",
            Stage::Plan => "plan",
            Stage::Code => "code",
            Stage::Execute => "execute",
            Stage::AdvancePlan => "advance_plan",
            Stage::Debug => "debug",
            Stage::HumanFeedback => "human_feedback",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate solution strategy produced by the planning stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_description: String,
    /// 0-100 score assigned by the evaluation prompt. Parse failures degrade
    /// to 0 rather than aborting the run.
    pub confidence_score: f64,
}

/// An analogous problem recalled by the retrieval stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievedProblem {
    pub description: String,
    /// Solving code for the recalled problem.
    #[serde(default)]
    pub code: String,
    pub planning: String,
    pub algorithm: String,
}

/// Fixed-arity record shape produced by the retrieval codec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalSet {
    pub problems: Vec<RetrievedProblem>,
}

/// Number of analogous problems the retrieval stage must return.
pub const RETRIEVAL_ARITY: usize = 3;

/// Verdict produced by a single code-execution attempt.
///
/// `output_matches` is meaningful only when `execution_successful` is true.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub execution_successful: bool,
    pub output_matches: bool,
    pub output: String,
    pub expected_output: String,
    pub error_message: String,
}

impl ExecResult {
    /// True when the code ran to completion and matched the sample output.
    pub fn is_pass(&self) -> bool {
        self.execution_successful && self.output_matches
    }
}
