//! The mutable record threaded through every pipeline stage.

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::types::{ExecResult, Plan, RetrievedProblem};

/// Maximum number of candidate plans ever tried (top 3 by confidence).
///
/// The per-plan debug counter array is sized by this constant; the router's
/// escalation policy assumes the same bound.
pub const MAX_PLANS: usize = 3;

/// Automated repair attempts allowed per plan before escalation.
pub const DEBUG_BUDGET: u32 = 3;

/// Refinement rounds allowed for the test-case analysis before proceeding
/// with a possibly imperfect understanding.
pub const ANALYSIS_BUDGET: u32 = 3;

/// Full state of one solve run.
///
/// Created once per problem submission, passed by value between stages, and
/// snapshotted into the checkpoint log after every stage transition. Fields
/// are only appended to or overwritten, never removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveState {
    /// Original problem text. Immutable after creation.
    pub problem: String,
    /// Current natural-language analysis of how sample input maps to output.
    pub test_case_analysis: String,
    /// Last output inferred from the masked analysis, used to validate it.
    pub inferred_output: String,
    /// Refinement rounds spent on the analysis so far. Monotonic.
    pub test_case_analysis_iterations: u32,
    /// Whether the inferred output matched the expected output on last check.
    pub correct_understanding: bool,
    /// Expected-output snippets extracted from the analysis text.
    pub expected_output: Vec<String>,
    /// Exactly [`RETRIEVAL_ARITY`] analogous problems once populated.
    ///
    /// [`RETRIEVAL_ARITY`]: crate::core::types::RETRIEVAL_ARITY
    pub relevant_problems: Vec<RetrievedProblem>,
    /// Candidate plans, sorted descending by confidence at creation time and
    /// never re-sorted.
    pub plans: Vec<Plan>,
    /// Index into `plans` of the plan currently being coded or debugged.
    pub cur_plan: usize,
    /// Per-plan debug-attempt counters, each capped at [`DEBUG_BUDGET`].
    pub debug_iterations: [u32; MAX_PLANS],
    /// Latest code candidate for `cur_plan`.
    pub generated_code: String,
    /// Latest debugging-stage output, a revised plan used to re-drive coding.
    pub modified_plan: String,
    /// Verdict from the most recent execution attempt.
    pub code_exec_result: ExecResult,
    /// Whether the human provided feedback on this run. Sticky once set.
    pub taken_feedback: bool,
    /// Free-text feedback consumed by the debugging stage.
    pub user_feedback: String,
}

impl SolveState {
    /// Fresh state for a problem submission: counters zeroed, collections
    /// empty.
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problem: problem.into(),
            test_case_analysis: String::new(),
            inferred_output: String::new(),
            test_case_analysis_iterations: 0,
            correct_understanding: false,
            expected_output: Vec::new(),
            relevant_problems: Vec::new(),
            plans: Vec::new(),
            cur_plan: 0,
            debug_iterations: [0; MAX_PLANS],
            generated_code: String::new(),
            modified_plan: String::new(),
            code_exec_result: ExecResult::default(),
            taken_feedback: false,
            user_feedback: String::new(),
        }
    }

    /// Semantic invariant violations, empty when the state is well formed.
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if !self.plans.is_empty() && self.cur_plan >= self.plans.len() {
            errors.push(format!(
                "cur_plan {} out of range for {} plans",
                self.cur_plan,
                self.plans.len()
            ));
        }
        if self.plans.len() > MAX_PLANS {
            errors.push(format!(
                "{} plans exceed the maximum of {MAX_PLANS}",
                self.plans.len()
            ));
        }
        for (idx, iters) in self.debug_iterations.iter().enumerate() {
            if *iters > DEBUG_BUDGET {
                errors.push(format!(
                    "debug_iterations[{idx}] = {iters} exceeds budget {DEBUG_BUDGET}"
                ));
            }
        }
        errors
    }

    /// Validate invariants, returning an error listing every violation.
    pub fn validate(&self) -> Result<()> {
        let errors = self.invariant_violations();
        if errors.is_empty() {
            return Ok(());
        }
        Err(anyhow!("state invariants violated: {}", errors.join("; ")))
    }
}

/// Partial-field patch applied when branching from a checkpoint.
///
/// Covers exactly the fields the resume API may change; everything else is
/// carried over from the snapshot untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatePatch {
    pub cur_plan: Option<usize>,
    pub debug_iterations: Option<[u32; MAX_PLANS]>,
    pub taken_feedback: Option<bool>,
    pub user_feedback: Option<String>,
}

impl StatePatch {
    pub fn apply(&self, state: &mut SolveState) {
        if let Some(cur_plan) = self.cur_plan {
            state.cur_plan = cur_plan;
        }
        if let Some(debug_iterations) = self.debug_iterations {
            state.debug_iterations = debug_iterations;
        }
        if let Some(taken_feedback) = self.taken_feedback {
            state.taken_feedback = taken_feedback;
        }
        if let Some(user_feedback) = &self.user_feedback {
            state.user_feedback = user_feedback.clone();
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == StatePatch::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_state_starts_zeroed() {
        let state = SolveState::new("problem");
        assert_eq!(state.test_case_analysis_iterations, 0);
        assert_eq!(state.debug_iterations, [0, 0, 0]);
        assert_eq!(state.cur_plan, 0);
        assert!(state.plans.is_empty());
        assert!(state.validate().is_ok());
    }

    #[test]
    fn validate_rejects_cur_plan_out_of_range() {
        let mut state = SolveState::new("problem");
        state.plans.push(Plan {
            plan_description: "only plan".to_string(),
            confidence_score: 50.0,
        });
        state.cur_plan = 1;
        let errors = state.invariant_violations();
        assert!(errors.iter().any(|err| err.contains("cur_plan")));
    }

    #[test]
    fn validate_rejects_debug_counter_over_budget() {
        let mut state = SolveState::new("problem");
        state.debug_iterations[1] = DEBUG_BUDGET + 1;
        assert!(state.validate().is_err());
    }

    #[test]
    fn patch_applies_only_set_fields() {
        let mut state = SolveState::new("problem");
        state.user_feedback = "keep".to_string();

        let patch = StatePatch {
            cur_plan: Some(2),
            debug_iterations: Some([0, 3, 3]),
            ..StatePatch::default()
        };
        patch.apply(&mut state);

        assert_eq!(state.cur_plan, 2);
        assert_eq!(state.debug_iterations, [0, 3, 3]);
        assert!(!state.taken_feedback);
        assert_eq!(state.user_feedback, "keep");
    }
}
