//! Pure routing decisions for the two conditional edges in the pipeline.

use crate::core::state::{ANALYSIS_BUDGET, DEBUG_BUDGET, SolveState};

/// Destination after the `execute` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecuteRoute {
    /// Working solution found, or the human-feedback loop is exhausted.
    End,
    /// Current plan's debug budget spent; try the next candidate plan.
    AdvancePlan,
    /// Feed the failure back into another repair attempt on this plan.
    Debug,
    /// All plans exhausted without feedback; ask the human.
    HumanFeedback,
}

/// Destination after the `check_correctness` stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckRoute {
    /// Understanding verified (or refinement budget spent); proceed.
    Retrieve,
    /// Inferred output diverged; refine the analysis.
    FixMisunderstanding,
}

/// Escalation policy evaluated after every execution attempt.
///
/// The per-plan debug budget bounds cost, cycling through all candidate plans
/// before asking a human bounds latency, and human input is treated as final:
/// once feedback has been taken, an exhausted budget ends the run with
/// best-effort code.
pub fn route_after_execute(state: &SolveState) -> ExecuteRoute {
    if state.code_exec_result.is_pass() {
        return ExecuteRoute::End;
    }
    if state.debug_iterations[state.cur_plan] >= DEBUG_BUDGET {
        if state.taken_feedback {
            return ExecuteRoute::End;
        }
        if state.cur_plan + 1 >= state.debug_iterations.len() {
            return ExecuteRoute::HumanFeedback;
        }
        return ExecuteRoute::AdvancePlan;
    }
    ExecuteRoute::Debug
}

/// Refinement policy evaluated after every correctness check.
///
/// After [`ANALYSIS_BUDGET`] failed refinements the pipeline gives up on the
/// analysis and proceeds anyway.
pub fn route_after_check(state: &SolveState) -> CheckRoute {
    if state.correct_understanding {
        return CheckRoute::Retrieve;
    }
    if state.test_case_analysis_iterations < ANALYSIS_BUDGET {
        return CheckRoute::FixMisunderstanding;
    }
    CheckRoute::Retrieve
}
