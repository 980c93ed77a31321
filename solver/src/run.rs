//! High-level solve API over the workflow driver.
//!
//! Wraps run/resume into outcomes a caller can act on, and derives the
//! explored-plans report shown to the human when the pipeline asks for
//! feedback.

use anyhow::Result;

use crate::core::checkpoint::{Checkpoint, CheckpointHandle};
use crate::core::state::{DEBUG_BUDGET, MAX_PLANS, SolveState, StatePatch};
use crate::core::types::ExecResult;
use crate::io::judge::CodeJudge;
use crate::io::model::ModelClient;
use crate::workflow::{RunStatus, Workflow};

/// One fully-attempted plan: the state it ended on and where in the log it
/// lives.
#[derive(Debug, Clone)]
pub struct PlanAttempt {
    pub plan_index: usize,
    pub plan: String,
    pub code: String,
    pub exec_result: ExecResult,
    pub handle: CheckpointHandle,
}

/// Outcome of a solve or a resumed solve.
#[derive(Debug)]
pub enum SolveOutcome {
    /// A candidate passed the sample test case.
    Solved(SolveState),
    /// Every plan's debug budget is spent; the run is suspended on `handle`
    /// until the human picks a plan and supplies feedback.
    AwaitingFeedback {
        state: SolveState,
        handle: CheckpointHandle,
        explored: Vec<PlanAttempt>,
    },
    /// The run ended without a passing candidate (post-feedback budgets
    /// spent). The state carries the best-effort code.
    Unsolved {
        state: SolveState,
        explored: Vec<PlanAttempt>,
    },
}

/// Solve a problem from scratch under the given lineage id.
pub fn solve<M: ModelClient, J: CodeJudge>(
    workflow: &mut Workflow<M, J>,
    lineage: &str,
    problem: impl Into<String>,
) -> Result<SolveOutcome> {
    let status = workflow.run(lineage, SolveState::new(problem.into()))?;
    Ok(outcome(workflow, lineage, status))
}

/// Resume a suspended run with the human's plan choice and feedback.
///
/// The patch reopens the debug budget for the chosen plan and closes it for
/// every other plan, so the resumed run debugs exactly that plan and then
/// ends.
pub fn resume_with_feedback<M: ModelClient, J: CodeJudge>(
    workflow: &mut Workflow<M, J>,
    handle: &CheckpointHandle,
    chosen_plan: usize,
    feedback: impl Into<String>,
) -> Result<SolveOutcome> {
    let patch = feedback_patch(chosen_plan, feedback.into());
    let status = workflow.resume(handle, &patch)?;
    Ok(outcome(workflow, &handle.lineage, status))
}

/// The resume patch for human feedback: switch to the chosen plan, zero its
/// debug counter, exhaust the others, and record the feedback text.
pub fn feedback_patch(chosen_plan: usize, feedback: String) -> StatePatch {
    let mut debug_iterations = [DEBUG_BUDGET; MAX_PLANS];
    if let Some(counter) = debug_iterations.get_mut(chosen_plan) {
        *counter = 0;
    }
    StatePatch {
        cur_plan: Some(chosen_plan),
        debug_iterations: Some(debug_iterations),
        taken_feedback: Some(true),
        user_feedback: Some(feedback),
    }
}

fn outcome<M: ModelClient, J: CodeJudge>(
    workflow: &Workflow<M, J>,
    lineage: &str,
    status: RunStatus,
) -> SolveOutcome {
    match status {
        RunStatus::Completed(state) if state.code_exec_result.is_pass() => {
            SolveOutcome::Solved(state)
        }
        RunStatus::Completed(state) => SolveOutcome::Unsolved {
            explored: explored_plans(workflow.history(lineage)),
            state,
        },
        RunStatus::Suspended { state, handle } => SolveOutcome::AwaitingFeedback {
            explored: explored_plans(workflow.history(lineage)),
            state,
            handle,
        },
    }
}

/// Reconstruct the fully-attempted plans from the checkpoint log.
///
/// A plan attempt ends where the next checkpoint's plan index increments by
/// one (the advance transition), and the final checkpoint closes the last
/// attempt.
pub fn explored_plans(history: &[Checkpoint]) -> Vec<PlanAttempt> {
    let mut attempts = Vec::new();
    for pair in history.windows(2) {
        if pair[1].state.cur_plan == pair[0].state.cur_plan + 1 {
            attempts.push(attempt_from(&pair[0]));
        }
    }
    if let Some(last) = history.last() {
        attempts.push(attempt_from(last));
    }
    attempts
}

fn attempt_from(checkpoint: &Checkpoint) -> PlanAttempt {
    let state = &checkpoint.state;
    PlanAttempt {
        plan_index: state.cur_plan,
        plan: state
            .plans
            .get(state.cur_plan)
            .map(|plan| plan.plan_description.clone())
            .unwrap_or_default(),
        code: state.generated_code.clone(),
        exec_result: state.code_exec_result.clone(),
        handle: checkpoint.handle(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checkpoint::Next;
    use crate::core::types::{Plan, Stage};
    use crate::test_support::mismatch_verdict;

    fn checkpoint(seq: u64, stage: Stage, state: SolveState) -> Checkpoint {
        Checkpoint {
            lineage: "run-1".to_string(),
            seq,
            stage,
            next: Next::Stage(Stage::Code),
            state,
        }
    }

    fn state_on_plan(cur_plan: usize) -> SolveState {
        let mut state = SolveState::new("problem");
        state.plans = (0..MAX_PLANS)
            .map(|idx| Plan {
                plan_description: format!("plan {idx}"),
                confidence_score: 50.0,
            })
            .collect();
        state.cur_plan = cur_plan;
        state.generated_code = format!("code for plan {cur_plan}");
        state.code_exec_result = mismatch_verdict("wrong", "right");
        state
    }

    #[test]
    fn feedback_patch_reopens_only_the_chosen_plan() {
        let patch = feedback_patch(1, "try prefix sums".to_string());
        assert_eq!(patch.cur_plan, Some(1));
        assert_eq!(patch.debug_iterations, Some([DEBUG_BUDGET, 0, DEBUG_BUDGET]));
        assert_eq!(patch.taken_feedback, Some(true));
        assert_eq!(patch.user_feedback.as_deref(), Some("try prefix sums"));
    }

    #[test]
    fn explored_plans_collects_each_advance_and_the_final_attempt() {
        let history = vec![
            checkpoint(1, Stage::Execute, state_on_plan(0)),
            checkpoint(2, Stage::AdvancePlan, state_on_plan(1)),
            checkpoint(3, Stage::Code, state_on_plan(1)),
            checkpoint(4, Stage::Execute, state_on_plan(1)),
            checkpoint(5, Stage::AdvancePlan, state_on_plan(2)),
            checkpoint(6, Stage::Execute, state_on_plan(2)),
        ];

        let explored = explored_plans(&history);
        let indices: Vec<usize> = explored.iter().map(|a| a.plan_index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert_eq!(explored[0].code, "code for plan 0");
        assert_eq!(explored[2].handle.seq, 6);
    }

    #[test]
    fn explored_plans_on_a_short_history_reports_the_final_state() {
        let history = vec![checkpoint(1, Stage::Execute, state_on_plan(0))];
        let explored = explored_plans(&history);
        assert_eq!(explored.len(), 1);
        assert_eq!(explored[0].plan_index, 0);
    }

    #[test]
    fn explored_plans_is_empty_for_an_empty_history() {
        assert!(explored_plans(&[]).is_empty());
    }
}
