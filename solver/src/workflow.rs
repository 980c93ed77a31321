//! Stage-machine driver: runs stages, routes between them, and checkpoints
//! every transition.
//!
//! The driver owns the transition table. Fixed edges are encoded directly;
//! the two conditional edges delegate to the pure routers. After every stage
//! the state snapshot and the routing decision are appended to the checkpoint
//! log, so any point in the run can later be branched from.
//!
//! Reaching the human-feedback stage suspends the run instead of executing
//! it: the caller gets the handle of the checkpoint that routed there and
//! resumes with a patch once feedback is available. The feedback stage itself
//! runs at the start of the resumed drive.

use std::fmt;

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::checkpoint::{Checkpoint, CheckpointHandle, CheckpointStore, Next};
use crate::core::router::{CheckRoute, ExecuteRoute, route_after_check, route_after_execute};
use crate::core::state::{SolveState, StatePatch};
use crate::core::types::Stage;
use crate::io::judge::CodeJudge;
use crate::io::model::ModelClient;
use crate::stages::Stages;

/// Default cap on stage transitions per drive, matching the budget needed to
/// exhaust every plan's debug loop with headroom.
pub const DEFAULT_STEP_BUDGET: u32 = 70;

#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Maximum stage executions per `run` or `resume` invocation.
    pub step_budget: u32,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            step_budget: DEFAULT_STEP_BUDGET,
        }
    }
}

/// The drive loop ran for its full step budget without reaching the end or a
/// suspension point. Indicates a routing bug or a budget set far too low.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepBudgetExceededError {
    pub budget: u32,
}

impl fmt::Display for StepBudgetExceededError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "step budget of {} exceeded", self.budget)
    }
}

impl std::error::Error for StepBudgetExceededError {}

/// Terminal outcome of one drive.
#[derive(Debug)]
pub enum RunStatus {
    /// The pipeline routed to `End`.
    Completed(SolveState),
    /// The pipeline routed to the human-feedback stage; `handle` names the
    /// checkpoint to branch from once feedback is available.
    Suspended {
        state: SolveState,
        handle: CheckpointHandle,
    },
}

/// The solve pipeline: stage executor plus checkpoint log.
pub struct Workflow<M, J> {
    stages: Stages<M, J>,
    store: CheckpointStore,
    config: WorkflowConfig,
}

impl<M: ModelClient, J: CodeJudge> Workflow<M, J> {
    pub fn new(stages: Stages<M, J>, config: WorkflowConfig) -> Self {
        Self {
            stages,
            store: CheckpointStore::new(),
            config,
        }
    }

    /// Start a fresh run under the given lineage id.
    #[instrument(skip_all, fields(lineage))]
    pub fn run(&mut self, lineage: &str, state: SolveState) -> Result<RunStatus> {
        state.validate().context("initial state invalid")?;
        self.drive(lineage, state, Stage::AnalyzeTests)
    }

    /// Branch from a checkpoint with a patch and continue driving.
    ///
    /// The branch continues under the same lineage: its checkpoints append to
    /// the existing log. An unknown handle fails closed.
    #[instrument(skip_all, fields(lineage = %handle.lineage, seq = handle.seq))]
    pub fn resume(&mut self, handle: &CheckpointHandle, patch: &StatePatch) -> Result<RunStatus> {
        let (state, next) = self.store.branch(handle, patch)?;
        state.validate().context("patched state invalid")?;
        match next {
            Next::End => Ok(RunStatus::Completed(state)),
            Next::Stage(stage) => self.drive(&handle.lineage, state, stage),
        }
    }

    /// Checkpoints recorded for a lineage, in order.
    pub fn history(&self, lineage: &str) -> &[Checkpoint] {
        self.store.history(lineage)
    }

    fn drive(&mut self, lineage: &str, mut state: SolveState, mut stage: Stage) -> Result<RunStatus> {
        for _ in 0..self.config.step_budget {
            state = self.stages.run(stage, state)?;
            let next = next_after(stage, &state);
            let handle = self.store.append(lineage, stage, next, state.clone());
            info!(stage = %stage, next = ?next, seq = handle.seq, "stage checkpointed");
            match next {
                Next::End => return Ok(RunStatus::Completed(state)),
                Next::Stage(Stage::HumanFeedback) => {
                    return Ok(RunStatus::Suspended { state, handle });
                }
                Next::Stage(next_stage) => stage = next_stage,
            }
        }
        Err(StepBudgetExceededError {
            budget: self.config.step_budget,
        }
        .into())
    }
}

/// The transition table.
fn next_after(stage: Stage, state: &SolveState) -> Next {
    match stage {
        Stage::AnalyzeTests | Stage::FixMisunderstanding => Next::Stage(Stage::CheckCorrectness),
        Stage::CheckCorrectness => match route_after_check(state) {
            CheckRoute::Retrieve => Next::Stage(Stage::Retrieve),
            CheckRoute::FixMisunderstanding => Next::Stage(Stage::FixMisunderstanding),
        },
        Stage::Retrieve => Next::Stage(Stage::Plan),
        Stage::Plan => Next::Stage(Stage::Code),
        Stage::Code => Next::Stage(Stage::Execute),
        Stage::Execute => match route_after_execute(state) {
            ExecuteRoute::End => Next::End,
            ExecuteRoute::AdvancePlan => Next::Stage(Stage::AdvancePlan),
            ExecuteRoute::Debug => Next::Stage(Stage::Debug),
            ExecuteRoute::HumanFeedback => Next::Stage(Stage::HumanFeedback),
        },
        Stage::AdvancePlan | Stage::Debug => Next::Stage(Stage::Code),
        Stage::HumanFeedback => Next::Stage(Stage::Debug),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checkpoint::UnknownCheckpointError;
    use crate::test_support::{
        ScriptedJudge, ScriptedModel, passing_verdict, retrieval_completion, sample_problem,
    };

    const ANALYSIS: &str = "Add the two numbers. Therefore, the expected output is 3.";

    fn happy_path_workflow() -> Workflow<ScriptedModel, ScriptedJudge> {
        let model = ScriptedModel::new([
            ANALYSIS.to_string(),
            // check_correctness re-derives the same output
            "From the reasoning, the expected output is 3.".to_string(),
            retrieval_completion(),
            // three plan/confidence pairs
            "plan A".to_string(),
            "40".to_string(),
            "plan B".to_string(),
            "90".to_string(),
            "plan C".to_string(),
            "70".to_string(),
            "print(sum(map(int, input().split())))".to_string(),
        ]);
        let judge = ScriptedJudge::new([passing_verdict()]);
        Workflow::new(Stages::new(model, judge), WorkflowConfig::default())
    }

    #[test]
    fn happy_path_runs_to_completion() {
        let mut workflow = happy_path_workflow();
        let status = workflow
            .run("run-1", SolveState::new(sample_problem()))
            .expect("run");

        let RunStatus::Completed(state) = status else {
            panic!("expected completion");
        };
        assert!(state.code_exec_result.is_pass());
        assert_eq!(state.plans[0].plan_description, "plan B");

        let history = workflow.history("run-1");
        let stages: Vec<Stage> = history.iter().map(|cp| cp.stage).collect();
        assert_eq!(
            stages,
            vec![
                Stage::AnalyzeTests,
                Stage::CheckCorrectness,
                Stage::Retrieve,
                Stage::Plan,
                Stage::Code,
                Stage::Execute,
            ]
        );
        assert_eq!(history.last().map(|cp| cp.next), Some(Next::End));
    }

    #[test]
    fn checkpoints_snapshot_state_at_each_transition() {
        let mut workflow = happy_path_workflow();
        workflow
            .run("run-1", SolveState::new(sample_problem()))
            .expect("run");

        let history = workflow.history("run-1");
        // Plans exist from the plan checkpoint onward, not before.
        assert!(history[2].state.plans.is_empty());
        assert_eq!(history[3].state.plans.len(), 3);
    }

    #[test]
    fn step_budget_exceeded_is_a_typed_error() {
        let model = ScriptedModel::new([
            ANALYSIS.to_string(),
            "From the reasoning, the expected output is 3.".to_string(),
            retrieval_completion(),
        ]);
        let mut workflow = Workflow::new(
            Stages::new(model, ScriptedJudge::default()),
            WorkflowConfig { step_budget: 2 },
        );

        let err = workflow
            .run("run-1", SolveState::new(sample_problem()))
            .unwrap_err();
        let budget_err = err
            .downcast_ref::<StepBudgetExceededError>()
            .expect("typed budget error");
        assert_eq!(budget_err.budget, 2);
    }

    #[test]
    fn resume_with_unknown_handle_fails_closed() {
        let mut workflow = happy_path_workflow();
        let handle = CheckpointHandle {
            lineage: "never-ran".to_string(),
            seq: 7,
        };
        let err = workflow
            .resume(&handle, &StatePatch::default())
            .unwrap_err();
        assert!(err.downcast_ref::<UnknownCheckpointError>().is_some());
    }

    #[test]
    fn resume_rejects_a_patch_that_breaks_invariants() {
        let mut workflow = happy_path_workflow();
        workflow
            .run("run-1", SolveState::new(sample_problem()))
            .expect("run");
        let handle = workflow.history("run-1").last().map(|cp| cp.handle());

        let patch = StatePatch {
            cur_plan: Some(9),
            ..StatePatch::default()
        };
        let err = workflow
            .resume(&handle.expect("history nonempty"), &patch)
            .unwrap_err();
        assert!(format!("{err:#}").contains("invalid"));
    }

    #[test]
    fn resume_from_a_terminal_checkpoint_returns_the_patched_state() {
        let mut workflow = happy_path_workflow();
        workflow
            .run("run-1", SolveState::new(sample_problem()))
            .expect("run");
        let handle = workflow
            .history("run-1")
            .last()
            .map(|cp| cp.handle())
            .expect("history nonempty");

        let patch = StatePatch {
            user_feedback: Some("noted".to_string()),
            ..StatePatch::default()
        };
        let status = workflow.resume(&handle, &patch).expect("resume");
        let RunStatus::Completed(state) = status else {
            panic!("terminal checkpoint should complete immediately");
        };
        assert_eq!(state.user_feedback, "noted");
        // No stages ran, so no new checkpoints.
        assert_eq!(workflow.history("run-1").len(), 6);
    }
}
