//! The ten pipeline stages.
//!
//! Each stage is a pure function of the incoming state plus at most one model
//! call and one judge call: it consumes the state by value, derives its
//! prompt from state fields, and returns the updated state. Routing between
//! stages lives in the workflow driver, not here.

use std::sync::LazyLock;

use anyhow::{Context, Result, anyhow};
use jsonschema::Validator;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::core::extract::{
    extract_outputs, extract_sample_io, mask_output, normalize, parse_confidence,
    problem_without_testcase, strip_code_fences,
};
use crate::core::state::SolveState;
use crate::core::types::{Plan, RETRIEVAL_ARITY, RetrievalSet, Stage};
use crate::io::judge::CodeJudge;
use crate::io::model::ModelClient;
use crate::prompt::PromptEngine;

const RETRIEVAL_SCHEMA: &str = include_str!("../schemas/retrieval.schema.json");

static RETRIEVAL_VALIDATOR: LazyLock<Validator> = LazyLock::new(|| {
    let schema: Value =
        serde_json::from_str(RETRIEVAL_SCHEMA).expect("embedded retrieval schema should be JSON");
    jsonschema::validator_for(&schema).expect("embedded retrieval schema should compile")
});

/// Stage executor binding a model client and a code judge to the pipeline.
pub struct Stages<M, J> {
    model: M,
    judge: J,
    prompts: PromptEngine,
}

impl<M: ModelClient, J: CodeJudge> Stages<M, J> {
    pub fn new(model: M, judge: J) -> Self {
        Self {
            model,
            judge,
            prompts: PromptEngine::new(),
        }
    }

    /// Run one stage to completion.
    #[instrument(skip_all, fields(stage = %stage))]
    pub fn run(&self, stage: Stage, state: SolveState) -> Result<SolveState> {
        match stage {
            Stage::AnalyzeTests => self.analyze_tests(state),
            Stage::CheckCorrectness => self.check_correctness(state),
            Stage::FixMisunderstanding => self.fix_misunderstanding(state),
            Stage::Retrieve => self.retrieve(state),
            Stage::Plan => self.plan(state),
            Stage::Code => self.code(state),
            Stage::Execute => Ok(self.execute(state)),
            Stage::AdvancePlan => Ok(advance_plan(state)),
            Stage::Debug => self.debug(state),
            Stage::HumanFeedback => Ok(human_feedback(state)),
        }
        .with_context(|| format!("stage {stage} failed"))
    }

    /// Produce a step-by-step analysis of how the sample input maps to the
    /// sample output, and record the outputs the analysis claims.
    fn analyze_tests(&self, mut state: SolveState) -> Result<SolveState> {
        let prompt = self.prompts.analyze(&state.problem)?;
        let completion = self.model.complete(&prompt)?;
        state.expected_output = extract_outputs(&completion)
            .into_iter()
            .map(|output| strip_quotes(&output))
            .collect();
        state.test_case_analysis = completion;
        debug!(
            expected_outputs = state.expected_output.len(),
            "analysis recorded"
        );
        Ok(state)
    }

    /// Validate the analysis by masking its conclusions and asking the model
    /// to re-derive the outputs from the reasoning alone.
    fn check_correctness(&self, mut state: SolveState) -> Result<SolveState> {
        let masked = mask_output(&state.test_case_analysis);
        let stripped_problem = problem_without_testcase(&state.problem);
        let prompt = self.prompts.infer_output(&stripped_problem, &masked)?;
        let completion = self.model.complete(&prompt)?;

        let inferred: Vec<String> = extract_outputs(&completion)
            .into_iter()
            .map(|output| strip_quotes(&output))
            .collect();
        state.correct_understanding = inferred.len() == state.expected_output.len()
            && inferred
                .iter()
                .zip(&state.expected_output)
                .all(|(a, b)| normalize(a) == normalize(b));
        state.inferred_output = completion;
        debug!(
            correct = state.correct_understanding,
            inferred = inferred.len(),
            expected = state.expected_output.len(),
            "understanding checked"
        );
        Ok(state)
    }

    /// Rewrite the analysis after a failed re-derivation, spending one
    /// refinement round.
    fn fix_misunderstanding(&self, mut state: SolveState) -> Result<SolveState> {
        let prompt = self.prompts.refine_analysis(
            &state.problem,
            &state.test_case_analysis,
            &state.inferred_output,
        )?;
        let completion = self.model.complete(&prompt)?;
        state.expected_output = extract_outputs(&completion)
            .into_iter()
            .map(|output| strip_quotes(&output))
            .collect();
        state.test_case_analysis = completion;
        state.test_case_analysis_iterations += 1;
        info!(
            iterations = state.test_case_analysis_iterations,
            "analysis refined"
        );
        Ok(state)
    }

    /// Recall analogous solved problems as structured JSON.
    fn retrieve(&self, mut state: SolveState) -> Result<SolveState> {
        let prompt = self.prompts.retrieve(&state.problem)?;
        let completion = self.model.complete(&prompt)?;
        state.relevant_problems = parse_retrieval(&completion)?.problems;
        Ok(state)
    }

    /// Draft one plan per recalled problem, score each, and order the
    /// candidates by descending confidence.
    fn plan(&self, mut state: SolveState) -> Result<SolveState> {
        let analysis = verified_analysis(&state);
        let mut plans = Vec::with_capacity(state.relevant_problems.len());
        for retrieved in &state.relevant_problems {
            let prompt = self.prompts.plan(&state.problem, retrieved, analysis)?;
            let plan_description = self.model.complete(&prompt)?;

            let prompt = self.prompts.confidence(&state.problem, &plan_description)?;
            let confidence_score = parse_confidence(&self.model.complete(&prompt)?);
            debug!(confidence_score, "plan scored");
            plans.push(Plan {
                plan_description,
                confidence_score,
            });
        }
        plans.sort_by(|a, b| {
            b.confidence_score
                .partial_cmp(&a.confidence_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        state.plans = plans;
        state.cur_plan = 0;
        Ok(state)
    }

    /// Turn the active plan into code. After a debugging pass the revised
    /// plan supersedes the original one.
    fn code(&self, mut state: SolveState) -> Result<SolveState> {
        let plan = if state.debug_iterations[state.cur_plan] > 0 {
            state.modified_plan.as_str()
        } else {
            state
                .plans
                .get(state.cur_plan)
                .map(|plan| plan.plan_description.as_str())
                .ok_or_else(|| anyhow!("no plan at index {}", state.cur_plan))?
        };
        let prompt = self.prompts.code(&state.problem, plan)?;
        let completion = self.model.complete(&prompt)?;
        state.generated_code = strip_code_fences(&completion);
        Ok(state)
    }

    /// Run the candidate against the sample test case.
    fn execute(&self, mut state: SolveState) -> SolveState {
        let (sample_input, sample_output) = extract_sample_io(&state.problem);
        state.code_exec_result =
            self.judge
                .judge(&state.generated_code, &sample_input, &sample_output);
        info!(
            execution_successful = state.code_exec_result.execution_successful,
            output_matches = state.code_exec_result.output_matches,
            "candidate executed"
        );
        state
    }

    /// Revise the active plan from the failure evidence, spending one debug
    /// attempt.
    fn debug(&self, mut state: SolveState) -> Result<SolveState> {
        let analysis = verified_analysis(&state);
        let feedback = if state.taken_feedback {
            non_empty(&state.user_feedback)
        } else {
            None
        };
        let result = &state.code_exec_result;
        let prompt = if result.execution_successful {
            self.prompts.debug_wrong_output(
                &state.problem,
                &state.generated_code,
                &result.expected_output,
                &result.output,
                analysis,
                feedback,
            )?
        } else {
            self.prompts.debug_exec_error(
                &state.problem,
                &state.generated_code,
                &result.error_message,
                analysis,
                feedback,
            )?
        };
        let completion = self.model.complete(&prompt)?;
        state.modified_plan = completion;
        state.debug_iterations[state.cur_plan] += 1;
        info!(
            cur_plan = state.cur_plan,
            attempts = state.debug_iterations[state.cur_plan],
            "debug attempt recorded"
        );
        Ok(state)
    }
}

/// Move on to the next candidate plan.
fn advance_plan(mut state: SolveState) -> SolveState {
    state.cur_plan += 1;
    info!(cur_plan = state.cur_plan, "advanced to next plan");
    state
}

/// Absorb human feedback: mark it taken and reopen the debug budget for the
/// plan the run resumes on.
fn human_feedback(mut state: SolveState) -> SolveState {
    state.taken_feedback = true;
    state.debug_iterations[state.cur_plan] = 0;
    state
}

/// Decode a retrieval completion, validating shape before deserializing.
fn parse_retrieval(completion: &str) -> Result<RetrievalSet> {
    let text = strip_code_fences(completion);
    let value: Value = serde_json::from_str(&text).context("retrieval completion is not JSON")?;
    RETRIEVAL_VALIDATOR
        .validate(&value)
        .map_err(|err| anyhow!("retrieval completion rejected by schema: {err}"))?;
    let set: RetrievalSet =
        serde_json::from_value(value).context("deserialize retrieval completion")?;
    if set.problems.len() != RETRIEVAL_ARITY {
        return Err(anyhow!(
            "retrieval returned {} problems, expected {RETRIEVAL_ARITY}",
            set.problems.len()
        ));
    }
    Ok(set)
}

/// The analysis text, but only once the check stage has verified it. An
/// unverified analysis is withheld from downstream prompts.
fn verified_analysis(state: &SolveState) -> Option<&str> {
    if state.correct_understanding {
        non_empty(&state.test_case_analysis)
    } else {
        None
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Expected-output spans are sometimes double-quoted in analysis text;
/// only `"` is stripped, other quoting is preserved verbatim.
fn strip_quotes(text: &str) -> String {
    text.trim().trim_matches('"').to_string()
}
