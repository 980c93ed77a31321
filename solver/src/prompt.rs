//! Prompt rendering for the pipeline stages.
//!
//! Templates are embedded markdown rendered with minijinja. Conditional
//! sections (test-case analysis, user feedback) are controlled by optional
//! context values so callers never splice prompt text by hand.

use anyhow::{Context as _, Result};
use minijinja::{Environment, context};

use crate::core::types::RetrievedProblem;

const ANALYZE_TEMPLATE: &str = include_str!("prompts/analyze.md");
const INFER_OUTPUT_TEMPLATE: &str = include_str!("prompts/infer_output.md");
const REFINE_ANALYSIS_TEMPLATE: &str = include_str!("prompts/refine_analysis.md");
const RETRIEVE_TEMPLATE: &str = include_str!("prompts/retrieve.md");
const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");
const CONFIDENCE_TEMPLATE: &str = include_str!("prompts/confidence.md");
const CODE_TEMPLATE: &str = include_str!("prompts/code.md");
const DEBUG_WRONG_OUTPUT_TEMPLATE: &str = include_str!("prompts/debug_wrong_output.md");
const DEBUG_EXEC_ERROR_TEMPLATE: &str = include_str!("prompts/debug_exec_error.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Self {
        let mut env = Environment::new();
        for (name, source) in [
            ("analyze", ANALYZE_TEMPLATE),
            ("infer_output", INFER_OUTPUT_TEMPLATE),
            ("refine_analysis", REFINE_ANALYSIS_TEMPLATE),
            ("retrieve", RETRIEVE_TEMPLATE),
            ("plan", PLAN_TEMPLATE),
            ("confidence", CONFIDENCE_TEMPLATE),
            ("code", CODE_TEMPLATE),
            ("debug_wrong_output", DEBUG_WRONG_OUTPUT_TEMPLATE),
            ("debug_exec_error", DEBUG_EXEC_ERROR_TEMPLATE),
        ] {
            env.add_template(name, source)
                .expect("embedded template should be valid");
        }
        Self { env }
    }

    fn render(&self, name: &str, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(name)?;
        template
            .render(ctx)
            .with_context(|| format!("render {name} prompt"))
    }

    pub fn analyze(&self, problem: &str) -> Result<String> {
        self.render("analyze", context! { problem })
    }

    pub fn infer_output(&self, problem_without_testcase: &str, masked_analysis: &str) -> Result<String> {
        self.render(
            "infer_output",
            context! { problem_without_testcase, masked_analysis },
        )
    }

    pub fn refine_analysis(
        &self,
        problem: &str,
        analysis: &str,
        inferred_output: &str,
    ) -> Result<String> {
        self.render(
            "refine_analysis",
            context! { problem, analysis, inferred_output },
        )
    }

    pub fn retrieve(&self, problem: &str) -> Result<String> {
        self.render("retrieve", context! { problem })
    }

    pub fn plan(
        &self,
        problem: &str,
        retrieved: &RetrievedProblem,
        analysis: Option<&str>,
    ) -> Result<String> {
        self.render(
            "plan",
            context! {
                problem,
                description => retrieved.description,
                planning => retrieved.planning,
                algorithm => retrieved.algorithm,
                analysis,
            },
        )
    }

    pub fn confidence(&self, problem: &str, plan: &str) -> Result<String> {
        self.render("confidence", context! { problem, plan })
    }

    pub fn code(&self, problem: &str, plan: &str) -> Result<String> {
        self.render("code", context! { problem, plan })
    }

    pub fn debug_wrong_output(
        &self,
        problem: &str,
        code: &str,
        expected_output: &str,
        output: &str,
        analysis: Option<&str>,
        feedback: Option<&str>,
    ) -> Result<String> {
        self.render(
            "debug_wrong_output",
            context! { problem, code, expected_output, output, analysis, feedback },
        )
    }

    pub fn debug_exec_error(
        &self,
        problem: &str,
        code: &str,
        error_message: &str,
        analysis: Option<&str>,
        feedback: Option<&str>,
    ) -> Result<String> {
        self.render(
            "debug_exec_error",
            context! { problem, code, error_message, analysis, feedback },
        )
    }
}

impl Default for PromptEngine {
    fn default() -> Self {
        Self::new()
    }
}
