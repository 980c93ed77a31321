//! Iterative multi-stage solver for competitive-programming problems.
//!
//! A problem runs through a fixed pipeline of stages: analyze the sample
//! test case, validate that analysis, recall analogous solved problems,
//! draft and score candidate plans, then cycle code generation, sandboxed
//! execution, and plan revision until a candidate passes the sample or
//! every budget is spent. Exhausting all plans suspends the run for human
//! feedback; the run resumes by branching from the suspension checkpoint
//! with a patched state.
//!
//! Determinism lives in [`core`]; everything that talks to a model or runs
//! candidate code sits behind the [`io::model::ModelClient`] and
//! [`io::judge::CodeJudge`] traits.

pub mod core;
pub mod io;
pub mod logging;
pub mod prompt;
pub mod run;
pub mod stages;
pub mod workflow;

#[cfg(feature = "test-support")]
pub mod test_support;
