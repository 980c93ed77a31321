//! Command-line entry point for the solver pipeline.

use std::fs;
use std::io::{BufRead, Write as _};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::info;

use solver::core::extract::extract_sample_io;
use solver::io::config::{SolverConfig, load_config};
use solver::io::judge::PythonJudge;
use solver::io::model::CommandModelClient;
use solver::run::{PlanAttempt, SolveOutcome, resume_with_feedback, solve};
use solver::stages::Stages;
use solver::workflow::{Workflow, WorkflowConfig};

#[derive(Parser)]
#[command(
    name = "solver",
    version,
    about = "Iterative multi-stage solver for competitive programming problems"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Solve a problem, asking for feedback if every plan fails.
    Solve {
        /// Path to the problem statement.
        problem: PathBuf,
        /// Path to the solver config (defaults apply when missing).
        #[arg(short, long, default_value = "solver.toml")]
        config: PathBuf,
        /// Lineage id for the checkpoint log.
        #[arg(long, default_value = "run-1")]
        lineage: String,
    },
    /// Print the sample input and output extracted from a problem statement.
    Sample {
        /// Path to the problem statement.
        problem: PathBuf,
    },
}

fn main() {
    solver::logging::init();
    if let Err(err) = run() {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Command::Solve {
            problem,
            config,
            lineage,
        } => cmd_solve(&problem, &config, &lineage),
        Command::Sample { problem } => cmd_sample(&problem),
    }
}

fn cmd_solve(problem_path: &Path, config_path: &Path, lineage: &str) -> Result<()> {
    let problem = fs::read_to_string(problem_path)
        .with_context(|| format!("read problem {}", problem_path.display()))?;
    let config = load_config(config_path)?;

    let mut workflow = build_workflow(&config);
    let mut outcome = solve(&mut workflow, lineage, problem)?;

    // At most one feedback round: once feedback is taken, the pipeline ends
    // with or without a passing candidate.
    if let SolveOutcome::AwaitingFeedback {
        handle, explored, ..
    } = &outcome
    {
        print_explored(explored);
        let (chosen_plan, feedback) = prompt_for_feedback(explored.len())?;
        info!(chosen_plan, "resuming with feedback");
        let handle = handle.clone();
        outcome = resume_with_feedback(&mut workflow, &handle, chosen_plan, feedback)?;
    }

    match outcome {
        SolveOutcome::Solved(state) => {
            eprintln!("solved: candidate passed the sample test case");
            println!("{}", state.generated_code);
            Ok(())
        }
        SolveOutcome::Unsolved { state, .. } => {
            eprintln!("unsolved: budgets exhausted, printing best-effort code");
            println!("{}", state.generated_code);
            Ok(())
        }
        SolveOutcome::AwaitingFeedback { .. } => {
            Err(anyhow!("pipeline suspended again after feedback"))
        }
    }
}

fn cmd_sample(problem_path: &Path) -> Result<()> {
    let problem = fs::read_to_string(problem_path)
        .with_context(|| format!("read problem {}", problem_path.display()))?;
    let (input, output) = extract_sample_io(&problem);
    println!("input:\n{input}");
    println!("output:\n{output}");
    Ok(())
}

fn build_workflow(config: &SolverConfig) -> Workflow<CommandModelClient, PythonJudge> {
    let model = CommandModelClient::new(
        config.model_command.clone(),
        Duration::from_secs(config.model_timeout_secs),
        config.output_limit_bytes,
    );
    let judge = PythonJudge::new(
        Duration::from_secs(config.exec_timeout_secs),
        config.output_limit_bytes,
    );
    Workflow::new(
        Stages::new(model, judge),
        WorkflowConfig {
            step_budget: config.step_budget,
        },
    )
}

fn print_explored(explored: &[PlanAttempt]) {
    eprintln!("every plan's debug budget is spent; attempts so far:");
    for attempt in explored {
        eprintln!("--- plan {} ---", attempt.plan_index);
        eprintln!("plan: {}", attempt.plan);
        eprintln!("code:\n{}", attempt.code);
        if attempt.exec_result.execution_successful {
            eprintln!(
                "result: printed {:?}, expected {:?}",
                attempt.exec_result.output, attempt.exec_result.expected_output
            );
        } else {
            eprintln!("result: {}", attempt.exec_result.error_message);
        }
    }
}

fn prompt_for_feedback(options: usize) -> Result<(usize, String)> {
    let stdin = std::io::stdin();
    let mut lines = stdin.lock().lines();

    eprint!("plan to retry [0-{}]: ", options.saturating_sub(1));
    std::io::stderr().flush().ok();
    let choice = lines
        .next()
        .ok_or_else(|| anyhow!("stdin closed before a plan was chosen"))?
        .context("read plan choice")?;
    let chosen_plan: usize = choice
        .trim()
        .parse()
        .with_context(|| format!("invalid plan index {choice:?}"))?;

    eprint!("feedback: ");
    std::io::stderr().flush().ok();
    let feedback = lines
        .next()
        .ok_or_else(|| anyhow!("stdin closed before feedback was given"))?
        .context("read feedback")?;

    Ok((chosen_plan, feedback.trim().to_string()))
}
