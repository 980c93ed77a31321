//! Judge tests against a real `python3` interpreter.
//!
//! These exercise the harness end to end: verdict classification, whitespace
//! normalization, stdin feeding, and the wall-clock limit.

use std::time::Duration;

use solver::io::judge::{CodeJudge, PythonJudge};

fn judge() -> PythonJudge {
    PythonJudge::new(Duration::from_secs(5), 100_000)
}

#[test]
fn matching_output_passes() {
    let result = judge().judge(
        "a, b = map(int, input().split())\nprint(a + b)",
        "1 2",
        "3",
    );
    assert!(result.execution_successful, "stderr: {}", result.error_message);
    assert!(result.output_matches);
    assert_eq!(result.output, "3");
}

#[test]
fn wrong_output_is_a_mismatch_not_a_fault() {
    let result = judge().judge("print(4)", "1 2", "3");
    assert!(result.execution_successful);
    assert!(!result.output_matches);
    assert_eq!(result.output, "4");
    assert!(!result.is_pass());
}

#[test]
fn comparison_ignores_whitespace_layout() {
    let result = judge().judge("print(1)\nprint(2)", "", "1 2");
    assert!(result.execution_successful);
    assert!(result.output_matches);
}

#[test]
fn runtime_fault_carries_the_traceback() {
    let result = judge().judge("print(1 / 0)", "", "whatever");
    assert!(!result.execution_successful);
    assert!(result.error_message.contains("ZeroDivisionError"));
    assert!(result.output.starts_with("Generated code has an error:"));
}

#[test]
fn syntax_error_is_a_fault() {
    let result = judge().judge("def broken(:", "", "whatever");
    assert!(!result.execution_successful);
    assert!(!result.error_message.is_empty());
}

#[test]
fn explicit_exit_is_never_a_success() {
    let result = judge().judge("print(3)\nexit()", "", "3");
    assert!(!result.execution_successful);
    assert!(result.error_message.contains("SystemExit"));
}

#[test]
fn sys_exit_is_classified_as_explicit_exit() {
    // The harness blocks `import`, so this surfaces as a fault rather than a
    // clean exit; either way it must not count as a pass.
    let result = judge().judge("import sys\nsys.exit(0)", "", "");
    assert!(!result.is_pass());
}

#[test]
fn infinite_loop_hits_the_time_limit() {
    let judge = PythonJudge::new(Duration::from_secs(1), 100_000);
    let result = judge.judge("while True:\n    pass", "", "3");
    assert!(!result.execution_successful);
    assert!(result.error_message.contains("time limit exceeded"));
}

#[test]
fn multi_line_stdin_is_fed_to_the_candidate() {
    let result = judge().judge(
        "n = int(input())\ntotal = 0\nfor _ in range(n):\n    total += int(input())\nprint(total)",
        "3\n1\n2\n4",
        "7",
    );
    assert!(result.execution_successful, "stderr: {}", result.error_message);
    assert!(result.output_matches);
}
