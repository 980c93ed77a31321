//! Best-effort regex extractors over problem text and model completions.
//!
//! Every extractor has a defined fallback (empty string or empty vec) on
//! no-match; absence is never fatal. Malformed problem text degrades to empty
//! sample input/output, which near-certainly fails the sample comparison but
//! keeps the pipeline moving.

use std::sync::LazyLock;

use regex::Regex;

static SAMPLE_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)-----Example-----\s*Input:\s+(.*?)\s*Output:\s").expect("sample input regex")
});

static SAMPLE_OUTPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Output:\s+(.*?)\s*-----Note-----").expect("sample output regex")
});

static EXPECTED_OUTPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"the expected output is ([^.\n]*)").expect("expected output regex"));

static MASK_OUTPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"output is [^.\n]*").expect("mask regex"));

static BEFORE_EXAMPLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(.*?)Example").expect("before-example regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)?").expect("number regex"));

/// Extract the sample input and output blocks from problem text.
///
/// Relies on the `-----Example-----` / `Input:` / `Output:` / `-----Note-----`
/// structural contract; missing delimiters yield empty strings.
pub fn extract_sample_io(problem: &str) -> (String, String) {
    let input = SAMPLE_INPUT_RE
        .captures(problem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    let output = SAMPLE_OUTPUT_RE
        .captures(problem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();
    (input, output)
}

/// Pull every `the expected output is X` span from analysis text.
pub fn extract_outputs(text: &str) -> Vec<String> {
    EXPECTED_OUTPUT_RE
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .collect()
}

/// Replace every `output is ...` span with `output is <?>` so the model must
/// re-derive outputs from the analysis alone.
pub fn mask_output(text: &str) -> String {
    MASK_OUTPUT_RE.replace_all(text, "output is <?>").into_owned()
}

/// Problem description up to its first `Example` marker, or the full text
/// when no marker is present.
pub fn problem_without_testcase(problem: &str) -> String {
    BEFORE_EXAMPLE_RE
        .captures(problem)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_else(|| problem.to_string())
}

/// Whitespace-collapsing canonicalization used for output comparison.
///
/// Collapses whitespace runs to single spaces and trims the ends. Idempotent.
pub fn normalize(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Unwrap a fenced code completion to bare code.
///
/// Handles ``` and ```python fences; unfenced completions pass through
/// trimmed.
pub fn strip_code_fences(completion: &str) -> String {
    let trimmed = completion.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed.to_string();
    };
    // Drop the language tag line, then the closing fence.
    let body = match rest.split_once('\n') {
        Some((_, body)) => body,
        None => return trimmed.to_string(),
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
        .to_string()
}

/// Parse a confidence-score completion, degrading to 0 when the model does
/// not answer with a bare number.
pub fn parse_confidence(completion: &str) -> f64 {
    let trimmed = completion.trim();
    if let Ok(score) = trimmed.parse::<f64>() {
        return score;
    }
    NUMBER_RE
        .find(trimmed)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBLEM: &str =
        "Add two numbers.\n-----Example-----\nInput:\n1 2\nOutput:\n3\n-----Note-----";

    #[test]
    fn sample_io_extracts_input_and_output() {
        let (input, output) = extract_sample_io(PROBLEM);
        assert_eq!(input, "1 2");
        assert_eq!(output, "3");
    }

    #[test]
    fn sample_io_degrades_to_empty_on_missing_delimiters() {
        let (input, output) = extract_sample_io("no structure here");
        assert_eq!(input, "");
        assert_eq!(output, "");
    }

    #[test]
    fn outputs_extracts_all_spans() {
        let text = "Analysis. Therefore, the expected output is 3.\n\
                    Second case. Therefore, the expected output is 7.";
        assert_eq!(extract_outputs(text), vec!["3", "7"]);
    }

    #[test]
    fn mask_hides_output_spans() {
        let masked = mask_output("The output is 3. Analysis: add them.");
        assert_eq!(masked, "The output is <?>. Analysis: add them.");
    }

    #[test]
    fn problem_without_testcase_cuts_at_example() {
        assert_eq!(problem_without_testcase(PROBLEM), "Add two numbers.\n-----");
    }

    #[test]
    fn problem_without_testcase_passes_through_unmarked_text() {
        assert_eq!(problem_without_testcase("plain text"), "plain text");
    }

    #[test]
    fn normalize_collapses_whitespace() {
        assert_eq!(normalize("  1 \n 2\t3  "), "1 2 3");
    }

    /// Verifies normalization is idempotent across representative inputs.
    #[test]
    fn normalize_is_idempotent() {
        for s in ["", "  a  b  ", "x\ny\tz", "already normal"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn strip_fences_unwraps_python_block() {
        let code = "```python\nprint(1)\n```";
        assert_eq!(strip_code_fences(code), "print(1)");
    }

    #[test]
    fn strip_fences_passes_bare_code_through() {
        assert_eq!(strip_code_fences("print(1)\n"), "print(1)");
    }

    #[test]
    fn confidence_parses_bare_number() {
        assert_eq!(parse_confidence(" 85 "), 85.0);
        assert_eq!(parse_confidence("72.5"), 72.5);
    }

    #[test]
    fn confidence_degrades_on_prose() {
        assert_eq!(parse_confidence("Score: 60 out of 100"), 60.0);
        assert_eq!(parse_confidence("no number at all"), 0.0);
    }
}
