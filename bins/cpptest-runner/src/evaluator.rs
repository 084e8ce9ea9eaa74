//! Output Evaluator - Expected vs. Actual Comparison
//!
//! **Core Responsibility:**
//! Decide whether a program's captured output matches a test's expected output.
//!
//! **Critical Properties:**
//! - Knows nothing about compilers or child processes
//! - Knows nothing about the test store
//! - Pure function: (expected, actual) → comparison
//!
//! **Normalization Rules:**
//! - Trim leading/trailing whitespace of the whole text: YES
//! - Trailing whitespace at the end of each line: ignored
//! - Line endings (\n vs \r\n): ignored
//! - Whitespace inside a line: significant
//! - Case sensitivity: YES (exact match required)

use serde::Serialize;

/// Normalize output for comparison.
///
/// Preserves internal whitespace, case and empty lines within the content.
pub fn normalize_output(output: &str) -> String {
    output
        .trim()
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Comparison {
    Match,
    /// Both sides in normalized form, ready for display
    Mismatch { expected: String, actual: String },
}

pub fn compare(expected: &str, actual: &str) -> Comparison {
    let expected = normalize_output(expected);
    let actual = normalize_output(actual);

    if expected == actual {
        Comparison::Match
    } else {
        Comparison::Mismatch { expected, actual }
    }
}
