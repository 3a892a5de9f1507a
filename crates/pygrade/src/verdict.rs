//! Verdict evaluation
//!
//! The contract with challenge authors: a test program prints the literal
//! sentinel text to stdout when every assertion passes, and refrains from
//! printing it otherwise. The evaluator consumes nothing else.

/// Sentinel marker printed by test code when all assertions pass.
pub const SENTINEL: &str = "ALL_TESTS_PASSED";

/// Check whether the test phase's captured output contains the sentinel.
///
/// Only the test phase's output may be passed here. Scanning the user phase
/// would let a submission that prints the marker certify itself.
///
/// Matching is by substring, not exact line: a marker embedded in unrelated
/// text (say, inside an assertion failure message) still counts as a pass.
/// The grading protocol upstream has not disambiguated this.
#[must_use]
pub fn sentinel_passed(test_output: &str) -> bool {
    test_output.contains(SENTINEL)
}
