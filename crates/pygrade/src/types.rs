use serde::{Deserialize, Serialize};

/// Result of one grading run.
///
/// This is the only externally observable artifact of a run. `run()` always
/// resolves to one of these, never to a panic or a propagated error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PythonResult {
    /// Whether the test phase printed the sentinel marker.
    pub success: bool,

    /// Deterministic concatenation of the captured phase output.
    ///
    /// Equals the user phase's output alone when the test phase produced
    /// nothing, otherwise `user_output + "\n---\n" + test_output`. Partial
    /// output from a faulted phase is never omitted.
    pub output: String,

    /// Human-readable message of the first fault raised during the run,
    /// if any. A fault does not by itself imply `success == false`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PythonResult {
    /// Result for a run that could not start because the runtime failed to load.
    pub fn load_failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(message.into()),
        }
    }
}

/// Record shape consumed by the submission persistence service.
///
/// The harness does not talk to that service itself; `PythonResult::success`
/// is the value that flows into `passed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub challenge_id: i64,
    pub code: String,
    pub passed: bool,
}

impl SubmissionRecord {
    /// Build a submission record from a graded run.
    pub fn from_result(challenge_id: i64, code: impl Into<String>, result: &PythonResult) -> Self {
        Self {
            challenge_id,
            code: code.into(),
            passed: result.success,
        }
    }
}
