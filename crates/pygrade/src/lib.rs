//! A library for sandboxed Python exercise grading.
//!
//! Pygrade runs a learner's submission and separately authored test code
//! against an embedded Python runtime and derives a deterministic pass/fail
//! verdict from a sentinel-based protocol. The interpreter ships as an
//! external artifact that is fetched and initialized lazily, exactly once
//! per process.
//!
//! # Features
//!
//! - **Single-flight bootstrap** — Concurrent first users share one artifact fetch; failures are retryable, successes cached for the process lifetime.
//! - **Phase-isolated capture** — User and test output land in separate ordered buffers; stderr lines carry an explicit error tag.
//! - **Sentinel verdict** — Only the test phase's output is scanned for the pass marker, so a submission cannot certify itself.
//! - **Total grading calls** — [`Harness::run`] never panics or propagates an error; faults and per-phase timeouts become part of the result.
//! - **TOML configuration** — Artifact location, cache directory, and phase timeout.
//!
//! # Example
//!
//! ```rust,no_run
//! use pygrade::{Config, Harness};
//!
//! # async fn grade() {
//! let harness = Harness::new(&Config::default());
//! let result = harness
//!     .run("print('hi')", "assert user_output == 'hi'\nprint('ALL_TESTS_PASSED')")
//!     .await;
//! assert!(result.success);
//! # }
//! ```

pub use capture::{CaptureBuffer, CapturePhase, ERROR_TAG, OutputCapture, OutputSink};
pub use config::{Config, ConfigError, EXAMPLE_CONFIG};
pub use runtime::{
    DependencyFault, ExecutionFault, NativeRuntime, PythonRuntime, RuntimeLoadError, RuntimeLoader,
};
pub use session::{Harness, USER_OUTPUT_VAR};
pub use types::{PythonResult, SubmissionRecord};
pub use verdict::{SENTINEL, sentinel_passed};

pub mod capture;
pub mod config;
pub mod runtime;
pub mod session;
pub mod types;
pub mod verdict;
