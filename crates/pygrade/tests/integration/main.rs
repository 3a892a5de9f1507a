//! Integration tests for pygrade
//!
//! Most tests drive the public grading API against a scripted in-process
//! runtime and run anywhere. Tests that fetch and initialize a real runtime
//! artifact are gated behind the `integration-tests` feature and marked
//! `#[ignore]`:
//!    cargo test -p pygrade --features integration-tests -- --include-ignored

#[cfg(feature = "integration-tests")]
mod bootstrap;
mod fake;
