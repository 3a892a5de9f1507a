//! Embedded Python runtime boundary
//!
//! The harness does not embed an interpreter itself. It depends on a runtime
//! artifact (a shared library with a small C ABI) fetched from a fixed
//! location and initialized once per process. This module defines that
//! boundary: the [`PythonRuntime`] trait the rest of the crate programs
//! against, the [`RuntimeLoader`] that bootstraps the artifact exactly once,
//! and the error taxonomy for everything that can go wrong at the seam.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

pub use crate::capture::OutputSink;
pub use crate::runtime::loader::RuntimeLoader;
pub use crate::runtime::native::NativeRuntime;

pub mod artifact;
mod loader;
mod native;

/// Errors that occur while fetching or initializing the runtime artifact.
///
/// Load failures are transient from the loader's point of view: they are
/// never cached, and a later acquisition retries the bootstrap from scratch.
#[derive(Debug, Error)]
pub enum RuntimeLoadError {
    #[error("failed to fetch runtime artifact from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("artifact server returned HTTP {status} for {url}")]
    FetchStatus { url: String, status: u16 },

    #[error("no cache directory available for the runtime artifact")]
    NoCacheDir,

    #[error("failed to store runtime artifact at {path}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load runtime library: {0}")]
    Library(#[from] libloading::Error),

    #[error("runtime initialization failed: {0}")]
    Init(String),
}

/// Fault raised while executing user or test source.
///
/// A fault aborts only the current phase, never the whole session; whatever
/// output was captured before it remains valid.
#[derive(Debug, Clone, Error)]
pub enum ExecutionFault {
    /// The interpreter raised while executing the source.
    #[error("{0}")]
    Python(String),

    /// The phase exceeded its wall-clock bound.
    #[error("execution timed out after {0:.1}s")]
    Timeout(f64),
}

/// Best-effort package resolution failure. Never aborts a run; the session
/// surfaces it as ordinary captured error text.
#[derive(Debug, Clone, Error)]
#[error("package resolution failed: {0}")]
pub struct DependencyFault(pub String);

/// The live, initialized embedded interpreter.
///
/// One instance exists per process, created lazily by [`RuntimeLoader`] and
/// shared by reference across all grading sessions. The interpreter carries
/// persistent global state (namespaces, injected variables) across calls, so
/// callers must not execute two sessions against it concurrently.
#[async_trait]
pub trait PythonRuntime: Send + Sync {
    /// Execute Python source synchronously.
    fn run_source(&self, code: &str) -> Result<(), ExecutionFault>;

    /// Execute Python source without blocking the caller's thread.
    async fn run_source_async(&self, code: &str) -> Result<(), ExecutionFault>;

    /// Resolve third-party packages inferred from static inspection of
    /// `code`. Best-effort: failure is reported, never fatal.
    async fn resolve_dependencies(&self, code: &str) -> Result<(), DependencyFault>;

    /// Bind a string value to a name in the interpreter's global namespace.
    fn set_global_str(&self, name: &str, value: &str) -> Result<(), ExecutionFault>;

    /// Replace the stdout sink for subsequent executions. An execution
    /// already in flight keeps the sink it started with.
    fn set_stdout_sink(&self, sink: OutputSink);

    /// Replace the stderr sink for subsequent executions.
    fn set_stderr_sink(&self, sink: OutputSink);
}
