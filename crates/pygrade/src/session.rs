//! Grading session orchestration
//!
//! One grading run executes the learner's submission and the authored test
//! code against the shared interpreter, in that order, each in its own
//! capture phase. The session is the reliability boundary of the harness:
//! [`Harness::run`] is total, converting every reachable fault into the
//! returned [`PythonResult`] instead of propagating it.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::capture::{CapturePhase, OutputCapture};
use crate::config::Config;
use crate::runtime::{ExecutionFault, PythonRuntime, RuntimeLoader};
use crate::types::PythonResult;
use crate::verdict;

/// Name under which the user phase's captured output is injected into the
/// interpreter namespace. Test code asserts against this global.
pub const USER_OUTPUT_VAR: &str = "user_output";

/// Separator between the user and test portions of the composed output.
const OUTPUT_SEPARATOR: &str = "\n---\n";

/// Grading harness: bootstraps the runtime on first use and grades
/// submissions one at a time.
#[derive(Debug)]
pub struct Harness {
    loader: Arc<RuntimeLoader>,
    phase_timeout: Duration,
    /// Sessions are serialized end to end. The interpreter carries global
    /// state across calls (the injected variable, names defined by user and
    /// test code), so two runs must never interleave against it.
    run_lock: Mutex<()>,
}

impl Harness {
    /// Harness that bootstraps the runtime described by `config`.
    pub fn new(config: &Config) -> Self {
        Self::with_loader(Arc::new(RuntimeLoader::new(config)), config.phase_timeout())
    }

    /// Harness over an existing loader, with an explicit per-phase bound.
    pub fn with_loader(loader: Arc<RuntimeLoader>, phase_timeout: Duration) -> Self {
        Self {
            loader,
            phase_timeout,
            run_lock: Mutex::new(()),
        }
    }

    /// The loader backing this harness (readiness signals live there).
    pub fn loader(&self) -> &RuntimeLoader {
        &self.loader
    }

    /// Grade one submission.
    ///
    /// Runs `user_code`, injects what it printed as the `user_output` global,
    /// then runs `test_code` in a fresh capture phase; the verdict comes from
    /// scanning the test phase's output alone for the sentinel. Never panics
    /// and never returns early with an error: every input, including
    /// malformed or looping source, resolves to a [`PythonResult`].
    #[instrument(skip_all, fields(user_len = user_code.len(), test_len = test_code.len()))]
    pub async fn run(&self, user_code: &str, test_code: &str) -> PythonResult {
        let _guard = self.run_lock.lock().await;

        let runtime = match self.loader.acquire().await {
            Ok(runtime) => runtime,
            Err(error) => {
                warn!(%error, "runtime unavailable, failing run");
                return PythonResult::load_failure(error.to_string());
            }
        };

        let capture = OutputCapture::new();
        let mut fault: Option<String> = None;

        // User phase. The sinks are minted against this phase, so a user
        // execution that outlives its timeout writes into the void, not
        // into whichever phase happens to be open later.
        capture.begin_phase(CapturePhase::User);
        runtime.set_stdout_sink(capture.stdout_sink());
        runtime.set_stderr_sink(capture.stderr_sink());
        // Best-effort: a resolution failure surfaces as ordinary captured
        // error text, not as a run fault.
        match self.bounded(runtime.resolve_dependencies(user_code)).await {
            Some(Ok(())) => {}
            Some(Err(error)) => capture.record_error(&error.to_string()),
            None => capture.record_error("package resolution timed out"),
        }
        if let Err(error) = self.execute(&runtime, user_code).await {
            debug!(%error, "user code faulted");
            fault = Some(error.to_string());
        }
        let user_output = capture.end_phase().map(|b| b.text()).unwrap_or_default();

        // Hand the user phase's exact output to the test code.
        if let Err(error) = runtime.set_global_str(USER_OUTPUT_VAR, &user_output) {
            fault.get_or_insert(error.to_string());
        }

        // Test phase. The buffer starts fresh and the sinks are reissued;
        // nothing the user phase produced, however late, can leak into the
        // sentinel scan.
        capture.begin_phase(CapturePhase::Test);
        runtime.set_stdout_sink(capture.stdout_sink());
        runtime.set_stderr_sink(capture.stderr_sink());
        if let Err(error) = self.execute(&runtime, test_code).await {
            debug!(%error, "test code faulted");
            fault.get_or_insert(error.to_string());
        }
        let test_output = capture.end_phase().map(|b| b.text()).unwrap_or_default();

        let success = verdict::sentinel_passed(&test_output);
        debug!(success, "grading run complete");

        PythonResult {
            success,
            output: compose_output(&user_output, &test_output),
            error: fault,
        }
    }

    /// Execute source with the per-phase wall-clock bound applied.
    async fn execute(
        &self,
        runtime: &Arc<dyn PythonRuntime>,
        code: &str,
    ) -> Result<(), ExecutionFault> {
        self.bounded(runtime.run_source_async(code))
            .await
            .unwrap_or_else(|| Err(ExecutionFault::Timeout(self.phase_timeout.as_secs_f64())))
    }

    /// Apply the phase timeout; `None` means the bound fired.
    async fn bounded<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::time::timeout(self.phase_timeout, fut).await.ok()
    }
}

/// Compose the externally visible output from the two phase buffers.
fn compose_output(user_output: &str, test_output: &str) -> String {
    if test_output.is_empty() {
        user_output.to_string()
    } else {
        format!("{user_output}{OUTPUT_SEPARATOR}{test_output}")
    }
}
