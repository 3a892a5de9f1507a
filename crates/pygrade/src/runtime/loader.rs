//! Lazy, single-flight runtime bootstrap
//!
//! The runtime artifact is fetched and initialized at most once per process.
//! Concurrent first callers collapse into one pending bootstrap and share its
//! outcome. A successful load is cached for the life of the process; a failed
//! load is not, so the next acquisition retries from scratch.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::runtime::{PythonRuntime, RuntimeLoadError, artifact};

type LoadOutcome = Result<Arc<dyn PythonRuntime>, Arc<RuntimeLoadError>>;
type SharedLoad = Shared<BoxFuture<'static, LoadOutcome>>;

#[derive(Default)]
struct LoadState {
    /// The process-wide handle, set exactly once.
    handle: Option<Arc<dyn PythonRuntime>>,
    /// In-flight bootstrap shared by all callers that arrive before it
    /// completes.
    pending: Option<SharedLoad>,
    /// Incremented each time a bootstrap starts, so a waiter from an earlier
    /// round never clobbers a newer one's pending state.
    generation: u64,
}

/// Bootstraps the embedded interpreter exactly once and lends it out.
pub struct RuntimeLoader {
    bootstrap: Box<dyn Fn() -> BoxFuture<'static, LoadOutcome> + Send + Sync>,
    state: Mutex<LoadState>,
    loading: AtomicBool,
    ready: AtomicBool,
}

impl std::fmt::Debug for RuntimeLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeLoader")
            .field("ready", &self.is_ready())
            .field("loading", &self.is_loading())
            .finish_non_exhaustive()
    }
}

impl RuntimeLoader {
    /// Loader that fetches and initializes the artifact named by `config`.
    pub fn new(config: &Config) -> Self {
        let config = config.clone();
        Self::with_bootstrap(move || {
            let config = config.clone();
            async move { artifact::bootstrap(&config).await }
        })
    }

    /// Loader with a custom bootstrap. The closure runs at most once per
    /// acquisition round; its outcome is shared by every concurrent caller.
    pub fn with_bootstrap<F, Fut>(bootstrap: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn PythonRuntime>, RuntimeLoadError>> + Send + 'static,
    {
        Self {
            bootstrap: Box::new(move || {
                bootstrap().map(|outcome| outcome.map_err(Arc::new)).boxed()
            }),
            state: Mutex::new(LoadState::default()),
            loading: AtomicBool::new(false),
            ready: AtomicBool::new(false),
        }
    }

    /// Whether the runtime has been loaded and cached.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Whether a bootstrap is currently in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    /// Obtain the process-wide runtime handle, bootstrapping it on first
    /// demand.
    ///
    /// Suspends while a bootstrap is in flight. Once a load has succeeded,
    /// returns the cached handle immediately.
    #[instrument(skip(self))]
    pub async fn acquire(&self) -> LoadOutcome {
        let (shared, generation) = {
            let mut state = self.state.lock().expect("loader state poisoned");
            if let Some(handle) = &state.handle {
                return Ok(handle.clone());
            }
            match &state.pending {
                Some(pending) => (pending.clone(), state.generation),
                None => {
                    state.generation += 1;
                    debug!(generation = state.generation, "starting runtime bootstrap");
                    self.loading.store(true, Ordering::SeqCst);
                    let pending = (self.bootstrap)().shared();
                    state.pending = Some(pending.clone());
                    (pending, state.generation)
                }
            }
        };

        let outcome = shared.await;

        {
            let mut state = self.state.lock().expect("loader state poisoned");
            // Only the round that produced this outcome may settle the state;
            // a later round may already have a new bootstrap in flight.
            if state.generation == generation && state.pending.is_some() {
                state.pending = None;
                self.loading.store(false, Ordering::SeqCst);
                match &outcome {
                    Ok(handle) => {
                        state.handle = Some(handle.clone());
                        self.ready.store(true, Ordering::SeqCst);
                        info!("runtime ready");
                    }
                    Err(error) => warn!(%error, "runtime bootstrap failed"),
                }
            }
        }

        outcome
    }
}
