//! Artifact-backed runtime
//!
//! Loads the interpreter shared library with `libloading` and exposes it
//! through the [`PythonRuntime`] trait. The artifact implements a small C
//! ABI:
//!
//! ```c
//! int  pyrt_init(void);
//! int  pyrt_run_source(const char *code);
//! int  pyrt_resolve_imports(const char *code);
//! int  pyrt_set_global_str(const char *name, const char *value);
//! void pyrt_set_stdout(void (*cb)(const char *line, void *ctx), void *ctx);
//! void pyrt_set_stderr(void (*cb)(const char *line, void *ctx), void *ctx);
//! const char *pyrt_last_error(void);
//! ```
//!
//! Entry points return 0 on success; on failure `pyrt_last_error` holds a
//! message valid until the next call. Output callbacks are invoked once per
//! line from the thread executing the source.

use std::ffi::{CStr, CString, c_char, c_int, c_void};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use libloading::{Library, Symbol};
use tracing::{debug, instrument};

use crate::capture::OutputSink;
use crate::runtime::{DependencyFault, ExecutionFault, PythonRuntime, RuntimeLoadError};

type LineCallback = unsafe extern "C" fn(*const c_char, *mut c_void);
type InitFn = unsafe extern "C" fn() -> c_int;
type SourceFn = unsafe extern "C" fn(*const c_char) -> c_int;
type SetGlobalFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type SetSinkFn = unsafe extern "C" fn(LineCallback, *mut c_void);
type LastErrorFn = unsafe extern "C" fn() -> *const c_char;

type SinkSlot = Mutex<Option<OutputSink>>;

/// Trampoline registered with the artifact. `ctx` points at the owning
/// runtime's sink slot, which lives as long as the process does.
unsafe extern "C" fn sink_trampoline(line: *const c_char, ctx: *mut c_void) {
    if line.is_null() || ctx.is_null() {
        return;
    }
    let slot = unsafe { &*(ctx as *const SinkSlot) };
    let text = unsafe { CStr::from_ptr(line) }.to_string_lossy();
    if let Ok(guard) = slot.lock()
        && let Some(sink) = guard.as_ref()
    {
        sink(&text);
    }
}

struct NativeInner {
    library: Library,
    /// Sinks the trampolines read from. Only updated at interpreter entry,
    /// so an execution keeps the sinks it started with even if newer ones
    /// were installed while it ran past its deadline.
    stdout_slot: SinkSlot,
    stderr_slot: SinkSlot,
    /// Sinks installed through the trait, waiting for the next entry.
    pending_stdout: SinkSlot,
    pending_stderr: SinkSlot,
    /// Held across every interpreter entry. The interpreter is not
    /// reentrant; a timed-out execution still inside it keeps the lock, and
    /// later entries fail fast instead of running concurrently with it.
    busy: Mutex<()>,
}

impl NativeInner {
    fn enter(&self) -> Result<MutexGuard<'_, ()>, ExecutionFault> {
        self.busy.try_lock().map_err(|_| {
            ExecutionFault::Python(
                "interpreter is still executing a previous timed-out call".to_string(),
            )
        })
    }

    /// Move pending sinks into the live slots. Called only with the busy
    /// lock held, so an abandoned execution never sees sinks installed
    /// after it started.
    fn commit_sinks(&self) {
        for (pending, slot) in [
            (&self.pending_stdout, &self.stdout_slot),
            (&self.pending_stderr, &self.stderr_slot),
        ] {
            if let Ok(mut pending) = pending.lock()
                && let Some(sink) = pending.take()
            {
                *slot.lock().expect("sink slot poisoned") = Some(sink);
            }
        }
    }

    fn last_error_or(&self, fallback: String) -> String {
        let last_error: Symbol<LastErrorFn> = match unsafe { self.library.get(b"pyrt_last_error\0") }
        {
            Ok(symbol) => symbol,
            Err(_) => return fallback,
        };
        let message = unsafe { last_error() };
        if message.is_null() {
            return fallback;
        }
        let message = unsafe { CStr::from_ptr(message) }.to_string_lossy();
        if message.is_empty() {
            fallback
        } else {
            message.into_owned()
        }
    }

    fn call_source(&self, symbol: &[u8], code: &str) -> Result<(), ExecutionFault> {
        let _entry = self.enter()?;
        self.commit_sinks();
        let source = CString::new(code)
            .map_err(|_| ExecutionFault::Python("source contains a NUL byte".to_string()))?;
        let func: Symbol<SourceFn> = unsafe { self.library.get(symbol) }
            .map_err(|e| ExecutionFault::Python(format!("runtime symbol missing: {e}")))?;
        let status = unsafe { func(source.as_ptr()) };
        if status == 0 {
            Ok(())
        } else {
            Err(ExecutionFault::Python(
                self.last_error_or(format!("runtime returned status {status}")),
            ))
        }
    }

    fn set_global(&self, name: &str, value: &str) -> Result<(), ExecutionFault> {
        let _entry = self.enter()?;
        let name = CString::new(name)
            .map_err(|_| ExecutionFault::Python("global name contains a NUL byte".to_string()))?;
        let value = CString::new(value)
            .map_err(|_| ExecutionFault::Python("global value contains a NUL byte".to_string()))?;
        let func: Symbol<SetGlobalFn> = unsafe { self.library.get(b"pyrt_set_global_str\0") }
            .map_err(|e| ExecutionFault::Python(format!("runtime symbol missing: {e}")))?;
        let status = unsafe { func(name.as_ptr(), value.as_ptr()) };
        if status == 0 {
            Ok(())
        } else {
            Err(ExecutionFault::Python(
                self.last_error_or(format!("runtime returned status {status}")),
            ))
        }
    }

    fn register_sinks(self: &Arc<Self>) -> Result<(), RuntimeLoadError> {
        let set_stdout: Symbol<SetSinkFn> = unsafe { self.library.get(b"pyrt_set_stdout\0") }?;
        let set_stderr: Symbol<SetSinkFn> = unsafe { self.library.get(b"pyrt_set_stderr\0") }?;
        // The slots live inside the Arc, whose allocation never moves. The
        // handle is process-lifetime, so the pointers stay valid for every
        // callback the artifact will ever make.
        unsafe {
            set_stdout(
                sink_trampoline,
                (&self.stdout_slot as *const SinkSlot).cast_mut().cast(),
            );
            set_stderr(
                sink_trampoline,
                (&self.stderr_slot as *const SinkSlot).cast_mut().cast(),
            );
        }
        Ok(())
    }
}

/// The loaded interpreter. Process-lifetime; the library is never unloaded.
pub struct NativeRuntime {
    inner: Arc<NativeInner>,
}

impl std::fmt::Debug for NativeRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeRuntime").finish_non_exhaustive()
    }
}

impl NativeRuntime {
    /// Load the artifact at `path` and run its initialization.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub async fn load(path: &Path) -> Result<Self, RuntimeLoadError> {
        let path = path.to_path_buf();
        // Library loading and interpreter init block; keep them off the
        // async runtime.
        let inner = tokio::task::spawn_blocking(move || -> Result<NativeInner, RuntimeLoadError> {
            let library = unsafe { Library::new(&path) }?;
            let inner = NativeInner {
                library,
                stdout_slot: Mutex::new(None),
                stderr_slot: Mutex::new(None),
                pending_stdout: Mutex::new(None),
                pending_stderr: Mutex::new(None),
                busy: Mutex::new(()),
            };
            let init: Symbol<InitFn> = unsafe { inner.library.get(b"pyrt_init\0") }?;
            let status = unsafe { init() };
            if status != 0 {
                return Err(RuntimeLoadError::Init(
                    inner.last_error_or(format!("pyrt_init returned {status}")),
                ));
            }
            Ok(inner)
        })
        .await
        .map_err(|e| RuntimeLoadError::Init(format!("bootstrap task failed: {e}")))??;

        let inner = Arc::new(inner);
        inner.register_sinks()?;
        debug!("native runtime initialized");
        Ok(Self { inner })
    }
}

#[async_trait]
impl PythonRuntime for NativeRuntime {
    fn run_source(&self, code: &str) -> Result<(), ExecutionFault> {
        self.inner.call_source(b"pyrt_run_source\0", code)
    }

    async fn run_source_async(&self, code: &str) -> Result<(), ExecutionFault> {
        let inner = self.inner.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || inner.call_source(b"pyrt_run_source\0", &code))
            .await
            .unwrap_or_else(|e| Err(ExecutionFault::Python(format!("execution task failed: {e}"))))
    }

    async fn resolve_dependencies(&self, code: &str) -> Result<(), DependencyFault> {
        let inner = self.inner.clone();
        let code = code.to_string();
        tokio::task::spawn_blocking(move || inner.call_source(b"pyrt_resolve_imports\0", &code))
            .await
            .unwrap_or_else(|e| Err(ExecutionFault::Python(format!("resolution task failed: {e}"))))
            .map_err(|fault| DependencyFault(fault.to_string()))
    }

    fn set_global_str(&self, name: &str, value: &str) -> Result<(), ExecutionFault> {
        self.inner.set_global(name, value)
    }

    // Sinks take effect at the next interpreter entry, not immediately; see
    // `NativeInner::commit_sinks`.
    fn set_stdout_sink(&self, sink: OutputSink) {
        *self
            .inner
            .pending_stdout
            .lock()
            .expect("stdout slot poisoned") = Some(sink);
    }

    fn set_stderr_sink(&self, sink: OutputSink) {
        *self
            .inner
            .pending_stderr
            .lock()
            .expect("stderr slot poisoned") = Some(sink);
    }
}
