//! Scripted runtime standing in for the artifact-backed interpreter.
//!
//! Each `run_source` call consumes the next queued script. Scripts emit
//! output through the installed sinks, mutate or assert on globals, sleep,
//! or raise, which is enough to exercise every grading path without a real
//! interpreter.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pygrade::{
    DependencyFault, ExecutionFault, Harness, OutputSink, PythonRuntime, RuntimeLoader,
};

/// One step of a scripted `run_source` call.
pub enum Action {
    /// Emit a stdout line.
    Out(&'static str),
    /// Emit a stderr line.
    ErrLine(&'static str),
    /// Emit the current value of a global to stdout.
    PrintGlobal(&'static str),
    /// Raise unless the global has exactly this value.
    AssertGlobalEq(&'static str, &'static str),
    /// Stall, as an infinite loop would.
    Sleep(Duration),
    /// Emit a stdout line from a background task after the delay. The task
    /// keeps running when the call itself is abandoned, like an execution
    /// still winding down after its deadline, and writes through the sink
    /// that was installed when the call started.
    OutLate(Duration, &'static str),
    /// Raise with this message; later steps do not run.
    Raise(&'static str),
}

#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: Mutex<VecDeque<Vec<Action>>>,
    globals: Mutex<HashMap<String, String>>,
    stdout: Mutex<Option<OutputSink>>,
    stderr: Mutex<Option<OutputSink>>,
    dependency_error: Mutex<Option<String>>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
}

impl ScriptedRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Queue the script for the next `run_source` call.
    pub fn push_script(&self, actions: Vec<Action>) {
        self.scripts.lock().unwrap().push_back(actions);
    }

    /// Make `resolve_dependencies` fail with this message.
    pub fn fail_dependencies(&self, message: &str) {
        *self.dependency_error.lock().unwrap() = Some(message.to_string());
    }

    /// Whether two `run_source` calls ever executed concurrently.
    pub fn saw_overlap(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }

    fn emit_out(&self, line: &str) {
        if let Some(sink) = self.stdout.lock().unwrap().as_ref() {
            sink(line);
        }
    }

    fn emit_err(&self, line: &str) {
        if let Some(sink) = self.stderr.lock().unwrap().as_ref() {
            sink(line);
        }
    }

    async fn run_script(&self, actions: Vec<Action>) -> Result<(), ExecutionFault> {
        for action in actions {
            match action {
                Action::Out(line) => self.emit_out(line),
                Action::ErrLine(line) => self.emit_err(line),
                Action::PrintGlobal(name) => {
                    let value = self.globals.lock().unwrap().get(name).cloned();
                    match value {
                        Some(value) => self.emit_out(&value),
                        None => {
                            return Err(ExecutionFault::Python(format!(
                                "NameError: name '{name}' is not defined"
                            )));
                        }
                    }
                }
                Action::AssertGlobalEq(name, expected) => {
                    let value = self.globals.lock().unwrap().get(name).cloned();
                    if value.as_deref() != Some(expected) {
                        return Err(ExecutionFault::Python(format!(
                            "AssertionError: {name} was {value:?}, expected {expected:?}"
                        )));
                    }
                }
                Action::Sleep(duration) => tokio::time::sleep(duration).await,
                Action::OutLate(delay, line) => {
                    let sink = self.stdout.lock().unwrap().clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        if let Some(sink) = sink {
                            sink(line);
                        }
                    });
                }
                Action::Raise(message) => {
                    return Err(ExecutionFault::Python(message.to_string()));
                }
            }
        }
        Ok(())
    }

    async fn run_next(&self) -> Result<(), ExecutionFault> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        let script = self.scripts.lock().unwrap().pop_front();
        let result = match script {
            Some(actions) => self.run_script(actions).await,
            None => Err(ExecutionFault::Python("no script queued".to_string())),
        };
        self.in_flight.store(false, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl PythonRuntime for ScriptedRuntime {
    fn run_source(&self, _code: &str) -> Result<(), ExecutionFault> {
        unimplemented!("the session drives the async entry point")
    }

    async fn run_source_async(&self, _code: &str) -> Result<(), ExecutionFault> {
        self.run_next().await
    }

    async fn resolve_dependencies(&self, _code: &str) -> Result<(), DependencyFault> {
        match self.dependency_error.lock().unwrap().clone() {
            Some(message) => Err(DependencyFault(message)),
            None => Ok(()),
        }
    }

    fn set_global_str(&self, name: &str, value: &str) -> Result<(), ExecutionFault> {
        self.globals
            .lock()
            .unwrap()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn set_stdout_sink(&self, sink: OutputSink) {
        *self.stdout.lock().unwrap() = Some(sink);
    }

    fn set_stderr_sink(&self, sink: OutputSink) {
        *self.stderr.lock().unwrap() = Some(sink);
    }
}

/// Harness whose loader hands out the given scripted runtime.
pub fn harness_with(runtime: Arc<ScriptedRuntime>, phase_timeout: Duration) -> Harness {
    let loader = RuntimeLoader::with_bootstrap(move || {
        let runtime = runtime.clone() as Arc<dyn PythonRuntime>;
        async move { Ok(runtime) }
    });
    Harness::with_loader(Arc::new(loader), phase_timeout)
}
