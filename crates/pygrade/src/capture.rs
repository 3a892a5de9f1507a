//! Output capture for grading phases
//!
//! The runtime reports stdout and stderr through installable line sinks.
//! This module routes those lines into per-phase buffers: exactly one phase
//! is active at a time, stderr lines carry an explicit error tag, and
//! arrival order across both streams is preserved as observed.
//!
//! Sinks are minted against the phase that is active at mint time. A line
//! arriving through a sink from an earlier phase is dropped, so output from
//! an execution that outlives its phase (an abandoned timeout, a runaway
//! thread) can never land in a later phase's buffer.

use std::sync::{Arc, Mutex};

/// Prefix applied to every captured stderr line.
pub const ERROR_TAG: &str = "[ERROR] ";

/// The two sequential sub-runs of a grading session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapturePhase {
    /// The learner's submission is executing.
    User,
    /// The authored test code is executing.
    Test,
}

/// Ordered lines captured during one phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureBuffer {
    phase: CapturePhase,
    lines: Vec<String>,
}

impl CaptureBuffer {
    /// Which phase produced this buffer.
    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    /// The captured lines in arrival order.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Whether nothing was captured. An empty buffer is valid, not an error.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// The captured lines joined by newlines.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Sink handed to the runtime for one output stream. Called once per line.
pub type OutputSink = Arc<dyn Fn(&str) + Send + Sync>;

#[derive(Debug, Default)]
struct CaptureState {
    phase: Option<CapturePhase>,
    /// Bumped at every `begin_phase`. Sinks carry the generation they were
    /// minted under; a mismatch on push means the writer belongs to a phase
    /// that has already closed.
    generation: u64,
    lines: Vec<String>,
}

/// Phase-isolated capture of the runtime's output streams.
///
/// Cloning is cheap and shares the underlying state. The sinks returned by
/// [`stdout_sink`](Self::stdout_sink) and [`stderr_sink`](Self::stderr_sink)
/// record only while the phase they were minted in stays active; mint fresh
/// sinks after each [`begin_phase`](Self::begin_phase).
#[derive(Debug, Clone, Default)]
pub struct OutputCapture {
    state: Arc<Mutex<CaptureState>>,
}

impl OutputCapture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a fresh, empty buffer for `phase`.
    ///
    /// Atomically closes the previously active phase, if any, and returns its
    /// buffer. Sinks minted before this call stop recording, so no line from
    /// the prior phase can land in the new buffer.
    pub fn begin_phase(&self, phase: CapturePhase) -> Option<CaptureBuffer> {
        let mut state = self.state.lock().expect("capture state poisoned");
        let previous = state.phase.take().map(|prior| CaptureBuffer {
            phase: prior,
            lines: std::mem::take(&mut state.lines),
        });
        state.phase = Some(phase);
        state.generation += 1;
        previous
    }

    /// Close the active phase and return its buffer, or `None` when no phase
    /// is open.
    pub fn end_phase(&self) -> Option<CaptureBuffer> {
        let mut state = self.state.lock().expect("capture state poisoned");
        let phase = state.phase.take()?;
        Some(CaptureBuffer {
            phase,
            lines: std::mem::take(&mut state.lines),
        })
    }

    /// Sink for the runtime's stdout stream, bound to the currently active
    /// phase. Lines are appended verbatim.
    pub fn stdout_sink(&self) -> OutputSink {
        let capture = self.clone();
        let generation = self.generation();
        Arc::new(move |line: &str| capture.push(generation, line.to_string()))
    }

    /// Sink for the runtime's stderr stream, bound to the currently active
    /// phase. Lines are appended with the [`ERROR_TAG`] prefix.
    pub fn stderr_sink(&self) -> OutputSink {
        let capture = self.clone();
        let generation = self.generation();
        Arc::new(move |line: &str| capture.push(generation, format!("{ERROR_TAG}{line}")))
    }

    /// Record a harness-side error as if the runtime had written it to
    /// stderr. Used for non-fatal faults that should surface as ordinary
    /// captured text.
    pub fn record_error(&self, message: &str) {
        let mut state = self.state.lock().expect("capture state poisoned");
        if state.phase.is_some() {
            state.lines.push(format!("{ERROR_TAG}{message}"));
        }
    }

    fn generation(&self) -> u64 {
        self.state.lock().expect("capture state poisoned").generation
    }

    fn push(&self, generation: u64, line: String) {
        let mut state = self.state.lock().expect("capture state poisoned");
        // Lines outside any phase, or from a closed one, are dropped.
        if state.phase.is_some() && state.generation == generation {
            state.lines.push(line);
        }
    }
}
