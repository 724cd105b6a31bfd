//! Execution sandbox for learner-authored JavaScript.
//!
//! Source text is parsed and evaluated by a restricted interpreter that only
//! exposes basic language semantics and a `console` whose `log` writes into a
//! capture buffer created for that one run.

#![forbid(unsafe_code)]

pub mod ast;
pub mod error;
mod interp;
pub mod lexer;
pub mod parser;
pub mod sink;
pub mod value;

use std::thread;
use std::time::{Duration, Instant};

pub use error::{ExecutionError, SyntaxError};
pub use sink::{CaptureBuffer, OutputSink};

use crate::interp::Interpreter;

/// Interpreter frames are deep; runs get their own thread with a roomy stack.
const RUN_STACK_BYTES: usize = 64 * 1024 * 1024;

//
// ─── CONFIGURATION ─────────────────────────────────────────────────────────────
//

/// Resource limits for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionBudget {
    /// Wall-clock limit. Checked every few hundred evaluation steps.
    pub timeout: Duration,
    pub max_steps: u64,
    /// Nested user function calls before `RangeError` is thrown.
    pub max_call_depth: usize,
    pub max_output_bytes: usize,
    /// Bytes a run may allocate for strings, arrays, objects and closures,
    /// counted cumulatively.
    pub max_alloc_bytes: usize,
}

impl Default for ExecutionBudget {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(500),
            max_steps: 10_000_000,
            max_call_depth: 256,
            max_output_bytes: 64 * 1024,
            max_alloc_bytes: 512 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SandboxConfig {
    pub budget: ExecutionBudget,
    /// Mirror captured lines to the log at debug level.
    pub echo: bool,
}

impl SandboxConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.budget.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.budget.max_steps = max_steps;
        self
    }

    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.budget.max_call_depth = depth;
        self
    }

    #[must_use]
    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.budget.max_output_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_max_alloc_bytes(mut self, bytes: usize) -> Self {
        self.budget.max_alloc_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

//
// ─── RUN OUTPUT ────────────────────────────────────────────────────────────────
//

/// Result of [`Sandbox::run`]: everything printed, plus the fault that ended the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    captured: String,
    error: Option<ExecutionError>,
}

impl RunOutput {
    /// A run that produced nothing and stopped with `error`.
    #[must_use]
    pub fn failed(error: ExecutionError) -> Self {
        Self {
            captured: String::new(),
            error: Some(error),
        }
    }

    /// Lines printed before the run ended, each terminated by `\n`.
    #[must_use]
    pub fn captured(&self) -> &str {
        &self.captured
    }

    #[must_use]
    pub fn error(&self) -> Option<&ExecutionError> {
        self.error.as_ref()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// The text graded against expected output: the capture, followed by
    /// `Error: <message>` when the run faulted.
    #[must_use]
    pub fn text(&self) -> String {
        match &self.error {
            Some(err) => format!("{}Error: {err}\n", self.captured),
            None => self.captured.clone(),
        }
    }

    #[must_use]
    pub fn into_result(self) -> Result<String, ExecutionError> {
        match self.error {
            Some(err) => Err(err),
            None => Ok(self.captured),
        }
    }
}

//
// ─── SANDBOX ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    #[must_use]
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `source` and return what it printed. Never fails: faults are folded
    /// into the returned [`RunOutput`].
    #[must_use]
    pub fn run(&self, source: &str) -> RunOutput {
        let started = Instant::now();
        let output = thread::scope(|scope| {
            let spawned = thread::Builder::new()
                .name("sandbox-run".into())
                .stack_size(RUN_STACK_BYTES)
                .spawn_scoped(scope, || execute(source, &self.config));
            match spawned {
                Ok(handle) => handle.join().unwrap_or_else(|_| {
                    RunOutput::failed(ExecutionError::Internal(
                        "interpreter thread panicked".into(),
                    ))
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "could not spawn sandbox thread; running inline");
                    execute(source, &self.config)
                }
            }
        });
        tracing::debug!(
            elapsed = ?started.elapsed(),
            bytes = output.captured.len(),
            error = output.error.as_ref().map(tracing::field::display),
            "sandbox run finished"
        );
        output
    }

    /// Run `source`, surfacing a fault as an error instead of output text.
    ///
    /// # Errors
    /// Returns the [`ExecutionError`] that stopped the run. The partial capture
    /// is available through [`Sandbox::run`].
    pub fn try_run(&self, source: &str) -> Result<String, ExecutionError> {
        self.run(source).into_result()
    }
}

fn execute(source: &str, config: &SandboxConfig) -> RunOutput {
    let program = match parser::parse_program(source) {
        Ok(program) => program,
        Err(err) => {
            tracing::debug!(line = err.line(), "sandbox rejected program: {err}");
            return RunOutput::failed(err.into());
        }
    };

    let mut buffer = CaptureBuffer::new(config.budget.max_output_bytes, config.echo);
    let mut interpreter = Interpreter::new(&mut buffer, config.budget);
    let result = interpreter.run(&program);
    tracing::trace!(steps = interpreter.steps(), "interpreter finished");
    drop(interpreter);

    RunOutput {
        captured: buffer.into_string(),
        error: result.err(),
    }
}
