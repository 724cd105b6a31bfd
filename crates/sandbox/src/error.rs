//! Faults raised while parsing or evaluating learner code.

use thiserror::Error;

/// Early error: the program is rejected before any statement runs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct SyntaxError {
    message: String,
    line: usize,
}

impl SyntaxError {
    #[must_use]
    pub fn new(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// 1-based source line the error was detected on.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }
}

/// Why a run stopped early.
///
/// `Display` yields exactly the text placed after `Error: ` in captured output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ExecutionError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// An exception escaped the program. `message` follows the engine convention:
    /// the `message` of an error object, otherwise the thrown value as a string.
    #[error("{message}")]
    Uncaught { name: String, message: String },

    #[error("Execution timed out after {limit_ms}ms")]
    TimedOut { limit_ms: u64 },

    #[error("Execution step limit of {limit} exceeded")]
    StepLimit { limit: u64 },

    #[error("Output limit exceeded")]
    OutputLimit { limit_bytes: usize },

    #[error("Memory limit exceeded")]
    MemoryLimit { limit_bytes: usize },

    #[error("Internal sandbox failure: {0}")]
    Internal(String),
}

impl ExecutionError {
    /// True for faults the learner's program raised itself (syntax or uncaught throw).
    #[must_use]
    pub fn is_program_fault(&self) -> bool {
        matches!(self, Self::Syntax(_) | Self::Uncaught { .. })
    }

    /// True when an execution budget stopped the run.
    #[must_use]
    pub fn is_budget_exceeded(&self) -> bool {
        matches!(
            self,
            Self::TimedOut { .. }
                | Self::StepLimit { .. }
                | Self::OutputLimit { .. }
                | Self::MemoryLimit { .. }
        )
    }
}
