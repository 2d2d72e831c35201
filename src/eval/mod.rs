//! The evaluation capability the worker drives.
//!
//! An [`Evaluator`] runs one statement against a [`Scope`]. It is always
//! called inside a disposable evaluation child, so it may crash, block or
//! exit without harming the worker.

pub mod php;

use thiserror::Error;

use crate::value::{Scope, Value};

pub use php::PhpEvaluator;

/// How an evaluation ended when it did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The code produced a value (`return` or the implicit result).
    Returned(Value),
    /// The code ran to the end without a value.
    Completed,
    /// The code asked the process to exit with this status.
    Exited(i32),
}

/// Errors raised while evaluating user code.
#[derive(Error, Debug)]
pub enum EvalError {
    /// An error the user needs to see, such as an uncaught exception.
    #[error("{0}")]
    Raised(String),

    /// The interpreter died and has already written its own diagnostics.
    #[error("interpreter exited with status {0}")]
    Fatal(i32),

    #[error("interpreter was terminated by signal {0}")]
    Signaled(i32),

    #[error("failed to run interpreter: {0}")]
    Io(#[from] std::io::Error),

    #[error("unreadable interpreter result: {0}")]
    Json(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether the message still has to be written to stderr.
    pub fn needs_report(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

/// Evaluate code strings against a scope.
pub trait Evaluator: Send {
    /// Run `code`, reading and updating `scope`.
    fn evaluate(&self, code: &str, scope: &mut Scope) -> Result<Completion, EvalError>;

    /// Names of functions and constants, for completion.
    fn symbols(&self) -> Vec<String> {
        Vec::new()
    }
}
