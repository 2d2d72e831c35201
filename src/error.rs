//! Error types for phork.

use thiserror::Error;

use crate::eval::EvalError;

/// Main error type for phork.
#[derive(Error, Debug)]
pub enum ReplError {
    #[error("Channel error: {0}")]
    Channel(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Failed to fork evaluation process: {0}")]
    Fork(nix::errno::Errno),

    #[error("System call failed: {0}")]
    Sys(#[from] nix::errno::Errno),

    #[error("Evaluation failed: {0}")]
    Evaluation(#[from] EvalError),

    #[error("PHP is not usable at '{path}': {reason}")]
    PhpUnavailable { path: String, reason: String },

    #[error("Line editor error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for phork operations.
pub type Result<T> = std::result::Result<T, ReplError>;
