//! Classification of evaluation child terminations.
//!
//! The child's exit status is the only success/failure signal: 0 means the
//! statement ran, the sentinel means it raised, a signal means it crashed.

use nix::sys::signal::Signal;
use nix::sys::wait::WaitStatus;

use super::protocol::ChildReport;
use crate::value::Scope;

/// Exit status an evaluation child uses when the statement raised.
pub const ABNORMAL_EXIT: i32 = 255;

/// Reason why an evaluation child terminated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal exit with status code.
    Exited(i32),
    /// Killed by signal.
    Signaled(Signal),
    /// Process is still running.
    StillAlive,
    /// Unknown termination reason.
    Unknown,
}

impl TerminationReason {
    /// Get a human-readable description.
    pub fn description(&self) -> String {
        match self {
            Self::Exited(ABNORMAL_EXIT) => "raised an error".to_string(),
            Self::Exited(code) => format!("exited with code {}", code),
            Self::Signaled(sig) => format!("killed by signal {:?}", sig),
            Self::StillAlive => "still running".to_string(),
            Self::Unknown => "unknown reason".to_string(),
        }
    }
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Analyze a `WaitStatus` to determine the termination reason.
pub fn analyze_wait_status(status: WaitStatus) -> TerminationReason {
    match status {
        WaitStatus::Exited(_, code) => TerminationReason::Exited(code),
        WaitStatus::Signaled(_, signal, _) => TerminationReason::Signaled(signal),
        WaitStatus::StillAlive => TerminationReason::StillAlive,
        _ => TerminationReason::Unknown,
    }
}

/// What one statement's evaluation amounted to.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Ran to completion, leaving this scope behind.
    Succeeded(Scope),
    /// Raised or crashed.
    Failed(TerminationReason),
    /// User code asked to exit.
    Exited(i32),
    /// Interrupted before it finished.
    Cancelled,
}

/// Combine a child's termination with the report it wrote.
///
/// A clean exit without any report means the code exited on its own before
/// the report could be written.
pub fn classify(reason: TerminationReason, report: Option<ChildReport>) -> Outcome {
    match reason {
        TerminationReason::Exited(0) => match report {
            Some(ChildReport::Completed { scope }) => Outcome::Succeeded(scope),
            Some(ChildReport::Exited { code }) => Outcome::Exited(code),
            None => Outcome::Exited(0),
        },
        TerminationReason::Exited(ABNORMAL_EXIT) => Outcome::Failed(reason),
        TerminationReason::Exited(code) => Outcome::Exited(code),
        other => Outcome::Failed(other),
    }
}
