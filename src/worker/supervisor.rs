//! Forks one disposable child per statement and settles its outcome.
//!
//! ```text
//!  Idle ─► Forking ─► WaitingOnChild ─┬─► ChildSucceeded ─► Idle   (DONE)
//!                                     ├─► ChildFailed ───► Idle    (FAILED, failure hooks)
//!                                     ├─► ChildCancelled ► Idle    (CANCELLED)
//!                                     └─► ChildExited                (EXITED)
//! ```
//!
//! The child owns a copy of the scope. Only a child that exits cleanly and
//! reports `Completed` can change the worker's scope.
//!
//! Children stay in the worker's process group, which is the terminal's
//! foreground group, so user code can read from the terminal. Ctrl-C reaches
//! the child together with the worker, and the worker kills it.

use std::io;
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};
use std::time::Duration;

use nix::unistd::{ForkResult, fork, getpid};
use tracing::{debug, info, warn};

use super::hooks::Hooks;
use super::ipc::{PipeFd, write_all_fd};
use super::proc::EvalChild;
use super::protocol::{ChildReport, Status};
use super::signals::{ABNORMAL_EXIT, Outcome, TerminationReason, analyze_wait_status, classify};
use crate::cancel::CancelToken;
use crate::chunker::is_return_statement;
use crate::error::{ReplError, Result};
use crate::eval::{Completion, Evaluator};
use crate::inspect::Inspector;
use crate::value::Scope;

/// How often the parent re-checks the cancel flag while a child runs.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Where the supervisor is in the life of one statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Forking,
    WaitingOnChild,
    ChildSucceeded,
    ChildFailed,
    ChildCancelled,
    ChildExited,
}

/// Owns the authoritative scope and runs each statement in a forked child.
pub struct Supervisor {
    evaluator: Box<dyn Evaluator>,
    inspector: Box<dyn Inspector>,
    scope: Scope,
    hooks: Hooks,
    cancel: CancelToken,
    shutdown: CancelToken,
    display: OwnedFd,
    state: SupervisorState,
}

impl Supervisor {
    /// Create a supervisor that displays results on this process's stdout.
    pub fn new(evaluator: Box<dyn Evaluator>, inspector: Box<dyn Inspector>) -> Result<Self> {
        let display = io::stdout().as_fd().try_clone_to_owned()?;
        Ok(Self {
            evaluator,
            inspector,
            scope: Scope::new(),
            hooks: Hooks::new(),
            cancel: CancelToken::new(),
            shutdown: CancelToken::new(),
            display,
            state: SupervisorState::Idle,
        })
    }

    pub fn with_hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Use an externally owned token, e.g. one bound to SIGINT.
    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Stop waiting on a running child once `shutdown` is raised.
    ///
    /// Unlike the cancel token this one is never reset.
    pub fn with_shutdown_token(mut self, shutdown: CancelToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Send rendered results to `display` instead of stdout.
    pub fn with_display(mut self, display: OwnedFd) -> Self {
        self.display = display;
        self
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Run startup hooks against the initial scope.
    ///
    /// These run in the worker itself, so definitions they make persist.
    pub fn start(&mut self) {
        let failed = self
            .hooks
            .run_startup(self.evaluator.as_ref(), &mut self.scope);
        info!(
            hooks = self.hooks.startup_len(),
            failed,
            vars = self.scope.len(),
            "Worker started"
        );
    }

    fn transition(&mut self, next: SupervisorState) {
        debug!(from = ?self.state, to = ?next, "Supervisor state");
        self.state = next;
    }

    /// Evaluate one statement in a forked child and report its status.
    ///
    /// Never returns `Ready` or `Candidates`.
    pub fn evaluate(&mut self, statement: &str) -> Result<Status> {
        // A stale interrupt from before this statement must not cancel it.
        self.cancel.reset();
        self.transition(SupervisorState::Forking);

        let (read_fd, write_fd) = nix::unistd::pipe()?;
        // SAFETY: the child only evaluates, writes to raw descriptors and
        // leaves through `_exit`; it never returns into the caller's stack.
        let forked = unsafe { fork() };
        match forked {
            Err(e) => {
                self.transition(SupervisorState::Idle);
                Err(ReplError::Fork(e))
            }
            Ok(ForkResult::Child) => {
                drop(read_fd);
                let code = self.run_child(statement, write_fd.as_fd());
                // SAFETY: terminate without running atexit handlers or
                // flushing buffers inherited from the worker.
                unsafe { nix::libc::_exit(code) }
            }
            Ok(ForkResult::Parent { child }) => {
                drop(write_fd);
                debug!(pid = %child, "Forked evaluation child");
                let mut eval_child = EvalChild::new(child, PipeFd::new(read_fd));
                self.transition(SupervisorState::WaitingOnChild);
                let outcome = self.wait_for(&mut eval_child)?;
                Ok(self.settle(outcome))
            }
        }
    }

    /// Body of the evaluation child. Returns the exit status.
    ///
    /// Nothing here may take a lock another thread of the worker could have
    /// held at fork time, so output goes straight to raw descriptors.
    fn run_child(&self, statement: &str, report: BorrowedFd<'_>) -> i32 {
        let identity = getpid();

        let mut scope = self.scope.clone();
        let result = self.evaluator.evaluate(statement, &mut scope);

        // User code forked and this is the copy; it must not report.
        if getpid() != identity {
            return 0;
        }

        match result {
            Ok(Completion::Exited(code)) => {
                let _ = write_report(report, &ChildReport::Exited { code });
                0
            }
            Ok(completion) => {
                if let Completion::Returned(value) = &completion
                    && is_return_statement(statement)
                {
                    let mut text = self.inspector.render(value);
                    text.push('\n');
                    let _ = write_all_fd(self.display.as_fd(), text.as_bytes());
                }
                match write_report(report, &ChildReport::Completed { scope }) {
                    Ok(()) => 0,
                    Err(_) => ABNORMAL_EXIT,
                }
            }
            Err(e) => {
                if e.needs_report() {
                    let message = format!("{e}\n");
                    let _ = write_all_fd(io::stderr().as_fd(), message.as_bytes());
                }
                ABNORMAL_EXIT
            }
        }
    }

    fn interrupted(&self) -> bool {
        self.cancel.is_cancelled() || self.shutdown.is_cancelled()
    }

    /// Poll the child until it exits or the cancel or shutdown flag is raised.
    fn wait_for(&mut self, child: &mut EvalChild) -> Result<Outcome> {
        loop {
            if self.interrupted() {
                debug!(pid = %child.pid(), "Cancelling evaluation child");
                child.kill()?;
                return Ok(Outcome::Cancelled);
            }

            child.pump_report(DEFAULT_POLL_INTERVAL)?;

            let Some(status) = child.try_wait()? else {
                continue;
            };
            child.drain_report()?;
            if self.interrupted() {
                return Ok(Outcome::Cancelled);
            }

            let reason = analyze_wait_status(status);
            let report = match child.take_report() {
                Ok(report) => report,
                Err(e) => {
                    warn!(pid = %child.pid(), error = %e, "Unreadable child report");
                    return Ok(Outcome::Failed(reason));
                }
            };
            debug!(pid = %child.pid(), %reason, "Evaluation child finished");
            return Ok(classify(reason, report));
        }
    }

    fn settle(&mut self, outcome: Outcome) -> Status {
        let status = match outcome {
            Outcome::Succeeded(scope) => {
                self.transition(SupervisorState::ChildSucceeded);
                self.scope.merge_from(scope);
                Status::Done
            }
            Outcome::Failed(reason) => {
                self.transition(SupervisorState::ChildFailed);
                if let TerminationReason::Signaled(_) = reason {
                    warn!(%reason, "Evaluation child crashed");
                }
                self.hooks.run_failure(&mut self.scope);
                Status::Failed
            }
            Outcome::Cancelled => {
                self.transition(SupervisorState::ChildCancelled);
                Status::Cancelled
            }
            Outcome::Exited(code) => {
                self.transition(SupervisorState::ChildExited);
                info!(code, "Evaluated code requested exit");
                return Status::Exited;
            }
        };
        self.transition(SupervisorState::Idle);
        status
    }

    /// Completion candidates for `word`.
    ///
    /// `$name` prefixes complete against the scope, anything else against the
    /// evaluator's symbol table.
    pub fn complete(&self, word: &str) -> Vec<String> {
        if word.starts_with('$') {
            return self.scope.completions(word);
        }
        let mut candidates: Vec<String> = self
            .evaluator
            .symbols()
            .into_iter()
            .filter(|symbol| symbol.starts_with(word))
            .collect();
        candidates.sort();
        candidates.dedup();
        candidates
    }
}

fn write_report(fd: BorrowedFd<'_>, report: &ChildReport) -> Result<()> {
    let bytes = report.to_bytes()?;
    write_all_fd(fd, &bytes)?;
    Ok(())
}
