//! Worker process main loop.
//!
//! Runs in the forked worker. Waits for requests from the front-end, hands
//! statements to the [`Supervisor`] and answers with one status byte each.

use std::time::Duration;

use nix::sys::signal::{SigHandler, Signal, signal};
use signal_hook::consts::{SIGHUP, SIGINT, SIGTERM};
use tracing::{debug, error, info, warn};

use super::ipc::{Incoming, WorkerChannel};
use super::protocol::{Request, Status};
use super::supervisor::{DEFAULT_POLL_INTERVAL, Supervisor};
use crate::cancel::CancelToken;
use crate::error::Result;

/// Why the worker loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Evaluated code or the front-end asked to exit.
    Exited,
    /// The front-end closed the channel.
    FrontendGone,
    /// SIGTERM or SIGHUP.
    Terminated,
}

/// The request/response loop of the worker.
pub struct WorkerLoop {
    channel: WorkerChannel,
    supervisor: Supervisor,
    shutdown: CancelToken,
    poll_interval: Duration,
}

impl WorkerLoop {
    pub fn new(channel: WorkerChannel, supervisor: Supervisor) -> Self {
        let shutdown = CancelToken::new();
        Self {
            channel,
            supervisor: supervisor.with_shutdown_token(shutdown.clone()),
            shutdown,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    /// Token that stops the loop; a running evaluation child is killed.
    pub fn shutdown_token(&self) -> CancelToken {
        self.shutdown.clone()
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Run startup hooks, send READY, then serve requests until told to stop.
    pub fn run(&mut self) -> Result<WorkerExit> {
        self.supervisor.start();
        self.channel.send_status(Status::Ready)?;

        loop {
            if self.shutdown.is_cancelled() {
                info!("Worker received termination signal");
                return Ok(WorkerExit::Terminated);
            }

            let request = match self.channel.poll_request(self.poll_interval)? {
                None => continue,
                Some(Incoming::Closed) => {
                    debug!("Front-end closed the channel");
                    return Ok(WorkerExit::FrontendGone);
                }
                Some(Incoming::Request(request)) => request,
            };

            match request {
                Request::Eval(statement) => {
                    let status = self.supervisor.evaluate(&statement)?;
                    if self.shutdown.is_cancelled() {
                        // The front-end may have gone with the terminal.
                        let _ = self.channel.send_status(status);
                        continue;
                    }
                    self.channel.send_status(status)?;
                    if status == Status::Exited {
                        return Ok(WorkerExit::Exited);
                    }
                }
                Request::Complete(word) => {
                    let candidates = self.supervisor.complete(&word);
                    self.channel.send_candidates(&candidates)?;
                }
                Request::Shutdown => {
                    self.channel.send_status(Status::Exited)?;
                    return Ok(WorkerExit::Exited);
                }
            }
        }
    }
}

/// Run the worker process main function.
///
/// Never returns; the process exits with 0 after a clean stop and 1 on a
/// channel or system error.
pub fn run_worker_main(channel: WorkerChannel, supervisor: Supervisor) -> ! {
    // Ignore SIGPIPE - a vanished front-end shows up as a write error.
    // SAFETY: installs the ignore disposition, no handler code runs.
    unsafe {
        signal(Signal::SIGPIPE, SigHandler::SigIgn).ok();
    }

    let mut worker = WorkerLoop::new(channel, supervisor);
    let interrupt = worker.supervisor().cancel_token().clone();
    let shutdown = worker.shutdown_token();

    if let Err(e) = interrupt.bind_signal(SIGINT) {
        warn!(error = %e, "Failed to install SIGINT handler");
    }
    for sig in [SIGTERM, SIGHUP] {
        if let Err(e) = shutdown.bind_signal(sig) {
            warn!(error = %e, signal = sig, "Failed to install shutdown handler");
        }
    }

    match worker.run() {
        Ok(reason) => {
            debug!(?reason, "Worker stopped");
            std::process::exit(0)
        }
        Err(e) => {
            error!(error = %e, "Worker failed");
            std::process::exit(1)
        }
    }
}
