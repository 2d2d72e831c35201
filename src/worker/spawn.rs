//! Worker process spawning.
//!
//! The worker is a plain `fork()` of the front-end: the evaluator, hooks and
//! inspector it needs are already built, so nothing has to be re-exec'd or
//! serialized across.

use nix::unistd::{ForkResult, fork};
use tracing::debug;

use super::ipc::{FrontendChannel, channel_pair};
use super::proc::Proc;
use super::supervisor::Supervisor;
use super::worker_main::run_worker_main;
use crate::error::{ReplError, Result};

/// Fork the worker process and return the front-end's handles to it.
///
/// Call before the front-end starts any threads.
pub fn spawn_worker(supervisor: Supervisor) -> Result<(Proc, FrontendChannel)> {
    let (front, back) = channel_pair()?;

    // SAFETY: the child goes straight into the worker loop and leaves through
    // `process::exit`.
    match unsafe { fork() } {
        Err(e) => Err(ReplError::Fork(e)),
        Ok(ForkResult::Child) => {
            drop(front);
            run_worker_main(back, supervisor)
        }
        Ok(ForkResult::Parent { child }) => {
            drop(back);
            drop(supervisor);
            debug!(pid = %child, "Spawned worker");
            Ok((Proc::new(child), front))
        }
    }
}
