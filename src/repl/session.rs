//! Wiring for an interactive session: evaluator, worker, line editor.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use signal_hook::consts::SIGINT;
use tracing::{debug, info, warn};

use super::line::EditorSource;
use super::{DriverExit, ReplDriver};
use crate::cancel::CancelToken;
use crate::config::SessionConfig;
use crate::error::Result;
use crate::eval::PhpEvaluator;
use crate::worker::{Hooks, Supervisor, spawn_worker};

/// How long the worker gets to exit after the session ends.
const WORKER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

/// Run an interactive session until end of input or until code exits.
pub fn run_session(config: &SessionConfig) -> Result<DriverExit> {
    let evaluator = PhpEvaluator::new(config.php.clone());
    let version = evaluator.check()?;
    info!(php = %evaluator.binary().display(), %version, "Using PHP");

    let mut config = config.clone();
    let startup_files = config.startup_files();
    debug!(files = ?startup_files, "Startup files");

    let mut hooks = Hooks::new();
    hooks.require_files(startup_files);

    let supervisor =
        Supervisor::new(Box::new(evaluator), config.inspector.build())?.with_hooks(hooks);

    // Fork before anything else in the front-end can start a thread.
    let (mut worker, channel) = spawn_worker(supervisor)?;

    // Ctrl-C while a statement runs belongs to the worker; the front-end
    // only has to survive it.
    let interrupt = CancelToken::new();
    if let Err(e) = interrupt.bind_signal(SIGINT) {
        warn!(error = %e, "Failed to install SIGINT handler");
    }

    let channel = Rc::new(RefCell::new(channel));
    channel.borrow_mut().wait_ready()?;
    debug!(pid = %worker.pid(), "Worker ready");

    let source = EditorSource::new(Rc::clone(&channel), config.history_path.clone())?;
    let mut driver =
        ReplDriver::new(source, channel, config.prompt.clone()).with_interrupt(interrupt);
    let exit = driver.run();

    if let Err(e) = worker.stop(WORKER_STOP_TIMEOUT) {
        warn!(error = %e, "Failed to stop worker");
    }
    exit
}
