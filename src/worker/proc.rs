//! Process handles for the worker and for evaluation children.

use std::io::Read;
use std::os::unix::io::AsFd;
use std::time::{Duration, Instant};

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;
use tracing::trace;

use super::ipc::{PipeFd, wait_readable};
use super::protocol::ChildReport;
use crate::error::{ReplError, Result};

/// Handle to a forked process that must be reaped.
pub struct Proc {
    /// Process ID
    pid: Pid,
    /// Whether the process has been reaped
    reaped: bool,
}

impl Proc {
    pub fn new(pid: Pid) -> Self {
        Self { pid, reaped: false }
    }

    /// Get the process ID.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Wait for the process to exit (blocking).
    pub fn wait(&mut self) -> Result<WaitStatus> {
        if self.reaped {
            return Err(ReplError::Process("Process already reaped".into()));
        }
        loop {
            match waitpid(self.pid, None) {
                Ok(status) => {
                    self.reaped = true;
                    return Ok(status);
                }
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(ReplError::Process(format!("waitpid failed: {}", e))),
            }
        }
    }

    /// Try to wait for the process (non-blocking).
    ///
    /// Returns `None` if the process is still running.
    pub fn try_wait(&mut self) -> Result<Option<WaitStatus>> {
        if self.reaped {
            return Err(ReplError::Process("Process already reaped".into()));
        }
        match waitpid(self.pid, Some(WaitPidFlag::WNOHANG)) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(status) => {
                self.reaped = true;
                Ok(Some(status))
            }
            Err(Errno::EINTR) => Ok(None),
            Err(e) => Err(ReplError::Process(format!("waitpid failed: {}", e))),
        }
    }

    fn signal(&self, sig: Signal) -> Result<()> {
        match signal::kill(self.pid, sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(e) => Err(ReplError::Process(format!("Failed to send {sig:?}: {e}"))),
        }
    }

    /// Send SIGTERM to the process.
    pub fn terminate(&self) -> Result<()> {
        if self.reaped {
            return Ok(());
        }
        self.signal(Signal::SIGTERM)
    }

    /// Send SIGKILL to the process and wait for it to exit.
    pub fn kill(&mut self) -> Result<Option<WaitStatus>> {
        if self.reaped {
            return Ok(None);
        }
        self.signal(Signal::SIGKILL)?;
        self.wait().map(Some)
    }

    /// Wait up to `timeout` for a voluntary exit, then SIGTERM, then SIGKILL.
    pub fn stop(&mut self, timeout: Duration) -> Result<()> {
        if self.reaped {
            return Ok(());
        }

        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(_)) = self.try_wait() {
                return Ok(());
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        let _ = self.terminate();
        std::thread::sleep(Duration::from_millis(100));
        if let Ok(Some(_)) = self.try_wait() {
            return Ok(());
        }

        self.kill().map(|_| ())
    }
}

impl Drop for Proc {
    fn drop(&mut self) {
        if !self.reaped {
            let _ = self.signal(Signal::SIGKILL);
            let _ = waitpid(self.pid, None);
            self.reaped = true;
        }
    }
}

/// The transient child evaluating one statement, plus its report pipe.
///
/// Created at fork time and dropped once the statement is settled; a handle
/// that is dropped early kills the child.
pub struct EvalChild {
    proc: Proc,
    report: Option<PipeFd>,
    buffer: Vec<u8>,
}

impl EvalChild {
    pub fn new(pid: Pid, report: PipeFd) -> Self {
        Self {
            proc: Proc::new(pid),
            report: Some(report),
            buffer: Vec::new(),
        }
    }

    pub fn pid(&self) -> Pid {
        self.proc.pid()
    }

    /// Wait up to `timeout` for report bytes and buffer whatever arrived.
    ///
    /// Once the pipe is closed this just sleeps, so a polling loop keeps
    /// its pace.
    pub fn pump_report(&mut self, timeout: Duration) -> Result<()> {
        let Some(pipe) = self.report.as_ref() else {
            std::thread::sleep(timeout);
            return Ok(());
        };
        if wait_readable(pipe.as_fd(), timeout)? {
            self.read_chunk()?;
        }
        Ok(())
    }

    /// Collect report bytes that are already available without blocking.
    ///
    /// A grandchild may still hold the write end, so this never waits for EOF.
    pub fn drain_report(&mut self) -> Result<()> {
        while let Some(pipe) = self.report.as_ref() {
            if !wait_readable(pipe.as_fd(), Duration::ZERO)? {
                break;
            }
            self.read_chunk()?;
        }
        Ok(())
    }

    fn read_chunk(&mut self) -> Result<()> {
        let Some(pipe) = self.report.as_mut() else {
            return Ok(());
        };
        let mut chunk = [0u8; 8192];
        let n = pipe.read(&mut chunk)?;
        if n == 0 {
            trace!(pid = %self.proc.pid(), bytes = self.buffer.len(), "Report pipe closed");
            self.report = None;
        } else {
            self.buffer.extend_from_slice(&chunk[..n]);
        }
        Ok(())
    }

    /// Parse the buffered report; `None` if the child wrote nothing.
    pub fn take_report(&mut self) -> Result<Option<ChildReport>> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let report = ChildReport::from_slice(&self.buffer)?;
        self.buffer.clear();
        Ok(Some(report))
    }

    pub fn try_wait(&mut self) -> Result<Option<WaitStatus>> {
        self.proc.try_wait()
    }

    /// SIGKILL the child and reap it.
    pub fn kill(&mut self) -> Result<()> {
        self.proc.kill().map(|_| ())
    }
}
