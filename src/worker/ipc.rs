//! Buffered IPC primitives for the evaluation channel.
//!
//! Provides framed I/O over a Unix socket pair with EINTR handling and a
//! bounded wait so loops can interleave cancellation checks with reads.

use std::io::{self, BufReader, BufWriter, Read, Write};
use std::os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd, RawFd};
use std::os::unix::net::UnixStream;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{PollFd, PollFlags, PollTimeout, poll};
use tracing::trace;

use super::protocol::{Request, Status, decode_len, encode_len};
use crate::error::{ReplError, Result};

/// Default buffer size for IPC (64KB).
const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// A file descriptor wrapper that implements Read/Write with EINTR handling.
pub struct PipeFd {
    fd: OwnedFd,
}

impl PipeFd {
    /// Create from an owned file descriptor.
    pub fn new(fd: OwnedFd) -> Self {
        Self { fd }
    }

    /// Duplicate the descriptor.
    pub fn try_clone(&self) -> io::Result<Self> {
        Ok(Self::new(self.fd.try_clone()?))
    }
}

impl AsFd for PipeFd {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl AsRawFd for PipeFd {
    fn as_raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }
}

impl Read for PipeFd {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::read(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }
}

impl Write for PipeFd {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        loop {
            match nix::unistd::write(&self.fd, buf) {
                Ok(n) => return Ok(n),
                Err(Errno::EINTR) => continue,
                Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write all of `buf` to a borrowed descriptor without buffering or locks.
///
/// Safe to call in a freshly forked child of a multi-threaded process.
pub fn write_all_fd(fd: BorrowedFd<'_>, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match nix::unistd::write(fd, buf) {
            Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
            Ok(n) => buf = &buf[n..],
            Err(Errno::EINTR) => continue,
            Err(e) => return Err(io::Error::from_raw_os_error(e as i32)),
        }
    }
    Ok(())
}

/// Wait up to `timeout` for `fd` to become readable (or hung up).
///
/// An interrupted wait reports "not readable" so the caller can re-check
/// its flags.
pub fn wait_readable(fd: BorrowedFd<'_>, timeout: Duration) -> io::Result<bool> {
    let millis = u16::try_from(timeout.as_millis()).unwrap_or(u16::MAX);
    let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
    match poll(&mut fds, PollTimeout::from(millis)) {
        Ok(ready) => Ok(ready > 0),
        Err(Errno::EINTR) => Ok(false),
        Err(e) => Err(io::Error::from_raw_os_error(e as i32)),
    }
}

/// One end of the socket pair, split into a buffered reader and writer.
struct Conn {
    reader: BufReader<PipeFd>,
    writer: BufWriter<PipeFd>,
}

impl Conn {
    fn new(stream: UnixStream) -> Result<Self> {
        let read = PipeFd::new(OwnedFd::from(stream));
        let write = read
            .try_clone()
            .map_err(|e| ReplError::Channel(format!("Failed to duplicate socket: {e}")))?;
        Ok(Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, read),
            writer: BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, write),
        })
    }

    fn poll(&self, timeout: Duration) -> Result<bool> {
        if !self.reader.buffer().is_empty() {
            return Ok(true);
        }
        wait_readable(self.reader.get_ref().as_fd(), timeout)
            .map_err(|e| ReplError::Channel(format!("Failed to poll channel: {e}")))
    }

    /// Read one byte; `None` on EOF.
    fn read_byte(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte) {
            Ok(0) => Ok(None),
            Ok(_) => Ok(Some(byte[0])),
            Err(e) => Err(ReplError::Channel(format!("Failed to read from channel: {e}"))),
        }
    }

    fn read_payload(&mut self) -> Result<Vec<u8>> {
        let mut len = [0u8; 4];
        self.read_exact(&mut len)?;
        let mut payload = vec![0u8; decode_len(len)?];
        self.read_exact(&mut payload)?;
        Ok(payload)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.reader
            .read_exact(buf)
            .map_err(|e| ReplError::Channel(format!("Truncated frame: {e}")))
    }

    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.writer
            .write_all(bytes)
            .and_then(|()| self.writer.flush())
            .map_err(|e| ReplError::Channel(format!("Failed to write to channel: {e}")))
    }
}

/// Create the connected pair of channel ends.
pub fn channel_pair() -> Result<(FrontendChannel, WorkerChannel)> {
    let (front, back) = UnixStream::pair()
        .map_err(|e| ReplError::Channel(format!("Failed to create socket pair: {e}")))?;
    Ok((
        FrontendChannel {
            conn: Conn::new(front)?,
        },
        WorkerChannel {
            conn: Conn::new(back)?,
        },
    ))
}

/// The front-end's end of the evaluation channel.
pub struct FrontendChannel {
    conn: Conn,
}

impl FrontendChannel {
    fn send(&mut self, request: &Request) -> Result<()> {
        trace!(tag = request.tag(), "Sending request");
        self.conn.send(&request.encode())
    }

    /// Block until the worker sends a status byte.
    pub fn read_status(&mut self) -> Result<Status> {
        match self.conn.read_byte()? {
            Some(byte) => Status::from_byte(byte),
            None => Err(ReplError::Channel("Worker closed the channel".into())),
        }
    }

    /// Consume the READY byte sent once after worker startup.
    pub fn wait_ready(&mut self) -> Result<()> {
        match self.read_status()? {
            Status::Ready => Ok(()),
            other => Err(ReplError::Protocol(format!(
                "expected READY from worker, got {other:?}"
            ))),
        }
    }

    /// Submit one statement and wait for its status.
    pub fn eval(&mut self, statement: &str) -> Result<Status> {
        self.send(&Request::Eval(statement.to_string()))?;
        match self.read_status()? {
            status @ (Status::Done | Status::Exited | Status::Failed | Status::Cancelled) => {
                Ok(status)
            }
            other => Err(ReplError::Protocol(format!(
                "unexpected reply {other:?} to EVAL"
            ))),
        }
    }

    /// Ask the worker for completion candidates.
    pub fn complete(&mut self, word: &str) -> Result<Vec<String>> {
        self.send(&Request::Complete(word.to_string()))?;
        match self.read_status()? {
            Status::Candidates => {
                let payload = self.conn.read_payload()?;
                Ok(serde_json::from_slice(&payload)?)
            }
            other => Err(ReplError::Protocol(format!(
                "unexpected reply {other:?} to COMPLETE"
            ))),
        }
    }

    /// Ask the worker to stop; it answers with EXITED.
    pub fn shutdown(&mut self) -> Result<Status> {
        self.send(&Request::Shutdown)?;
        self.read_status()
    }
}

/// What the worker found on the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Request(Request),
    /// The front-end closed its end.
    Closed,
}

/// The worker's end of the evaluation channel.
pub struct WorkerChannel {
    conn: Conn,
}

impl WorkerChannel {
    /// Wait up to `timeout` for the next request.
    ///
    /// Returns `None` when nothing arrived in time.
    pub fn poll_request(&mut self, timeout: Duration) -> Result<Option<Incoming>> {
        if !self.conn.poll(timeout)? {
            return Ok(None);
        }
        let Some(tag) = self.conn.read_byte()? else {
            return Ok(Some(Incoming::Closed));
        };
        let payload = self.conn.read_payload()?;
        let request = Request::from_parts(tag, payload)?;
        trace!(?request, "Received request");
        Ok(Some(Incoming::Request(request)))
    }

    pub fn send_status(&mut self, status: Status) -> Result<()> {
        trace!(?status, "Sending status");
        self.conn.send(&[status.as_byte()])
    }

    pub fn send_candidates(&mut self, candidates: &[String]) -> Result<()> {
        let payload = serde_json::to_vec(candidates)?;
        let mut frame = Vec::with_capacity(5 + payload.len());
        frame.push(Status::Candidates.as_byte());
        frame.extend_from_slice(&encode_len(payload.len()));
        frame.extend_from_slice(&payload);
        self.conn.send(&frame)
    }
}
