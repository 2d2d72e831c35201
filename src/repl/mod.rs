//! The interactive front-end.
//!
//! [`ReplDriver`] accumulates input lines until the chunker reports complete
//! statements, then sends them to the worker one at a time. It never
//! evaluates anything itself.

pub mod line;
pub mod session;

use std::io::Write;

use tracing::{debug, trace};

use crate::cancel::CancelToken;
use crate::chunker::{Scan, StatementChunker};
use crate::error::{ReplError, Result};
use crate::theme::Themed;
use crate::worker::Status;

pub use line::{EditorSource, Line, LineSource, SharedChannel};
pub use session::run_session;

/// Continuation marker shown while a statement is still open.
const CONTINUATION: &str = "*> ";

/// Why the driver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverExit {
    /// End of input (Ctrl-D); the worker was asked to shut down.
    EndOfInput,
    /// Evaluated code exited the worker.
    Exited,
}

/// Reads lines, chunks them into statements and flushes them to the worker.
pub struct ReplDriver<S: LineSource> {
    source: S,
    channel: SharedChannel,
    chunker: StatementChunker,
    buffer: String,
    lineno: usize,
    prompt: String,
    interrupt: CancelToken,
}

impl<S: LineSource> ReplDriver<S> {
    pub fn new(source: S, channel: SharedChannel, prompt: impl Into<String>) -> Self {
        Self {
            source,
            channel,
            chunker: StatementChunker::new(),
            buffer: String::new(),
            lineno: 1,
            prompt: prompt.into(),
            interrupt: CancelToken::new(),
        }
    }

    /// Token raised by SIGINT while the front-end is not at the prompt.
    pub fn with_interrupt(mut self, interrupt: CancelToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Input that has not formed a complete statement yet.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Number of the next statement batch, as shown in the prompt.
    pub fn lineno(&self) -> usize {
        self.lineno
    }

    /// `[n] > ` for a fresh statement; a right-aligned `*> ` of the same
    /// width while the buffer holds an unfinished one.
    pub fn prompt_line(&self) -> String {
        let head = format!("[{}] {}", self.lineno, self.prompt);
        if self.buffer.is_empty() {
            head
        } else {
            let width = head.chars().count();
            format!("{CONTINUATION:>width$}")
        }
    }

    /// Run until end of input or until evaluated code exits.
    pub fn run(&mut self) -> Result<DriverExit> {
        loop {
            // An interrupt that arrived while a statement ran has been handled
            // by the worker already.
            self.interrupt.reset();

            match self.source.read_line(&self.prompt_line())? {
                Line::Interrupted => {
                    trace!("Interrupted at prompt, clearing buffer");
                    self.buffer.clear();
                }
                Line::Eof => {
                    debug!("End of input, shutting down worker");
                    self.channel.borrow_mut().shutdown()?;
                    self.source.save_history();
                    return Ok(DriverExit::EndOfInput);
                }
                Line::Text(line) => {
                    if !line.trim().is_empty() {
                        self.source.add_history(&line);
                    }
                    if let Some(exit) = self.accept(&line)? {
                        return Ok(exit);
                    }
                }
            }
        }
    }

    /// Add one line to the buffer and flush any complete statements.
    pub fn accept(&mut self, line: &str) -> Result<Option<DriverExit>> {
        self.buffer.push_str(line);
        self.buffer.push('\n');

        if self.buffer.trim().is_empty() {
            self.buffer.clear();
            return Ok(None);
        }

        let Scan::Complete(statements) = self.chunker.scan(&self.buffer) else {
            return Ok(None);
        };
        self.buffer.clear();
        self.lineno += 1;
        self.flush(statements)
    }

    /// Send statements in order, stopping at the first one that did not
    /// succeed.
    fn flush(&mut self, statements: Vec<String>) -> Result<Option<DriverExit>> {
        for statement in statements {
            trace!(%statement, "Flushing statement");
            let status = self.channel.borrow_mut().eval(&statement)?;
            match status {
                Status::Done => {}
                Status::Exited => {
                    self.source.save_history();
                    return Ok(Some(DriverExit::Exited));
                }
                Status::Failed => break,
                Status::Cancelled => {
                    let mut stderr = std::io::stderr();
                    let _ = writeln!(stderr, "{}", "Cancelled.".warning());
                    break;
                }
                other => {
                    return Err(ReplError::Protocol(format!(
                        "unexpected status {other:?} after EVAL"
                    )));
                }
            }
        }
        Ok(None)
    }
}
