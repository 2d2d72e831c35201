//! Line input for the REPL driver.
//!
//! [`EditorSource`] reads from the terminal with rustyline; tests drive the
//! driver with their own [`LineSource`].

use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};
use tracing::{debug, warn};

use crate::error::Result;
use crate::worker::FrontendChannel;

/// The front-end's channel, shared between the driver and tab completion.
pub type SharedChannel = Rc<RefCell<FrontendChannel>>;

/// One read from a [`LineSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Text(String),
    /// Ctrl-C at the prompt.
    Interrupted,
    /// Ctrl-D or end of input.
    Eof,
}

/// Where the driver gets its input from.
pub trait LineSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line>;

    fn add_history(&mut self, _line: &str) {}

    /// Persist history, if this source keeps any.
    fn save_history(&mut self) {}
}

/// Terminal input with history and tab completion.
pub struct EditorSource {
    editor: Editor<CompletionHelper, DefaultHistory>,
    history_path: Option<PathBuf>,
}

impl EditorSource {
    pub fn new(channel: SharedChannel, history_path: Option<PathBuf>) -> Result<Self> {
        let mut editor: Editor<CompletionHelper, DefaultHistory> = Editor::new()?;
        editor.set_helper(Some(CompletionHelper { channel }));

        if let Some(ref path) = history_path
            && let Err(e) = editor.load_history(path)
        {
            // Missing history is normal on first run.
            let is_not_found = matches!(&e, ReadlineError::Io(io_err) if io_err.kind() == std::io::ErrorKind::NotFound);
            if is_not_found {
                debug!(path = %path.display(), "No history file yet");
            } else {
                warn!(path = %path.display(), error = %e, "Failed to load history");
            }
        }

        Ok(Self {
            editor,
            history_path,
        })
    }
}

impl LineSource for EditorSource {
    fn read_line(&mut self, prompt: &str) -> Result<Line> {
        match self.editor.readline(prompt) {
            Ok(line) => Ok(Line::Text(line)),
            Err(ReadlineError::Interrupted) => Ok(Line::Interrupted),
            Err(ReadlineError::Eof) => Ok(Line::Eof),
            Err(e) => Err(e.into()),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            warn!(error = %e, "Failed to add history entry");
        }
    }

    fn save_history(&mut self) {
        let Some(ref path) = self.history_path else {
            return;
        };
        if let Some(parent) = path.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!(error = %e, "Failed to create history directory");
            return;
        }
        if let Err(e) = self.editor.save_history(path) {
            warn!(path = %path.display(), error = %e, "Failed to save history");
        }
    }
}

/// Tab completion backed by the worker's scope and symbol table.
pub struct CompletionHelper {
    channel: SharedChannel,
}

impl Completer for CompletionHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        let (start, word) = word_before(line, pos);
        if word.is_empty() {
            return Ok((pos, Vec::new()));
        }
        // Completion is only ever requested while the driver waits on input,
        // so the channel is free; stay quiet rather than panic if it is not.
        let Ok(mut channel) = self.channel.try_borrow_mut() else {
            return Ok((pos, Vec::new()));
        };
        match channel.complete(word) {
            Ok(candidates) => Ok((start, candidates)),
            Err(e) => {
                debug!(error = %e, "Completion request failed");
                Ok((pos, Vec::new()))
            }
        }
    }
}

impl Hinter for CompletionHelper {
    type Hint = String;
}

impl Highlighter for CompletionHelper {}

impl Validator for CompletionHelper {}

impl Helper for CompletionHelper {}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '\\')
}

/// The identifier-ish word ending at `pos`, and where it starts.
pub fn word_before(line: &str, pos: usize) -> (usize, &str) {
    let head = &line[..pos];
    let start = head
        .char_indices()
        .rev()
        .take_while(|&(_, c)| is_word_char(c))
        .last()
        .map_or(pos, |(i, _)| i);
    (start, &head[start..])
}
