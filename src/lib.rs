//! phork - a forking PHP REPL
//!
//! Input typed at the prompt is split into complete statements by the
//! [`chunker`]. Each statement is sent over a socket to a long-lived
//! [`worker`] process, which forks a disposable child to evaluate it. A
//! fatal error, crash or `exit()` in user code only ends that child; the
//! variables defined by earlier statements survive.

pub mod cancel;
pub mod chunker;
pub mod cli;
pub mod config;
pub mod error;
pub mod eval;
pub mod inspect;
pub mod logging;
pub mod paths;
pub mod repl;
pub mod theme;
pub mod value;
pub mod worker;

pub use chunker::{Scan, StatementChunker};
pub use error::{ReplError, Result};
