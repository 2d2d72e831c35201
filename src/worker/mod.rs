//! Evaluation worker and per-statement process supervision.
//!
//! The front-end never evaluates code. It forks one long-lived worker that
//! owns the scope, and the worker forks a disposable child for every
//! statement. A crash, fatal error or runaway loop only takes down that
//! child; the worker and the front-end survive.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────┐   EVAL / COMPLETE / SHUTDOWN   ┌──────────────────┐
//!   │    Front-end     │ ──────────────────────────────►│      Worker      │
//!   │   (ReplDriver)   │ ◄──────────────────────────────│   (Supervisor)   │
//!   └──────────────────┘    status byte (+ candidates)  └────────┬─────────┘
//!                                                                │ fork per
//!                                                                │ statement
//!                                                       ┌────────▼─────────┐
//!                                                       │ Evaluation child │
//!                                                       │   scope copy,    │
//!                                                       │  one statement   │
//!                                                       └──────────────────┘
//!                                                        report pipe ─► worker
//! ```
//!
//! # Features
//!
//! - **Isolation**: each statement runs in its own process
//! - **Scope transfer**: a successful child reports its scope back as JSON
//! - **Cancellation**: SIGINT, SIGTERM or SIGHUP in the worker kills the child
//! - **Failure hooks**: run in the worker after every failed statement

pub mod hooks;
pub mod ipc;
pub mod proc;
pub mod protocol;
pub mod signals;
pub mod spawn;
pub mod supervisor;
pub mod worker_main;

pub use hooks::Hooks;
pub use ipc::{FrontendChannel, WorkerChannel, channel_pair};
pub use proc::Proc;
pub use protocol::{Request, Status};
pub use spawn::spawn_worker;
pub use supervisor::{Supervisor, SupervisorState};
pub use worker_main::{WorkerExit, WorkerLoop, run_worker_main};
