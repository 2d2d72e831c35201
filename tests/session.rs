//! End-to-end session tests: driver, channel, worker loop and forked
//! evaluation children, with a tiny arithmetic evaluator instead of PHP.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Seek};
use std::os::unix::io::OwnedFd;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use phork::cancel::CancelToken;
use phork::eval::{Completion, EvalError, Evaluator};
use phork::inspect::InspectorKind;
use phork::repl::{DriverExit, Line, LineSource, ReplDriver, SharedChannel};
use phork::value::{Scope, Value};
use phork::worker::{Hooks, Status, Supervisor, WorkerExit, WorkerLoop, channel_pair};
use serial_test::serial;

/// Integer sums over literals and variables.
///
/// `$x = <expr>`, `<expr>`, `sleep()`, `exit()` and `fork()`; a leading
/// `return` is ignored. Unknown variables raise.
struct Calc;

impl Calc {
    fn sum(expr: &str, scope: &Scope) -> Result<Value, EvalError> {
        let mut total = 0;
        for term in expr.split('+') {
            let term = term.trim_matches(|c: char| c.is_whitespace() || c == '(' || c == ')');
            let n = match term.strip_prefix('$') {
                Some(name) => match scope.get(name) {
                    Some(Value::Int(n)) => *n,
                    _ => return Err(EvalError::Raised(format!("Undefined variable ${name}"))),
                },
                None => term
                    .parse()
                    .map_err(|_| EvalError::Raised(format!("syntax error near '{term}'")))?,
            };
            total += n;
        }
        Ok(Value::Int(total))
    }
}

impl Evaluator for Calc {
    fn evaluate(&self, code: &str, scope: &mut Scope) -> Result<Completion, EvalError> {
        let code = code.trim().trim_end_matches(';').trim();
        let body = code.strip_prefix("return").unwrap_or(code).trim();

        match body {
            "sleep()" => {
                thread::sleep(Duration::from_secs(30));
                Ok(Completion::Completed)
            }
            "exit()" => Ok(Completion::Exited(0)),
            "fork()" => {
                // SAFETY: both copies return straight to the supervisor.
                let _ = unsafe { nix::unistd::fork() };
                Ok(Completion::Returned(Value::Int(1)))
            }
            _ => match body.split_once('=') {
                Some((name, expr)) => {
                    let value = Self::sum(expr, scope)?;
                    scope.set(name.trim().trim_start_matches('$'), value.clone());
                    Ok(Completion::Returned(value))
                }
                None => Ok(Completion::Returned(Self::sum(body, scope)?)),
            },
        }
    }

    fn symbols(&self) -> Vec<String> {
        vec!["calc_sum".into(), "calc_max".into(), "print".into()]
    }
}

/// Replays a fixed list of lines and records what the driver did with them.
#[derive(Default)]
struct ScriptedLines {
    lines: VecDeque<Line>,
    prompts: Vec<String>,
    history: Vec<String>,
    saves: usize,
}

impl ScriptedLines {
    fn new(lines: &[&str]) -> Self {
        Self {
            lines: lines.iter().map(|l| Line::Text(l.to_string())).collect(),
            ..Self::default()
        }
    }

    fn with(lines: Vec<Line>) -> Self {
        Self {
            lines: lines.into(),
            ..Self::default()
        }
    }
}

impl LineSource for ScriptedLines {
    fn read_line(&mut self, prompt: &str) -> phork::Result<Line> {
        self.prompts.push(prompt.to_string());
        Ok(self.lines.pop_front().unwrap_or(Line::Eof))
    }

    fn add_history(&mut self, line: &str) {
        self.history.push(line.to_string());
    }

    fn save_history(&mut self) {
        self.saves += 1;
    }
}

/// A worker loop running on a thread, plus the front-end's view of it.
struct Harness {
    channel: SharedChannel,
    worker: JoinHandle<phork::Result<WorkerExit>>,
    display: File,
    failures: Arc<AtomicUsize>,
    cancel: CancelToken,
    shutdown: CancelToken,
}

impl Harness {
    fn start() -> Self {
        let (mut front, back) = channel_pair().unwrap();
        let display = tempfile::tempfile().unwrap();
        let failures = Arc::new(AtomicUsize::new(0));
        let cancel = CancelToken::new();

        let counter = Arc::clone(&failures);
        let mut hooks = Hooks::new();
        hooks.on_failure(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let supervisor = Supervisor::new(Box::new(Calc), InspectorKind::Dump.build())
            .unwrap()
            .with_display(OwnedFd::from(display.try_clone().unwrap()))
            .with_hooks(hooks)
            .with_cancel_token(cancel.clone());
        let mut worker_loop = WorkerLoop::new(back, supervisor);
        let shutdown = worker_loop.shutdown_token();
        let worker = thread::spawn(move || worker_loop.run());

        front.wait_ready().unwrap();
        Self {
            channel: Rc::new(RefCell::new(front)),
            worker,
            display,
            failures,
            cancel,
            shutdown,
        }
    }

    fn driver(&self, source: ScriptedLines) -> ReplDriver<ScriptedLines> {
        ReplDriver::new(source, Rc::clone(&self.channel), "> ")
    }

    fn eval(&self, statement: &str) -> Status {
        self.channel.borrow_mut().eval(statement).unwrap()
    }

    fn complete(&self, word: &str) -> Vec<String> {
        self.channel.borrow_mut().complete(word).unwrap()
    }

    fn displayed(&mut self) -> String {
        let mut text = String::new();
        self.display.rewind().unwrap();
        self.display.read_to_string(&mut text).unwrap();
        text
    }

    fn shutdown(self) -> WorkerExit {
        let status = self.channel.borrow_mut().shutdown().unwrap();
        assert_eq!(status, Status::Exited);
        self.worker.join().unwrap().unwrap()
    }
}

#[test]
#[serial]
fn test_statements_share_scope_and_show_last_value() {
    let mut harness = Harness::start();
    let mut driver = harness.driver(ScriptedLines::new(&["$a = 1; $a + 1;"]));

    assert_eq!(driver.run().unwrap(), DriverExit::EndOfInput);
    assert_eq!(harness.displayed(), " → int(2)\n");
    assert_eq!(driver.source().history, vec!["$a = 1; $a + 1;"]);
    assert_eq!(driver.source().saves, 1);

    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_prompt_counts_batches_and_marks_continuation() {
    let mut harness = Harness::start();
    let mut driver = harness.driver(ScriptedLines::new(&["$a = (1", "+ 2);"]));

    driver.run().unwrap();
    assert_eq!(driver.source().prompts, vec!["[1] > ", "   *> ", "[2] > "]);
    assert_eq!(harness.displayed(), " → int(3)\n");
    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_failure_aborts_batch_and_runs_hooks_once() {
    let harness = Harness::start();
    let mut driver = harness.driver(ScriptedLines::default());

    // Feed lines directly so the worker can still be queried in between.
    driver.accept("$a = 1;").unwrap();
    driver.accept("$b = $nope + 1; $c = 3;").unwrap();
    assert_eq!(harness.failures.load(Ordering::SeqCst), 1);
    assert_eq!(harness.complete("$"), vec!["$a"]);

    // The next batch runs normally.
    driver.accept("$d = $a + 1;").unwrap();
    assert_eq!(harness.complete("$"), vec!["$a", "$d"]);
    assert_eq!(harness.failures.load(Ordering::SeqCst), 1);

    assert_eq!(harness.shutdown(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_failed_line_stays_in_history() {
    let mut harness = Harness::start();
    let lines = ["$a = 1;", "$b = $nope + 1; $c = 3;", "$d = $a + 1;"];
    let mut driver = harness.driver(ScriptedLines::new(&lines));

    assert_eq!(driver.run().unwrap(), DriverExit::EndOfInput);
    assert_eq!(driver.source().history, lines);
    assert_eq!(harness.failures.load(Ordering::SeqCst), 1);
    // The failed batch showed nothing; the batches around it did.
    assert_eq!(harness.displayed(), " → int(1)\n → int(2)\n");
    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_cancel_kills_child_and_keeps_scope() {
    let mut harness = Harness::start();
    assert_eq!(harness.eval("$a = 5;"), Status::Done);

    let token = harness.cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        token.cancel();
    });

    let started = Instant::now();
    assert_eq!(harness.eval("sleep();"), Status::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    canceller.join().unwrap();

    assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
    assert_eq!(harness.eval("return $a + 1;"), Status::Done);
    assert_eq!(harness.displayed(), " → int(6)\n");
    assert_eq!(harness.shutdown(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_shutdown_signal_stops_running_statement() {
    let harness = Harness::start();
    let shutdown = harness.shutdown.clone();
    let stopper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(200));
        shutdown.cancel();
    });

    let started = Instant::now();
    assert_eq!(harness.eval("sleep();"), Status::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(10));
    stopper.join().unwrap();

    assert_eq!(harness.failures.load(Ordering::SeqCst), 0);
    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Terminated);
}

#[test]
#[serial]
fn test_exit_ends_session() {
    let harness = Harness::start();
    let mut driver = harness.driver(ScriptedLines::new(&["exit();", "$never = 1;"]));

    assert_eq!(driver.run().unwrap(), DriverExit::Exited);
    assert_eq!(driver.source().saves, 1);
    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_interrupt_clears_pending_input() {
    let mut harness = Harness::start();
    let mut driver = harness.driver(ScriptedLines::with(vec![
        Line::Text("$x = (1".into()),
        Line::Interrupted,
        Line::Text("$y = 2;".into()),
    ]));

    assert_eq!(driver.run().unwrap(), DriverExit::EndOfInput);
    // The half-typed assignment never reached the worker.
    assert_eq!(harness.displayed(), " → int(2)\n");
    assert_eq!(
        driver.source().prompts,
        vec!["[1] > ", "   *> ", "[1] > ", "[2] > "]
    );
    assert_eq!(harness.worker.join().unwrap().unwrap(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_forked_copy_of_child_stays_silent() {
    let mut harness = Harness::start();
    assert_eq!(harness.eval("return fork();"), Status::Done);

    thread::sleep(Duration::from_millis(200));
    assert_eq!(harness.displayed(), " → int(1)\n");
    assert_eq!(harness.shutdown(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_completion_of_variables_and_symbols() {
    let harness = Harness::start();
    assert_eq!(harness.eval("$alpha = 1;"), Status::Done);
    assert_eq!(harness.eval("$alps = 2;"), Status::Done);
    assert_eq!(harness.eval("$beta = 3;"), Status::Done);

    assert_eq!(harness.complete("$al"), vec!["$alpha", "$alps"]);
    assert_eq!(harness.complete("calc_"), vec!["calc_max", "calc_sum"]);
    assert!(harness.complete("zzz").is_empty());
    assert_eq!(harness.shutdown(), WorkerExit::Exited);
}

#[test]
#[serial]
fn test_worker_stops_when_frontend_goes_away() {
    let harness = Harness::start();
    let Harness {
        channel, worker, ..
    } = harness;
    drop(channel);
    assert_eq!(worker.join().unwrap().unwrap(), WorkerExit::FrontendGone);
}
