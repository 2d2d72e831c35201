//! Startup and failure hooks run by the worker.
//!
//! Startup hooks run once, before the worker reports READY. Failure hooks run
//! after every statement that failed (never after a cancelled one).

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::eval::{EvalError, Evaluator};
use crate::value::Scope;

/// Runs once against the initial scope.
pub type StartupHook = Box<dyn FnMut(&dyn Evaluator, &mut Scope) -> Result<(), EvalError> + Send>;

/// Runs after a statement fails.
pub type FailureHook = Box<dyn FnMut(&mut Scope) + Send>;

/// Registered hooks, run in registration order.
#[derive(Default)]
pub struct Hooks {
    startup: Vec<StartupHook>,
    failure: Vec<FailureHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&dyn Evaluator, &mut Scope) -> Result<(), EvalError> + Send + 'static,
    {
        self.startup.push(Box::new(hook));
        self
    }

    pub fn on_failure<F>(&mut self, hook: F) -> &mut Self
    where
        F: FnMut(&mut Scope) + Send + 'static,
    {
        self.failure.push(Box::new(hook));
        self
    }

    /// Register a startup hook that `require`s each file into the scope.
    pub fn require_files(&mut self, files: Vec<PathBuf>) -> &mut Self {
        if files.is_empty() {
            return self;
        }
        self.on_start(move |evaluator, scope| {
            for file in &files {
                debug!(file = %file.display(), "Loading startup file");
                evaluator.evaluate(&require_statement(file), scope)?;
            }
            Ok(())
        })
    }

    /// Run startup hooks in the worker process.
    ///
    /// A failing hook is logged and does not stop the others.
    pub fn run_startup(&mut self, evaluator: &dyn Evaluator, scope: &mut Scope) -> usize {
        let mut failed = 0;
        for hook in &mut self.startup {
            if let Err(e) = hook(evaluator, scope) {
                warn!(error = %e, "Startup hook failed");
                failed += 1;
            }
        }
        failed
    }

    pub fn run_failure(&mut self, scope: &mut Scope) {
        for hook in &mut self.failure {
            hook(scope);
        }
    }

    pub fn startup_len(&self) -> usize {
        self.startup.len()
    }

    pub fn failure_len(&self) -> usize {
        self.failure.len()
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("startup", &self.startup.len())
            .field("failure", &self.failure.len())
            .finish()
    }
}

/// `require '<path>';` with the path single-quoted.
fn require_statement(path: &Path) -> String {
    let escaped = path
        .to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "\\'");
    format!("require '{escaped}';")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Completion;
    use crate::value::Value;
    use std::sync::{Arc, Mutex};

    /// Records every statement it is asked to evaluate.
    #[derive(Default)]
    struct Recorder {
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Evaluator for Recorder {
        fn evaluate(&self, code: &str, _scope: &mut Scope) -> Result<Completion, EvalError> {
            self.seen.lock().unwrap().push(code.to_string());
            if code.contains("broken") {
                return Err(EvalError::Raised("broken file".into()));
            }
            Ok(Completion::Completed)
        }
    }

    #[test]
    fn test_require_statement_escapes_quotes() {
        assert_eq!(
            require_statement(Path::new("/tmp/it's.php")),
            r"require '/tmp/it\'s.php';"
        );
    }

    #[test]
    fn test_startup_hooks_run_in_order() {
        let recorder = Recorder::default();
        let mut hooks = Hooks::new();
        hooks
            .on_start(|_, scope| {
                scope.set("first", Value::Int(1));
                Ok(())
            })
            .require_files(vec![PathBuf::from("/etc/phork/a.php")]);

        let mut scope = Scope::new();
        assert_eq!(hooks.run_startup(&recorder, &mut scope), 0);
        assert_eq!(scope.get("first"), Some(&Value::Int(1)));
        assert_eq!(
            *recorder.seen.lock().unwrap(),
            vec!["require '/etc/phork/a.php';"]
        );
    }

    #[test]
    fn test_failing_startup_hook_does_not_stop_others() {
        let recorder = Recorder::default();
        let mut hooks = Hooks::new();
        hooks.require_files(vec![PathBuf::from("broken.php")]);
        hooks.on_start(|_, scope| {
            scope.set("after", Value::Bool(true));
            Ok(())
        });

        let mut scope = Scope::new();
        assert_eq!(hooks.run_startup(&recorder, &mut scope), 1);
        assert_eq!(scope.get("after"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_failure_hooks() {
        let mut hooks = Hooks::new();
        hooks.on_failure(|scope| scope.set("failed", Value::Bool(true)));
        assert_eq!(hooks.failure_len(), 1);
        assert_eq!(hooks.startup_len(), 0);

        let mut scope = Scope::new();
        hooks.run_failure(&mut scope);
        assert_eq!(scope.get("failed"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_empty_require_list_registers_nothing() {
        let mut hooks = Hooks::new();
        hooks.require_files(Vec::new());
        assert_eq!(hooks.startup_len(), 0);
    }
}
