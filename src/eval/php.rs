//! Evaluator backed by the `php` command line binary.
//!
//! Each evaluation runs a fresh interpreter with an embedded driver script.
//! The driver reads `{code, scope}` from a scratch file, replays the
//! declaration prelude, restores variables, evaluates the code and writes
//! `{value, vars}` back. A missing result means the code called `exit`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Completion, EvalError, Evaluator};
use crate::chunker::leading_word;
use crate::error::{ReplError, Result};
use crate::value::{Scope, Value};

/// Exit status the driver uses for uncaught throwables.
const DRIVER_FAILURE: i32 = 255;

/// Statements whose effect is a declaration that must be replayed.
const DECLARATION_KEYWORDS: &[&str] = &[
    "function",
    "class",
    "interface",
    "trait",
    "abstract",
    "final",
    "enum",
    "const",
    "use",
    "require",
    "require_once",
    "include",
    "include_once",
];

const DRIVER: &str = r#"
$__phork_in = json_decode(file_get_contents($argv[1]), true);
$__phork_out = $argv[2];

function __phork_decode($v) {
    switch ($v['type']) {
        case 'null':
        case 'opaque':
            return null;
        case 'array':
            $a = [];
            foreach ($v['value'] as $e) {
                $a[$e['key']] = __phork_decode($e['value']);
            }
            return $a;
        case 'object':
            $class = $v['value']['class'];
            $o = class_exists($class)
                ? (new ReflectionClass($class))->newInstanceWithoutConstructor()
                : new stdClass();
            foreach ($v['value']['properties'] as $p) {
                $o->{$p['name']} = __phork_decode($p['value']);
            }
            return $o;
        default:
            return $v['value'];
    }
}

function __phork_encode($v, $depth = 0) {
    if ($depth > 32) return ['type' => 'opaque', 'value' => '*RECURSION*'];
    if (is_null($v)) return ['type' => 'null'];
    if (is_bool($v)) return ['type' => 'bool', 'value' => $v];
    if (is_int($v)) return ['type' => 'int', 'value' => $v];
    if (is_float($v)) {
        return is_finite($v)
            ? ['type' => 'float', 'value' => $v]
            : ['type' => 'opaque', 'value' => var_export($v, true)];
    }
    if (is_string($v)) return ['type' => 'string', 'value' => $v];
    if (is_array($v)) {
        $entries = [];
        foreach ($v as $k => $x) {
            $entries[] = ['key' => $k, 'value' => __phork_encode($x, $depth + 1)];
        }
        return ['type' => 'array', 'value' => $entries];
    }
    if ($v instanceof Closure) return ['type' => 'opaque', 'value' => 'Closure'];
    if (is_object($v)) {
        $props = [];
        foreach (get_object_vars($v) as $k => $x) {
            $props[] = ['name' => (string) $k, 'value' => __phork_encode($x, $depth + 1)];
        }
        return ['type' => 'object', 'value' => ['class' => get_class($v), 'properties' => $props]];
    }
    return ['type' => 'opaque', 'value' => gettype($v)];
}

ob_start();
foreach ($__phork_in['scope']['prelude'] ?? [] as $__phork_decl) {
    try { eval($__phork_decl); } catch (Throwable $__phork_e) {}
}
ob_end_clean();

foreach ($__phork_in['scope']['vars'] ?? [] as $__phork_name => $__phork_value) {
    $$__phork_name = __phork_decode($__phork_value);
}
unset($__phork_name, $__phork_value, $__phork_decl, $__phork_e);

try {
    $__phork_result = eval($__phork_in['code']);
} catch (Throwable $__phork_e) {
    fwrite(STDERR, sprintf("PHP %s: %s in %s:%d\n", get_class($__phork_e),
        $__phork_e->getMessage(), $__phork_e->getFile(), $__phork_e->getLine()));
    exit(255);
}

$__phork_vars = [];
foreach (get_defined_vars() as $__phork_name => $__phork_value) {
    if (strncmp($__phork_name, '__phork', 7) === 0) continue;
    if (in_array($__phork_name, ['argv', 'argc', 'GLOBALS', '_GET', '_POST', '_COOKIE',
        '_FILES', '_SERVER', '_ENV', '_REQUEST', '_SESSION'], true)) continue;
    $__phork_vars[$__phork_name] = __phork_encode($__phork_value);
    if ($__phork_vars[$__phork_name]['type'] === 'opaque') {
        fwrite(STDERR, sprintf("Warning: \$%s holds a %s, which cannot be carried over; it will be null in later statements\n",
            $__phork_name, $__phork_vars[$__phork_name]['value']));
    }
}
file_put_contents($__phork_out, json_encode(
    ['value' => __phork_encode($__phork_result), 'vars' => (object) $__phork_vars],
    JSON_INVALID_UTF8_SUBSTITUTE | JSON_PRESERVE_ZERO_FRACTION
));
"#;

const SYMBOLS_SCRIPT: &str = "echo json_encode(array_merge(\
    get_defined_functions()['internal'], \
    array_keys(get_defined_constants())));";

#[derive(Serialize)]
struct DriverInput<'a> {
    code: &'a str,
    scope: &'a Scope,
}

#[derive(Deserialize)]
struct DriverOutput {
    value: Value,
    #[serde(default)]
    vars: BTreeMap<String, Value>,
}

/// Runs statements through `php -r` with the embedded driver.
#[derive(Debug)]
pub struct PhpEvaluator {
    binary: PathBuf,
    symbols: OnceLock<Vec<String>>,
}

impl PhpEvaluator {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            symbols: OnceLock::new(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    /// Make sure the binary runs, returning its version.
    pub fn check(&self) -> Result<String> {
        let unavailable = |reason: String| ReplError::PhpUnavailable {
            path: self.binary.display().to_string(),
            reason,
        };
        let output = Command::new(&self.binary)
            .args(["-r", "echo PHP_VERSION;"])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| unavailable(e.to_string()))?;
        if !output.status.success() {
            return Err(unavailable(format!("exited with {}", output.status)));
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        debug!(binary = %self.binary.display(), %version, "PHP binary is usable");
        Ok(version)
    }

    fn load_symbols(&self) -> Vec<String> {
        let output = match Command::new(&self.binary)
            .args(["-r", SYMBOLS_SCRIPT])
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
        {
            Ok(output) if output.status.success() => output,
            Ok(output) => {
                warn!(status = %output.status, "PHP refused to list symbols");
                return Vec::new();
            }
            Err(e) => {
                warn!(error = %e, "Failed to run PHP for symbols");
                return Vec::new();
            }
        };
        serde_json::from_slice(&output.stdout).unwrap_or_else(|e| {
            warn!(error = %e, "Unreadable symbol list from PHP");
            Vec::new()
        })
    }
}

/// Make `php` die with the evaluation child that runs it, so killing the
/// child on cancel or shutdown does not leave the interpreter running.
#[cfg(any(target_os = "linux", target_os = "android"))]
fn die_with_parent(command: &mut Command) {
    use nix::sys::prctl;
    use nix::sys::signal::Signal;
    use std::os::unix::process::CommandExt;

    // SAFETY: prctl is a single syscall, safe between fork and exec.
    unsafe {
        command.pre_exec(|| prctl::set_pdeathsig(Signal::SIGKILL).map_err(std::io::Error::from));
    }
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn die_with_parent(_command: &mut Command) {}

/// Whether a statement declares something later statements depend on.
pub fn is_declaration(statement: &str) -> bool {
    let word = leading_word(statement);
    DECLARATION_KEYWORDS
        .iter()
        .any(|keyword| word.eq_ignore_ascii_case(keyword))
}

impl Evaluator for PhpEvaluator {
    fn evaluate(&self, code: &str, scope: &mut Scope) -> std::result::Result<Completion, EvalError> {
        let input = tempfile::NamedTempFile::new()?;
        serde_json::to_writer(input.as_file(), &DriverInput { code, scope: &*scope })?;
        let output = tempfile::NamedTempFile::new()?;

        let mut command = Command::new(&self.binary);
        command
            .args(["-d", "display_errors=stderr", "-d", "log_errors=0"])
            .args(["-r", DRIVER, "--"])
            .arg(input.path())
            .arg(output.path());
        die_with_parent(&mut command);
        let status = command.status()?;

        let Some(code_status) = status.code() else {
            use std::os::unix::process::ExitStatusExt;
            return Err(EvalError::Signaled(status.signal().unwrap_or_default()));
        };
        if code_status == DRIVER_FAILURE {
            return Err(EvalError::Fatal(code_status));
        }

        let result = std::fs::read(output.path())?;
        if result.is_empty() {
            return Ok(Completion::Exited(code_status));
        }

        let DriverOutput { value, vars } = serde_json::from_slice(&result)?;
        scope.replace_vars(vars);
        if is_declaration(code) {
            scope.push_prelude(code.trim());
        }
        Ok(Completion::Returned(value))
    }

    fn symbols(&self) -> Vec<String> {
        self.symbols.get_or_init(|| self.load_symbols()).clone()
    }
}
