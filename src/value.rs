//! Values exchanged with the evaluator and the scope that persists between
//! evaluations.
//!
//! Values are a tagged tree that mirrors the PHP types an inspector can show.
//! They round-trip through JSON between the evaluator driver, the evaluation
//! child and the worker.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A value produced by evaluating user code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    /// An ordered PHP array.
    Array(Vec<Entry>),
    Object(Object),
    /// Something with no portable representation (resources, closures).
    Opaque(String),
}

/// Array key: PHP arrays mix integer and string keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Key {
    Int(i64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub key: Key,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Object {
    pub class: String,
    #[serde(default)]
    pub properties: Vec<Property>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Value {
    /// Build a list with keys `0..n`.
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(
            items
                .into_iter()
                .enumerate()
                .map(|(i, value)| Entry {
                    key: Key::Int(i as i64),
                    value,
                })
                .collect(),
        )
    }

    /// Build an array from string keys, keeping their order.
    pub fn map<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Array(
            pairs
                .into_iter()
                .map(|(key, value)| Entry {
                    key: Key::Str(key.into()),
                    value,
                })
                .collect(),
        )
    }

    /// The PHP type name, as `gettype()` would spell it.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "double",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Opaque(_) => "unknown type",
        }
    }

    /// Whether an array's keys are exactly `0..n` in order.
    pub fn is_list(entries: &[Entry]) -> bool {
        entries
            .iter()
            .enumerate()
            .all(|(i, entry)| entry.key == Key::Int(i as i64))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Variables that outlive a single evaluation, plus the declarations that
/// must be replayed before each one.
///
/// The worker owns the authoritative scope. Each evaluation child works on a
/// fork-time copy and reports its post-evaluation scope back on success.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    vars: BTreeMap<String, Value>,
    #[serde(default)]
    prelude: Vec<String>,
}

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Variable names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn vars(&self) -> &BTreeMap<String, Value> {
        &self.vars
    }

    /// Replace every variable, keeping the prelude.
    pub fn replace_vars(&mut self, vars: BTreeMap<String, Value>) {
        self.vars = vars;
    }

    pub fn prelude(&self) -> &[String] {
        &self.prelude
    }

    pub fn push_prelude(&mut self, declaration: impl Into<String>) {
        self.prelude.push(declaration.into());
    }

    /// Adopt the scope reported by a successful evaluation child.
    ///
    /// The child started from a copy of `self`, so its scope already holds
    /// every surviving variable; variables it unset are gone.
    pub fn merge_from(&mut self, child: Scope) {
        *self = child;
    }

    /// `$`-prefixed variable names starting with `prefix` (which includes the `$`).
    pub fn completions(&self, prefix: &str) -> Vec<String> {
        let Some(stem) = prefix.strip_prefix('$') else {
            return Vec::new();
        };
        self.names()
            .filter(|name| name.starts_with(stem))
            .map(|name| format!("${name}"))
            .collect()
    }
}
