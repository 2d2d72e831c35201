//! Compact, type-colored rendering.

use super::{Inspector, RESULT_MARKER, php_float, single_quote};
use crate::theme::{Semantic, paint};
use crate::value::{Entry, Key, Value};

/// Entries shown per array before eliding the rest.
const DEFAULT_MAX_ENTRIES: usize = 10;

/// Lists as `[ ... ]`, maps as `{ k => v }`, objects as `Class { ... }`.
#[derive(Debug, Clone, Copy)]
pub struct ColoredInspector {
    max_entries: usize,
}

impl Default for ColoredInspector {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl ColoredInspector {
    pub fn with_max_entries(max_entries: usize) -> Self {
        Self { max_entries }
    }

    fn value(&self, value: &Value, indent: &str) -> String {
        match value {
            Value::Null => paint(Semantic::Keyword, "NULL"),
            Value::Bool(b) => paint(Semantic::Keyword, b),
            Value::Int(i) => paint(Semantic::Number, i),
            Value::Float(f) => paint(Semantic::Number, php_float(*f)),
            Value::String(s) => paint(Semantic::String, single_quote(s)),
            Value::Array(entries) => self.array(entries, indent),
            Value::Object(object) => {
                let mut properties: Vec<_> = object.properties.iter().collect();
                properties.sort_by(|a, b| a.name.cmp(&b.name));

                let mut out = paint(Semantic::Class, &object.class);
                if properties.is_empty() {
                    out.push_str(&paint(Semantic::Punctuation, " {}"));
                    return out;
                }
                out.push_str(&paint(Semantic::Punctuation, " {"));
                out.push('\n');
                let inner = format!("{indent}  ");
                let last = properties.len() - 1;
                for (n, property) in properties.into_iter().enumerate() {
                    out.push_str(&inner);
                    out.push_str(&paint(Semantic::Key, &property.name));
                    out.push_str(&paint(Semantic::Punctuation, " => "));
                    out.push_str(&self.value(&property.value, &inner));
                    if n < last {
                        out.push_str(&paint(Semantic::Punctuation, ","));
                    }
                    out.push('\n');
                }
                out.push_str(indent);
                out.push_str(&paint(Semantic::Punctuation, "}"));
                out
            }
            Value::Opaque(repr) => repr.clone(),
        }
    }

    fn array(&self, entries: &[Entry], indent: &str) -> String {
        let indexed = Value::is_list(entries);
        let (open, close) = if indexed { ("[", "]") } else { ("{", "}") };
        if entries.is_empty() {
            return paint(Semantic::Punctuation, format!("{open}{close}"));
        }

        let shown = &entries[..entries.len().min(self.max_entries)];
        let extra = entries.len() - shown.len();
        let inner = format!("{indent}  ");

        let mut out = paint(Semantic::Punctuation, open);
        out.push('\n');
        for (n, entry) in shown.iter().enumerate() {
            out.push_str(&inner);
            if !indexed {
                out.push_str(&key(&entry.key));
                out.push_str(&paint(Semantic::Punctuation, " => "));
            }
            out.push_str(&self.value(&entry.value, &inner));
            if n + 1 < shown.len() || extra > 0 {
                out.push_str(&paint(Semantic::Punctuation, ","));
            }
            out.push('\n');
        }
        if extra > 0 {
            out.push_str(&inner);
            out.push_str(&paint(
                Semantic::Punctuation,
                format!("... and {extra} more ..."),
            ));
            out.push('\n');
        }
        out.push_str(indent);
        out.push_str(&paint(Semantic::Punctuation, close));
        out
    }
}

fn key(key: &Key) -> String {
    match key {
        Key::Int(i) => paint(Semantic::Number, i),
        Key::Str(s) => paint(Semantic::String, single_quote(s)),
    }
}

impl Inspector for ColoredInspector {
    fn render(&self, value: &Value) -> String {
        format!("{RESULT_MARKER}{}", self.value(value, ""))
    }
}
