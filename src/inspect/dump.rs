//! `var_dump`-style rendering.

use std::fmt::Write;

use super::{Inspector, RESULT_MARKER, php_float};
use crate::value::{Key, Value};

/// Shows types and lengths, like `var_dump`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DumpInspector;

impl Inspector for DumpInspector {
    fn render(&self, value: &Value) -> String {
        let mut out = String::from(RESULT_MARKER);
        dump(value, 0, &mut out);
        out
    }
}

fn dump(value: &Value, indent: usize, out: &mut String) {
    let pad = " ".repeat(indent);
    match value {
        Value::Null => out.push_str("NULL"),
        Value::Bool(b) => {
            let _ = write!(out, "bool({b})");
        }
        Value::Int(i) => {
            let _ = write!(out, "int({i})");
        }
        Value::Float(f) => {
            let _ = write!(out, "float({})", php_float(*f));
        }
        Value::String(s) => {
            let _ = write!(out, "string({}) \"{s}\"", s.len());
        }
        Value::Array(entries) => {
            let _ = writeln!(out, "array({}) {{", entries.len());
            for entry in entries {
                match &entry.key {
                    Key::Int(i) => {
                        let _ = writeln!(out, "{pad}  [{i}]=>");
                    }
                    Key::Str(s) => {
                        let _ = writeln!(out, "{pad}  [\"{s}\"]=>");
                    }
                }
                out.push_str(&pad);
                out.push_str("  ");
                dump(&entry.value, indent + 2, out);
                out.push('\n');
            }
            out.push_str(&pad);
            out.push('}');
        }
        Value::Object(object) => {
            let _ = writeln!(
                out,
                "object({}) ({}) {{",
                object.class,
                object.properties.len()
            );
            for property in &object.properties {
                let _ = writeln!(out, "{pad}  [\"{}\"]=>", property.name);
                out.push_str(&pad);
                out.push_str("  ");
                dump(&property.value, indent + 2, out);
                out.push('\n');
            }
            out.push_str(&pad);
            out.push('}');
        }
        Value::Opaque(repr) => out.push_str(repr),
    }
}
