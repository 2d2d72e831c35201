//! `var_export`-style rendering.

use super::{Inspector, RESULT_MARKER, php_float, single_quote};
use crate::value::{Key, Value};

/// Shows values as PHP source, like `var_export`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExportInspector;

impl Inspector for ExportInspector {
    fn render(&self, value: &Value) -> String {
        format!("{RESULT_MARKER}{}", export(value, 0))
    }
}

fn export(value: &Value, indent: usize) -> String {
    let pad = " ".repeat(indent);
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => {
            let text = php_float(*f);
            if f.is_finite() && !text.contains(['.', 'E']) {
                format!("{text}.0")
            } else {
                text
            }
        }
        Value::String(s) => single_quote(s),
        Value::Array(entries) => {
            let mut out = String::from("array (\n");
            for entry in entries {
                let key = match &entry.key {
                    Key::Int(i) => i.to_string(),
                    Key::Str(s) => single_quote(s),
                };
                out.push_str(&format!("{pad}  {key} => "));
                out.push_str(&nested(&entry.value, indent + 2));
                out.push_str(",\n");
            }
            out.push_str(&pad);
            out.push(')');
            out
        }
        Value::Object(object) => {
            let head = if object.class == "stdClass" {
                "(object) array(\n".to_string()
            } else {
                format!("{}::__set_state(array(\n", object.class)
            };
            let mut out = head;
            for property in &object.properties {
                out.push_str(&format!("{pad}   {} => ", single_quote(&property.name)));
                out.push_str(&nested(&property.value, indent + 2));
                out.push_str(",\n");
            }
            out.push_str(&pad);
            out.push(')');
            if object.class != "stdClass" {
                out.push(')');
            }
            out
        }
        Value::Opaque(repr) => repr.clone(),
    }
}

/// Compound values start on their own line after `=>`.
fn nested(value: &Value, indent: usize) -> String {
    match value {
        Value::Array(_) | Value::Object(_) => {
            format!("\n{}{}", " ".repeat(indent), export(value, indent))
        }
        _ => export(value, indent),
    }
}
