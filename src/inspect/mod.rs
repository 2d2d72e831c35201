//! Rendering of evaluation results for display.
//!
//! An [`Inspector`] turns a [`Value`] into the text shown after a `return`
//! statement. Rendering is pure; the supervisor writes the text.

mod colored;
mod dump;
mod export;

use clap::ValueEnum;

use crate::value::Value;

pub use colored::ColoredInspector;
pub use dump::DumpInspector;
pub use export::ExportInspector;

/// Marker printed before every rendered value.
pub const RESULT_MARKER: &str = " → ";

/// Render values for display.
pub trait Inspector: Send {
    fn render(&self, value: &Value) -> String;
}

/// Inspector selection for `--inspector`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum InspectorKind {
    /// var_dump style with types and lengths
    #[default]
    Dump,
    /// var_export style, valid PHP source
    Export,
    /// Compact type-colored output
    Colored,
}

impl InspectorKind {
    pub fn build(self) -> Box<dyn Inspector> {
        match self {
            Self::Dump => Box::new(DumpInspector),
            Self::Export => Box::new(ExportInspector),
            Self::Colored => Box::new(ColoredInspector::default()),
        }
    }
}

/// Format a float the way PHP prints it with `serialize_precision = -1`:
/// shortest round-trip digits, scientific notation for very large or very
/// small magnitudes.
pub(crate) fn php_float(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NAN".to_string()
        } else if value > 0.0 {
            "INF".to_string()
        } else {
            "-INF".to_string()
        };
    }
    let magnitude = value.abs();
    if magnitude != 0.0 && !(1e-4..1e15).contains(&magnitude) {
        let formatted = format!("{value:e}");
        let (mantissa, exponent) = formatted.split_once('e').unwrap_or((formatted.as_str(), "0"));
        let mantissa = if mantissa.contains('.') {
            mantissa.to_string()
        } else {
            format!("{mantissa}.0")
        };
        let exponent = exponent.strip_prefix('-').map_or_else(
            || format!("+{exponent}"),
            |digits| format!("-{digits}"),
        );
        return format!("{mantissa}E{exponent}");
    }
    format!("{value}")
}

/// Single-quote a string as `var_export` does.
pub(crate) fn single_quote(text: &str) -> String {
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push('\'');
    for c in text.chars() {
        if c == '\\' || c == '\'' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('\'');
    quoted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_php_float() {
        assert_eq!(php_float(1.5), "1.5");
        assert_eq!(php_float(2.0), "2");
        assert_eq!(php_float(-0.25), "-0.25");
        assert_eq!(php_float(1e20), "1.0E+20");
        assert_eq!(php_float(1.5e-7), "1.5E-7");
        assert_eq!(php_float(f64::INFINITY), "INF");
    }

    #[test]
    fn test_single_quote() {
        assert_eq!(single_quote("abc"), "'abc'");
        assert_eq!(single_quote("it's"), r"'it\'s'");
        assert_eq!(single_quote(r"a\b"), r"'a\\b'");
    }

    #[test]
    fn test_kind_builds_matching_inspector() {
        let value = Value::Int(2);
        assert_eq!(InspectorKind::Dump.build().render(&value), " → int(2)");
        assert_eq!(InspectorKind::Export.build().render(&value), " → 2");
        assert!(InspectorKind::Colored.build().render(&value).contains('2'));
    }

    #[test]
    fn test_kind_parses_from_cli_value() {
        assert_eq!(
            InspectorKind::from_str("colored", true).unwrap(),
            InspectorKind::Colored
        );
        assert!(InspectorKind::from_str("pretty", true).is_err());
    }
}
