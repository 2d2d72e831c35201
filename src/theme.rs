//! Centralized color theming for REPL output.
//!
//! Value rendering and diagnostics share one semantic palette so the colored
//! inspector and error messages stay consistent.
//!
//! # NO_COLOR Support
//!
//! Colors can be disabled globally via:
//! - The `--no-color` CLI flag
//! - The `NO_COLOR` environment variable
//!
//! When colors are disabled, all theming functions return unstyled output.
//!
//! # Usage
//!
//! ```ignore
//! use crate::theme::Themed;
//! eprintln!("{}", "Cancelled.".warning());
//! let shown = paint(Semantic::Number, 42);
//! ```

use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};

use owo_colors::OwoColorize;

/// Global color enable flag (respects NO_COLOR and --no-color).
static COLORS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Disable all colors globally.
///
/// Call this early in main() when --no-color is set.
pub fn disable_colors() {
    COLORS_ENABLED.store(false, Ordering::Relaxed);
    owo_colors::set_override(false);
}

/// Check if colors are currently enabled.
pub fn colors_enabled() -> bool {
    COLORS_ENABLED.load(Ordering::Relaxed)
}

/// Semantic color categories for rendered values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantic {
    /// Integers and floats
    Number,
    /// String contents
    String,
    /// `true`, `false`, `null`
    Keyword,
    /// Class names of objects
    Class,
    /// Array keys and property names
    Key,
    /// Brackets, arrows and elision markers
    Punctuation,
}

/// Style `text` for a semantic category, or return it unstyled when colors
/// are disabled.
pub fn paint(semantic: Semantic, text: impl Display) -> String {
    if !colors_enabled() {
        return text.to_string();
    }
    match semantic {
        Semantic::Number => text.green().to_string(),
        Semantic::String => text.red().to_string(),
        Semantic::Keyword => text.magenta().to_string(),
        Semantic::Class => text.cyan().bold().to_string(),
        Semantic::Key => text.yellow().to_string(),
        Semantic::Punctuation => text.bright_black().to_string(),
    }
}

/// Extension trait for diagnostics printed by the front-end and the worker.
///
/// All methods respect the global color enable state set by `disable_colors()`.
pub trait Themed: OwoColorize {
    /// Style for error messages (red + bold).
    fn error_style(&self) -> String
    where
        Self: Display,
    {
        if colors_enabled() {
            format!("{}", self.red().bold())
        } else {
            self.to_string()
        }
    }

    /// Style for warnings and notices (yellow).
    fn warning(&self) -> String
    where
        Self: Display,
    {
        if colors_enabled() {
            format!("{}", self.yellow())
        } else {
            self.to_string()
        }
    }

    /// Style for secondary text (dimmed).
    fn muted(&self) -> String
    where
        Self: Display,
    {
        if colors_enabled() {
            format!("{}", self.dimmed())
        } else {
            self.to_string()
        }
    }
}

impl Themed for String {}
impl Themed for &str {}
