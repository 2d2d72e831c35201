//! Post-scan rewrites: statement combining and the final-statement `return`.

/// Keywords whose chunk belongs to the preceding statement.
const CONTINUATION_KEYWORDS: &[&str] = &["else", "elseif", "catch", "finally"];

/// Statements starting with these keywords cannot be prefixed with `return`.
const NON_RETURNABLE_KEYWORDS: &[&str] = &[
    "echo",
    "print",
    "exit",
    "die",
    "goto",
    "global",
    "include",
    "include_once",
    "require",
    "require_once",
    "list",
    "return",
    "do",
    "for",
    "foreach",
    "while",
    "if",
    "function",
    "namespace",
    "class",
    "interface",
    "abstract",
    "final",
    "trait",
    "enum",
    "switch",
    "declare",
    "throw",
    "try",
    "unset",
    "use",
    "const",
    "static",
    "break",
    "continue",
    "yield",
];

/// `text` without its leading whitespace and comments.
///
/// An unterminated comment swallows the rest of the text.
pub fn skip_trivia(mut text: &str) -> &str {
    loop {
        text = text.trim_start();
        if let Some(rest) = text.strip_prefix("/*") {
            text = rest.find("*/").map_or("", |end| &rest[end + 2..]);
        } else if text.starts_with("//") || text.starts_with('#') {
            text = text.find('\n').map_or("", |end| &text[end + 1..]);
        } else {
            return text;
        }
    }
}

/// The identifier-like word at the start of `text`, ignoring leading
/// whitespace and comments.
///
/// The word ends at the first character that is not `[A-Za-z0-9_]`, which
/// gives the same boundary as a regex `\b` after a keyword.
pub fn leading_word(text: &str) -> &str {
    let text = skip_trivia(text);
    let end = text
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(text.len());
    &text[..end]
}

/// Whether `text` starts with `keyword` as a whole word, case-insensitively.
pub fn starts_with_keyword(text: &str, keyword: &str) -> bool {
    leading_word(text).eq_ignore_ascii_case(keyword)
}

fn starts_with_any(text: &str, keywords: &[&str]) -> bool {
    let word = leading_word(text);
    !word.is_empty() && keywords.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Whether a chunk continues the statement before it.
pub fn continues_previous(chunk: &str) -> bool {
    skip_trivia(chunk).starts_with(';') || starts_with_any(chunk, CONTINUATION_KEYWORDS)
}

/// Glue continuation chunks (`else`, `catch`, stray `;`...) onto their predecessor.
pub fn combine(statements: Vec<String>) -> Vec<String> {
    let mut combined: Vec<String> = Vec::with_capacity(statements.len());
    for statement in statements {
        match combined.last_mut() {
            Some(previous) if continues_previous(&statement) => previous.push_str(&statement),
            _ => combined.push(statement),
        }
    }
    combined
}

/// Whether a statement can be evaluated as an expression with `return`.
pub fn is_returnable(statement: &str) -> bool {
    statement.trim().ends_with(';') && !starts_with_any(statement, NON_RETURNABLE_KEYWORDS)
}

/// Prefix the statement with `return` so its value is shown after evaluation.
pub fn prepare_debug_statement(statement: String) -> String {
    if is_returnable(&statement) {
        format!("return {statement}")
    } else {
        statement
    }
}
