//! Statement boundary detection for REPL input.
//!
//! The chunker decides when freeform text typed at the prompt contains
//! complete statements. It is purely lexical: it tracks brackets, quotes,
//! comments and heredocs, and never validates syntax. `1 + ;` is complete.
//!
//! ```text
//! buffer ──► Scanner (stack of Delimiter) ──► raw chunks
//!                                                │
//!                          combine(else/catch/;) ◄┘
//!                                                │
//!                    return-rewrite of the last ◄┘──► Scan::Complete
//! ```
//!
//! Every call rescans the whole buffer; there is no resumable state.

mod delimiter;
mod rewrite;

pub use delimiter::{Delimiter, Terminator};
pub use rewrite::{is_returnable, leading_word, starts_with_keyword};

/// Result of scanning a buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scan {
    /// The buffer holds one or more complete statements, in order.
    Complete(Vec<String>),
    /// More input is needed.
    Incomplete,
}

impl Scan {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Complete(_))
    }
}

/// Splits an input buffer into complete statements.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatementChunker;

impl StatementChunker {
    pub fn new() -> Self {
        Self
    }

    /// Scan `buffer` from the start.
    ///
    /// Returns [`Scan::Incomplete`] when a bracket, string, comment or heredoc
    /// is still open, or when trailing code has no terminator yet. Otherwise the
    /// statements are combined and the last one gets the `return` rewrite.
    pub fn scan(&self, buffer: &str) -> Scan {
        let mut scanner = Scanner::new(buffer);
        scanner.run();
        scanner.finish()
    }
}

/// Whether a statement asks for its value to be shown.
pub fn is_return_statement(statement: &str) -> bool {
    starts_with_keyword(statement, "return")
}

#[derive(Debug, PartialEq, Eq)]
enum Step {
    Continue,
    Pause,
}

struct Scanner<'a> {
    rest: &'a str,
    current: String,
    has_code: bool,
    stack: Vec<Delimiter>,
    statements: Vec<String>,
}

impl<'a> Scanner<'a> {
    fn new(buffer: &'a str) -> Self {
        Self {
            rest: buffer,
            current: String::new(),
            has_code: false,
            stack: Vec::new(),
            statements: Vec::new(),
        }
    }

    fn run(&mut self) {
        while !self.rest.is_empty() {
            let step = match self.stack.last().copied() {
                Some(Delimiter::Heredoc) => self.heredoc(),
                Some(open) if !open.allows_nesting() => self.opaque(open),
                top => {
                    self.code(top);
                    Step::Continue
                }
            };
            if step == Step::Pause {
                break;
            }
        }
    }

    fn finish(mut self) -> Scan {
        if !self.rest.is_empty()
            || !self.stack.is_empty()
            || self.has_code
            || self.statements.is_empty()
        {
            return Scan::Incomplete;
        }

        let trivia = std::mem::take(&mut self.current);
        let mut statements = rewrite::combine(self.statements);
        if let Some(last) = statements.pop() {
            let mut last = rewrite::prepare_debug_statement(last);
            last.push_str(&trivia);
            statements.push(last);
        }
        Scan::Complete(statements)
    }

    /// Move `len` bytes from the input into the current statement.
    fn take(&mut self, len: usize) {
        let (taken, rest) = self.rest.split_at(len);
        self.current.push_str(taken);
        self.rest = rest;
    }

    fn flush(&mut self) {
        self.statements.push(std::mem::take(&mut self.current));
        self.has_code = false;
    }

    fn code(&mut self, top: Option<Delimiter>) {
        if let Some((token, open)) = Delimiter::match_opener(self.rest) {
            self.take(token.len());
            self.stack.push(open);
            if !open.is_comment() {
                self.has_code = true;
            }
            return;
        }

        let space = self
            .rest
            .find(|c: char| !is_space(c))
            .unwrap_or(self.rest.len());
        if space > 0 {
            let (whitespace, rest) = self.rest.split_at(space);
            match self.statements.last_mut() {
                Some(previous) if self.current.is_empty() => previous.push_str(whitespace),
                _ => self.current.push_str(whitespace),
            }
            self.rest = rest;
            return;
        }

        let Some(ch) = self.rest.chars().next() else {
            return;
        };
        self.take(ch.len_utf8());
        self.has_code = true;

        if top.and_then(Delimiter::closer) == Some(ch) {
            self.stack.pop();
        }
        if self.stack.is_empty() && (ch == ';' || ch == '}') {
            self.flush();
        }
    }

    fn opaque(&mut self, open: Delimiter) -> Step {
        if let Some(quote) = open.quote()
            && let Some(len) = escape_before_quote(self.rest, quote)
        {
            self.take(len);
            return Step::Continue;
        }

        let Terminator::Literal(end) = open.terminator() else {
            return Step::Pause;
        };
        match self.rest.find(end) {
            Some(at) => {
                self.take(at + end.len());
                self.stack.pop();
                Step::Continue
            }
            None => Step::Pause,
        }
    }

    fn heredoc(&mut self) -> Step {
        let Some((opener_len, label)) = heredoc_label(self.rest) else {
            // `<<<` without an identifier is just text.
            self.stack.pop();
            return Step::Continue;
        };
        self.take(opener_len);

        match heredoc_end(self.rest, label) {
            Some(end) => {
                self.take(end);
                self.stack.pop();
                Step::Continue
            }
            None => Step::Pause,
        }
    }
}

fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Length of the text up to and including the first escape (`\` plus any
/// character), if one occurs before the next `quote`.
fn escape_before_quote(text: &str, quote: char) -> Option<usize> {
    let mut chars = text.char_indices();
    while let Some((at, c)) = chars.next() {
        if c == quote {
            return None;
        }
        if c == '\\' {
            let (_, escaped) = chars.next()?;
            return Some(at + 1 + escaped.len_utf8());
        }
    }
    None
}

/// Parse the heredoc identifier after `<<<`: optional blanks, then an
/// identifier optionally wrapped in matching quotes.
///
/// Returns the consumed length and the identifier.
fn heredoc_label(text: &str) -> Option<(usize, &str)> {
    let blanks = text
        .find(|c: char| c != ' ' && c != '\t')
        .unwrap_or(text.len());
    let after = &text[blanks..];
    let quote = after.chars().next().filter(|c| *c == '\'' || *c == '"');
    let start = blanks + quote.map_or(0, char::len_utf8);
    let ident = &text[start..];

    if !ident.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        return None;
    }
    let len = ident
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(ident.len());
    let label = &ident[..len];
    let mut consumed = start + len;

    if let Some(quote) = quote {
        if !text[consumed..].starts_with(quote) {
            return None;
        }
        consumed += quote.len_utf8();
    }
    Some((consumed, label))
}

/// Find the closing line of a heredoc body.
///
/// The closing line is the label, optionally indented and optionally
/// followed by `;`, and must be terminated by a newline. Returns the offset
/// just past the label.
fn heredoc_end(body: &str, label: &str) -> Option<usize> {
    let mut search = 0;
    while let Some(newline) = body[search..].find('\n') {
        let line_start = search + newline + 1;
        let line_end = line_start + body[line_start..].find('\n')?;
        let line = &body[line_start..line_end];
        let trimmed = line.trim_start_matches([' ', '\t']);
        let tail = trimmed.strip_prefix(label);
        if matches!(tail, Some("") | Some(";")) {
            return Some(line_start + (line.len() - trimmed.len()) + label.len());
        }
        search = line_start;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(buffer: &str) -> Scan {
        StatementChunker::new().scan(buffer)
    }

    fn complete(buffer: &str) -> Vec<String> {
        match scan(buffer) {
            Scan::Complete(statements) => statements,
            Scan::Incomplete => panic!("expected complete scan for {buffer:?}"),
        }
    }

    #[test]
    fn test_single_expression_is_rewritten() {
        assert_eq!(complete("1 + 1;\n"), vec!["return 1 + 1;\n"]);
    }

    #[test]
    fn test_return_is_left_alone() {
        assert_eq!(complete("return 1 + 1;\n"), vec!["return 1 + 1;\n"]);
    }

    #[test]
    fn test_control_flow_is_not_rewritten() {
        assert_eq!(complete("if (true) { 1; }\n"), vec!["if (true) { 1; }\n"]);
    }

    #[test]
    fn test_multiple_statements_only_last_rewritten() {
        assert_eq!(
            complete("$a = 1; $a + 1;\n"),
            vec!["$a = 1; ", "return $a + 1;\n"]
        );
    }

    #[test]
    fn test_escaped_quote_inside_string() {
        assert_eq!(complete("\"a\\\"b\";\n"), vec!["return \"a\\\"b\";\n"]);
        assert_eq!(complete("'it\\'s';\n"), vec!["return 'it\\'s';\n"]);
    }

    #[test]
    fn test_terminators_inside_strings_are_ignored() {
        assert_eq!(
            complete("$s = \"a; } b\";\n"),
            vec!["return $s = \"a; } b\";\n"]
        );
    }

    #[test]
    fn test_else_combines_with_if() {
        assert_eq!(
            complete("if (true) { 1; }\nelse { 2; }\n"),
            vec!["if (true) { 1; }\nelse { 2; }\n"]
        );
    }

    #[test]
    fn test_try_catch_finally_combine() {
        let statements =
            complete("try { f(); } catch (Exception $e) { 1; } finally { 2; }\n");
        assert_eq!(statements.len(), 1);
    }

    #[test]
    fn test_incomplete_inputs() {
        assert_eq!(scan("foo(\n"), Scan::Incomplete);
        assert_eq!(scan("$a = [1, 2\n"), Scan::Incomplete);
        assert_eq!(scan("function f() {\n"), Scan::Incomplete);
        assert_eq!(scan("$s = \"open\n"), Scan::Incomplete);
        assert_eq!(scan("$s = 'open\n"), Scan::Incomplete);
        assert_eq!(scan("/* open comment\n"), Scan::Incomplete);
        assert_eq!(scan("1 + 1\n"), Scan::Incomplete);
        assert_eq!(scan(""), Scan::Incomplete);
        assert_eq!(scan("   \n"), Scan::Incomplete);
    }

    #[test]
    fn test_line_comment_needs_newline() {
        assert_eq!(scan("1; // trailing"), Scan::Incomplete);
        assert_eq!(complete("1; // trailing\n"), vec!["return 1; // trailing\n"]);
        assert_eq!(complete("1; # hash\n"), vec!["return 1; # hash\n"]);
    }

    #[test]
    fn test_comment_only_tail_is_trivia() {
        assert_eq!(
            complete("$a = 1;\n/* note */\n"),
            vec!["return $a = 1;\n/* note */\n"]
        );
    }

    #[test]
    fn test_comment_inside_statement_keeps_it_open() {
        assert_eq!(scan("$a = /* ; */ 1\n"), Scan::Incomplete);
        assert_eq!(
            complete("$a = /* ; */ 1;\n"),
            vec!["return $a = /* ; */ 1;\n"]
        );
    }

    #[test]
    fn test_whitespace_goes_to_previous_statement() {
        assert_eq!(complete("1;\n\n2;\n"), vec!["1;\n\n", "return 2;\n"]);
    }

    #[test]
    fn test_heredoc() {
        let buffer = "$x = <<<EOT\nhello; }\nEOT;\n";
        assert_eq!(complete(buffer), vec![format!("return {buffer}")]);
    }

    #[test]
    fn test_heredoc_incomplete_until_closing_line() {
        assert_eq!(scan("$x = <<<EOT\nhello\n"), Scan::Incomplete);
        assert_eq!(scan("$x = <<<EOT\nhello\nEOT;"), Scan::Incomplete);
        assert_eq!(scan("$x = <<<EOT\nEOTX;\n"), Scan::Incomplete);
    }

    #[test]
    fn test_nowdoc_and_quoted_heredoc() {
        assert!(scan("$x = <<<'EOT'\nraw $a\nEOT;\n").is_complete());
        assert!(scan("$x = <<< \"EOT\"\nhi\n  EOT;\n").is_complete());
    }

    #[test]
    fn test_heredoc_without_identifier_is_text() {
        assert!(scan("$a <<< 2;\n").is_complete());
    }

    #[test]
    fn test_boundaries_are_lexical() {
        assert_eq!(complete("1 + ;\n"), vec!["return 1 + ;\n"]);
    }

    #[test]
    fn test_closing_brace_ends_statement() {
        assert_eq!(
            complete("function f() { return 1; }\nf();\n"),
            vec!["function f() { return 1; }\n", "return f();\n"]
        );
    }

    #[test]
    fn test_leading_comment_does_not_hide_keyword() {
        assert_eq!(complete("/* note */ echo 1;\n"), vec!["/* note */ echo 1;\n"]);
        assert_eq!(complete("// show it\necho 1;\n"), vec!["// show it\necho 1;\n"]);
        assert_eq!(
            complete("/* sum */ 1 + 1;\n"),
            vec!["return /* sum */ 1 + 1;\n"]
        );
    }

    #[test]
    fn test_else_after_comment_line_combines() {
        let buffer = "if (1) { 1; }\n// other\nelse { 2; }\n";
        assert_eq!(complete(buffer), vec![buffer]);
    }

    #[test]
    fn test_is_return_statement() {
        assert!(is_return_statement("return 1;"));
        assert!(is_return_statement("  RETURN $a;"));
        assert!(!is_return_statement("returned();"));
        assert!(!is_return_statement("$a = 1;"));
        assert!(is_return_statement("/* shown */ return 2;"));
    }

    #[test]
    fn test_escape_before_quote() {
        assert_eq!(escape_before_quote("ab\\\"c\"", '"'), Some(4));
        assert_eq!(escape_before_quote("ab\"c\\x", '"'), None);
        assert_eq!(escape_before_quote("ab\\", '"'), None);
    }

    #[test]
    fn test_heredoc_label() {
        assert_eq!(heredoc_label("EOT\n"), Some((3, "EOT")));
        assert_eq!(heredoc_label("  'RAW'\n"), Some((7, "RAW")));
        assert_eq!(heredoc_label("\"EOT'\n"), None);
        assert_eq!(heredoc_label("1X\n"), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn atom() -> impl Strategy<Value = String> {
            prop_oneof![
                "[a-z]{1,6}".prop_map(|name| format!("${name}")),
                (0u32..1000).prop_map(|n| n.to_string()),
                "[a-z ;{}]{0,8}".prop_map(|s| format!("\"{s}\"")),
                "[a-z ;{}]{0,8}".prop_map(|s| format!("'{s}'")),
                Just("/* ; */ 1".to_string()),
            ]
        }

        fn expr() -> impl Strategy<Value = String> {
            atom().prop_recursive(3, 16, 4, |inner| {
                prop_oneof![
                    inner.clone().prop_map(|e| format!("({e})")),
                    prop::collection::vec(inner.clone(), 0..3)
                        .prop_map(|items| format!("[{}]", items.join(", "))),
                    (inner.clone(), inner).prop_map(|(a, b)| format!("{a} + {b}")),
                ]
            })
        }

        fn statement() -> impl Strategy<Value = String> {
            prop_oneof![
                expr().prop_map(|e| format!("{e};")),
                (expr(), expr()).prop_map(|(c, b)| format!("if ({c}) {{ {b}; }}")),
                ("[a-z]{1,6}", expr())
                    .prop_map(|(name, e)| format!("function {name}() {{ return {e}; }}")),
            ]
        }

        fn program() -> impl Strategy<Value = String> {
            prop::collection::vec(statement(), 1..6).prop_map(|s| s.join("\n") + "\n")
        }

        proptest! {
            #[test]
            fn balanced_input_is_complete(input in program()) {
                let scan = StatementChunker::new().scan(&input);
                prop_assert!(matches!(scan, Scan::Complete(ref s) if !s.is_empty()));
            }

            #[test]
            fn open_constructs_are_incomplete(
                input in program(),
                tail in prop_oneof![
                    Just("f(1, "),
                    Just("$a = \"unterminated"),
                    Just("$a = 'unterminated"),
                    Just("/* still open"),
                    Just("// no newline"),
                    Just("$s = <<<EOT\nbody\n"),
                    Just("if (1) {"),
                ],
            ) {
                let buffer = format!("{input}{tail}");
                prop_assert_eq!(StatementChunker::new().scan(&buffer), Scan::Incomplete);
            }

            #[test]
            fn rescanning_statements_is_stable(input in program()) {
                let chunker = StatementChunker::new();
                let Scan::Complete(first) = chunker.scan(&input) else {
                    return Err(TestCaseError::fail("program should scan complete"));
                };
                let second = chunker.scan(&first.concat());
                prop_assert_eq!(second, Scan::Complete(first));
            }
        }
    }
}
