//! Delimiter kinds tracked by the scanner and their transition table.
//!
//! Every entry on the scan stack is a [`Delimiter`]. Each kind knows which
//! openers may be pushed while it is on top and how its own context ends.

/// An open construct on the scan stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delimiter {
    /// `(`
    Paren,
    /// `{`
    Brace,
    /// `[`
    Bracket,
    /// `"`
    DoubleQuote,
    /// `'`
    SingleQuote,
    /// `//` or `#`
    LineComment,
    /// `/*`
    BlockComment,
    /// `<<<`
    Heredoc,
}

/// How the context opened by a delimiter ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminator {
    /// A single closing character, consumed by the code rule.
    Close(char),
    /// A literal ending an opaque region, consumed together with the region.
    Literal(&'static str),
    /// A line naming the heredoc identifier.
    HeredocLabel,
}

/// Openers in match order. `//` must be tried before any single `/`.
const OPENERS: [(&str, Delimiter); 9] = [
    ("(", Delimiter::Paren),
    ("{", Delimiter::Brace),
    ("[", Delimiter::Bracket),
    ("\"", Delimiter::DoubleQuote),
    ("'", Delimiter::SingleQuote),
    ("//", Delimiter::LineComment),
    ("#", Delimiter::LineComment),
    ("/*", Delimiter::BlockComment),
    ("<<<", Delimiter::Heredoc),
];

impl Delimiter {
    /// Match an opener at the start of `input`, returning its text and kind.
    pub fn match_opener(input: &str) -> Option<(&'static str, Delimiter)> {
        OPENERS
            .iter()
            .find(|(token, _)| input.starts_with(token))
            .copied()
    }

    /// The terminator that pops this delimiter.
    pub fn terminator(self) -> Terminator {
        match self {
            Self::Paren => Terminator::Close(')'),
            Self::Brace => Terminator::Close('}'),
            Self::Bracket => Terminator::Close(']'),
            Self::DoubleQuote => Terminator::Literal("\""),
            Self::SingleQuote => Terminator::Literal("'"),
            Self::LineComment => Terminator::Literal("\n"),
            Self::BlockComment => Terminator::Literal("*/"),
            Self::Heredoc => Terminator::HeredocLabel,
        }
    }

    /// Whether openers are recognized while this delimiter is on top.
    ///
    /// Brackets nest anything; quotes, comments and heredocs are opaque
    /// until their terminator.
    pub fn allows_nesting(self) -> bool {
        matches!(self, Self::Paren | Self::Brace | Self::Bracket)
    }

    /// The quote character for string delimiters.
    pub fn quote(self) -> Option<char> {
        match self {
            Self::DoubleQuote => Some('"'),
            Self::SingleQuote => Some('\''),
            _ => None,
        }
    }

    /// Comments are trivia: they never make a statement non-empty.
    pub fn is_comment(self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }

    /// The closing character for bracket delimiters.
    pub fn closer(self) -> Option<char> {
        match self.terminator() {
            Terminator::Close(c) => Some(c),
            _ => None,
        }
    }
}
