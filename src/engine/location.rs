//! Source positions.
//!
//! A [`ParserLocation`] is an immutable snapshot of where the parser is in the
//! input: the byte offset used to slice the buffer, plus a 1-based line and
//! column (counted in characters) for humans.

use std::fmt;
use std::sync::Arc;

/// Position inside a named input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserLocation {
    /// Name of the input (file name, `"<stdin>"`, ...).
    pub source: Arc<str>,
    /// Byte offset from the start of the input.
    pub offset: usize,
    /// 1-based line number.
    pub line: usize,
    /// 1-based column, in characters.
    pub column: usize,
}

impl ParserLocation {
    /// Location of the first character of `source`.
    pub fn start(source: impl Into<Arc<str>>) -> Self {
        Self { source: source.into(), offset: 0, line: 1, column: 1 }
    }

    /// Location reached after consuming `text` from `self`.
    pub fn advance(&self, text: &str) -> Self {
        let mut line = self.line;
        let mut column = self.column;
        for ch in text.chars() {
            if ch == '\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        Self { source: Arc::clone(&self.source), offset: self.offset + text.len(), line, column }
    }
}

impl fmt::Display for ParserLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}
