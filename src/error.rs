//! Error types.
//!
//! Failures fall into three groups:
//!
//! - [`SyntaxError`]: the input does not match the grammar. Only reported once
//!   backtracking has run out of alternatives.
//! - [`ParseError::TrailingInput`]: the root record populated but unparsed
//!   characters remain (only raised by `parse`, not `tokenize`).
//! - [`ConfigError`]: the grammar itself is wrong. These are bugs in the
//!   grammar definition and are never recovered from.

use std::fmt;

use thiserror::Error;

use crate::engine::ParserLocation;

/// Any error returned by the parse entry points.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    /// Input remained after the root record was populated.
    #[error("unexpected trailing input at {location}: {tail:?}")]
    TrailingInput { tail: String, location: ParserLocation },

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The parsed value did not have the shape `parse_as` asked for.
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// The reader failed (including input that is not valid UTF-8).
    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

impl ParseError {
    /// Location the error refers to, when it has one.
    pub fn location(&self) -> Option<&ParserLocation> {
        match self {
            ParseError::Syntax(err) => Some(&err.location),
            ParseError::TrailingInput { location, .. } => Some(location),
            ParseError::Config(_) | ParseError::Conversion(_) | ParseError::Io(_) => None,
        }
    }
}

/// Input could not be matched against the grammar.
///
/// The error describes the furthest position any branch reached, which is
/// almost always the most useful place to point at.
#[derive(Debug, Clone, Error)]
pub struct SyntaxError {
    /// Description of what the failing terminal wanted.
    pub expected: String,
    /// Up to a few characters of input at `location`, or `"end of input"`.
    pub found: String,
    pub location: ParserLocation,
    /// Descriptions of the open tokens at the failure, outermost first.
    pub trail: Vec<String>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "syntax error at {}: expected {}, found {}", self.location, self.expected, self.found)?;
        if !self.trail.is_empty() {
            write!(f, " (while parsing {})", self.trail.join(" > "))?;
        }
        Ok(())
    }
}

/// The grammar definition is invalid.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("record type `{0}` is defined more than once")]
    DuplicateRecord(String),

    #[error("record type `{0}` is not defined")]
    UnknownRecord(String),

    #[error("`{record}` references unknown record type `{name}`")]
    UnresolvedReference { record: String, name: String },

    #[error("rule `{0}` has no slots")]
    EmptyRule(String),

    #[error("variant `{0}` has no candidates")]
    EmptyVariant(String),

    #[error("`{record}.{slot}` refers to unknown sibling `{sibling}`")]
    UnknownSibling { record: String, slot: String, sibling: String },

    #[error("`{record}.{slot}` must come after its sibling `{sibling}`")]
    SiblingOrder { record: String, slot: String, sibling: String },

    #[error("invalid pattern for `{record}.{slot}`: {source}")]
    InvalidPattern {
        record: String,
        slot: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid capture limit for `{record}.{slot}`: min {min}, max {max}")]
    InvalidCaptureLimit { record: String, slot: String, min: usize, max: usize },

    #[error("`{record}.{slot}` has no capture pattern")]
    MissingPattern { record: String, slot: String },

    /// A context-equals slot was built from a sibling that does not hold text.
    #[error("`{record}.{slot}` can only mirror a text sibling, found {found}")]
    ContextNotText { record: String, slot: String, found: &'static str },

    /// The declared conversion rejected the matched text.
    #[error("cannot convert {text:?} for `{record}.{slot}`: {message}")]
    Conversion { record: String, slot: String, text: String, message: String },
}

/// A parsed [`Value`](crate::Value) does not have the requested shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversionError {
    #[error("expected {expected}, found {found}")]
    Mismatch { expected: &'static str, found: &'static str },

    #[error("record `{record}` has no field `{field}`")]
    MissingField { record: String, field: String },
}
