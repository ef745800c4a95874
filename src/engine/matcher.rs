//! Terminal matchers.
//!
//! A matcher looks at the unconsumed buffer and answers one of three things:
//!
//! ```text
//! Match(text, consumed)   the terminal is complete
//! Continue(tentative)     consistent so far, but more input could change the
//!                         answer; `tentative` is what would be accepted if the
//!                         input ended here
//! Fail                    cannot match at this position
//! ```
//!
//! `Continue` is what drives streaming: the tokenizer reads another line and
//! asks again. At end of input a tentative match is accepted as is.
//!
//! Every matcher except [`Matcher::Null`] first skips leading characters from
//! the owning token's ignore set and counts them in `consumed`.

use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::value::Value;

/// Numeric representation a number slot converts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumberKind {
    Integer,
    Float,
}

impl NumberKind {
    /// Convert a matched numeric lexeme.
    pub(crate) fn convert(self, text: &str) -> Result<Value, String> {
        match self {
            NumberKind::Integer => text.parse::<i64>().map(Value::Integer).map_err(|e| e.to_string()),
            NumberKind::Float => text.parse::<f64>().map(Value::Float).map_err(|e| e.to_string()),
        }
    }
}

/// Compiled capture pattern of a pattern, `until` or enum slot.
#[derive(Debug, Clone)]
pub struct CapturePattern {
    /// Anchored at the start of the buffer.
    pattern: Option<Regex>,
    /// Anchored at both ends; checks a whole `until` capture.
    full: Option<Regex>,
    until: Option<Regex>,
    source: String,
}

impl CapturePattern {
    pub(crate) fn new(pattern: Option<&str>, until: Option<&str>, ignore_case: bool) -> Result<Self, regex::Error> {
        let build = |src: String| RegexBuilder::new(&src).case_insensitive(ignore_case).build();
        let anchored = pattern.map(|p| build(format!("^(?:{p})"))).transpose()?;
        let full = match (pattern, until) {
            (Some(p), Some(_)) => Some(build(format!("^(?:{p})\\z"))?),
            _ => None,
        };
        let until_re = until.map(|u| build(u.to_string())).transpose()?;
        let source = match (pattern, until) {
            (Some(p), Some(u)) => format!("/{p}/ until /{u}/"),
            (Some(p), None) => format!("/{p}/"),
            (None, Some(u)) => format!("text until /{u}/"),
            (None, None) => "empty text".to_string(),
        };
        Ok(Self { pattern: anchored, full, until: until_re, source })
    }

    fn apply(&self, rest: &str, lead: usize) -> MatchResult {
        if let Some(until) = &self.until {
            let Some(end) = until.find(rest) else {
                return MatchResult::Continue(None);
            };
            let captured = &rest[..end.start()];
            if self.full.as_ref().is_some_and(|full| !full.is_match(captured)) {
                return MatchResult::Fail;
            }
            return MatchResult::matched(captured, lead);
        }

        let Some(pattern) = &self.pattern else {
            return MatchResult::matched("", lead);
        };
        match pattern.find(rest) {
            Some(m) if m.end() == rest.len() => MatchResult::Continue(Some(Matched::new(m.as_str(), lead))),
            Some(m) => MatchResult::matched(m.as_str(), lead),
            None if rest.is_empty() => MatchResult::Continue(None),
            None => MatchResult::Fail,
        }
    }
}

impl fmt::Display for CapturePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Text accepted by a matcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Matched {
    /// The captured text, without skipped ignore characters.
    pub text: String,
    /// Bytes consumed from the buffer, including skipped ignore characters.
    pub consumed: usize,
}

impl Matched {
    fn new(text: &str, lead: usize) -> Self {
        Self { text: text.to_string(), consumed: lead + text.len() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum MatchResult {
    Match(Matched),
    Continue(Option<Matched>),
    Fail,
}

impl MatchResult {
    fn matched(text: &str, lead: usize) -> Self {
        MatchResult::Match(Matched::new(text, lead))
    }
}

#[derive(Debug, Clone)]
pub(crate) enum Matcher {
    Literal { text: String, ignore_case: bool },
    Pattern(CapturePattern),
    Number(NumberKind),
    /// Matches the empty input without skipping anything.
    Null,
}

impl Matcher {
    /// Matcher for a context-equals slot, built from the sibling's current value.
    pub(crate) fn context_equals(sibling: &Value, ignore_case: bool) -> Result<Matcher, &'static str> {
        match sibling {
            Value::Text(text) => Ok(Matcher::Literal { text: text.clone(), ignore_case }),
            Value::Null => Ok(Matcher::Null),
            other => Err(other.kind()),
        }
    }

    pub(crate) fn apply(&self, buffer: &str, ignore: &str) -> MatchResult {
        if matches!(self, Matcher::Null) {
            return MatchResult::matched("", 0);
        }
        let rest = buffer.trim_start_matches(|c: char| ignore.contains(c));
        let lead = buffer.len() - rest.len();

        match self {
            Matcher::Literal { text, ignore_case } => match compare_prefix(rest, text, *ignore_case) {
                Prefix::Full(len) => MatchResult::matched(&rest[..len], lead),
                Prefix::Partial => MatchResult::Continue(None),
                Prefix::Mismatch => MatchResult::Fail,
            },
            Matcher::Pattern(pattern) => pattern.apply(rest, lead),
            Matcher::Number(kind) => {
                let re = match kind {
                    NumberKind::Integer => regex!(r"^[+-]?\d+"),
                    NumberKind::Float => regex!(r"^[+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?"),
                };
                match re.find(rest) {
                    Some(m) if m.end() == rest.len() => MatchResult::Continue(Some(Matched::new(m.as_str(), lead))),
                    Some(m) => MatchResult::matched(m.as_str(), lead),
                    None if rest.is_empty() || rest == "+" || rest == "-" || rest == "." => {
                        MatchResult::Continue(None)
                    }
                    None => MatchResult::Fail,
                }
            }
            Matcher::Null => MatchResult::matched("", 0),
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Literal { text, .. } => write!(f, "{text:?}"),
            Matcher::Pattern(p) => p.fmt(f),
            Matcher::Number(NumberKind::Integer) => f.write_str("integer"),
            Matcher::Number(NumberKind::Float) => f.write_str("number"),
            Matcher::Null => f.write_str("nothing"),
        }
    }
}

enum Prefix {
    /// The whole literal matched; byte length of the matched part of the input.
    Full(usize),
    /// The input is a strict prefix of the literal.
    Partial,
    Mismatch,
}

fn compare_prefix(input: &str, literal: &str, ignore_case: bool) -> Prefix {
    let mut chars = input.char_indices();
    for expected in literal.chars() {
        let Some((_, actual)) = chars.next() else {
            return Prefix::Partial;
        };
        let same = actual == expected || (ignore_case && actual.to_lowercase().eq(expected.to_lowercase()));
        if !same {
            return Prefix::Mismatch;
        }
    }
    Prefix::Full(chars.next().map_or(input.len(), |(idx, _)| idx))
}
