//! Input buffer and read position.
//!
//! `ParserState` is the only place that touches the reader. Input is pulled
//! lazily, one line at a time, whenever a matcher reports that it needs more
//! text to decide. Everything read so far stays in `text`, so backtracking can
//! move the read position backwards without re-reading.
//!
//! ```text
//! text:     ":hello; // comment\n/* multi"
//!                   ^ location.offset
//! buffer(): "; // comment\n/* multi"
//! ```

use std::io::{self, BufRead};

use super::location::ParserLocation;

pub(crate) struct ParserState<R> {
    reader: R,
    text: String,
    location: ParserLocation,
    exhausted: bool,
}

impl<R: BufRead> ParserState<R> {
    pub(crate) fn new(reader: R, source: &str) -> Self {
        Self { reader, text: String::new(), location: ParserLocation::start(source), exhausted: false }
    }

    /// Unconsumed input that has already been read.
    pub(crate) fn buffer(&self) -> &str {
        &self.text[self.location.offset..]
    }

    pub(crate) fn location(&self) -> &ParserLocation {
        &self.location
    }

    /// Read one more line into the buffer. Returns `false` once the reader is
    /// exhausted.
    pub(crate) fn fill(&mut self) -> io::Result<bool> {
        if self.exhausted {
            return Ok(false);
        }
        let read = self.reader.read_line(&mut self.text)?;
        if read == 0 {
            self.exhausted = true;
            return Ok(false);
        }
        tracing::trace!(bytes = read, total = self.text.len(), "buffer filled");
        Ok(true)
    }

    /// True when every character of the input has been consumed.
    pub(crate) fn at_end(&mut self) -> io::Result<bool> {
        while self.location.offset == self.text.len() {
            if !self.fill()? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Move the read position forward by `len` bytes of the buffer.
    pub(crate) fn consume(&mut self, len: usize) {
        let end = self.location.offset + len;
        self.location = self.location.advance(&self.text[self.location.offset..end]);
    }

    /// Return everything after `location` to the buffer.
    pub(crate) fn rewind(&mut self, location: &ParserLocation) {
        if location.offset < self.location.offset {
            tracing::trace!(
                at = %location,
                returned = ?&self.text[location.offset..self.location.offset],
                "pushback"
            );
        }
        self.location = location.clone();
    }

    /// Location of `offset`, computed forward from a known earlier location.
    pub(crate) fn locate(&self, from: &ParserLocation, offset: usize) -> ParserLocation {
        from.advance(&self.text[from.offset..offset])
    }

    /// Everything read so far from `offset` on.
    pub(crate) fn text_from(&self, offset: usize) -> &str {
        &self.text[offset..]
    }

    /// Read whatever is left in the reader and return the unconsumed tail.
    pub(crate) fn drain_remaining(&mut self) -> io::Result<&str> {
        while self.fill()? {}
        Ok(self.buffer())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_reads_line_by_line() {
        let mut state = ParserState::new("one\ntwo".as_bytes(), "mem");
        assert_eq!(state.buffer(), "");
        assert!(state.fill().unwrap());
        assert_eq!(state.buffer(), "one\n");
        assert!(state.fill().unwrap());
        assert_eq!(state.buffer(), "one\ntwo");
        assert!(!state.fill().unwrap());
    }

    #[test]
    fn rewind_restores_consumed_text() {
        let mut state = ParserState::new("abc".as_bytes(), "mem");
        state.fill().unwrap();
        let start = state.location().clone();
        state.consume(2);
        assert_eq!(state.buffer(), "c");
        state.rewind(&start);
        assert_eq!(state.buffer(), "abc");
    }

    #[test]
    fn at_end_pulls_more_input_before_answering() {
        let mut state = ParserState::new("x\n".as_bytes(), "mem");
        assert!(!state.at_end().unwrap());
        state.consume(2);
        assert!(state.at_end().unwrap());
        assert_eq!(state.location().line, 2);
    }

    #[test]
    fn drain_remaining_returns_unread_tail() {
        let mut state = ParserState::new("a\nb\nc".as_bytes(), "mem");
        state.fill().unwrap();
        state.consume(1);
        assert_eq!(state.drain_remaining().unwrap(), "\nb\nc");
    }
}
