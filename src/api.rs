use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use crate::engine::{self, ParserLocation, RunMetrics};
use crate::error::{ConfigError, ParseError};
use crate::schema::{Grammar, RecordId};
use crate::value::{FromValue, Value};

/// Options that affect parsing.
#[derive(Debug, Clone)]
pub struct Options {
    /// Name of the input, used in every [`ParserLocation`].
    pub source: String,
}

impl Default for Options {
    fn default() -> Self {
        Self { source: "<input>".to_string() }
    }
}

/// Result of [`TokenGrammar::parse_verbose`].
#[derive(Debug, Clone)]
pub struct ParseOutcome {
    pub value: Value,
    /// Bytes held by the root record, excluding trailing ignored characters.
    /// Offsets are byte offsets throughout, so for non-ASCII input this is
    /// larger than the number of characters; `end.column` counts characters.
    pub consumed: usize,
    /// Location just past the root record.
    pub end: ParserLocation,
    pub metrics: RunMetrics,
}

/// A grammar bound to the record type every parse starts from.
///
/// Cheap to clone; the grammar itself is shared.
///
/// # Example
/// ```
/// use shapeparse::{Grammar, TokenGrammar};
///
/// let grammar = Grammar::builder()
///     .rule("Statement", |r| r.literal("marker", ":").pattern("name", "[a-z]+"))
///     .build()
///     .unwrap();
/// let parser = TokenGrammar::new(grammar, "Statement").unwrap();
///
/// let value = parser.parse_str(":test", &mut ()).unwrap();
/// assert_eq!(value.as_record().unwrap().get_as::<String>("name").unwrap(), "test");
/// ```
pub struct TokenGrammar<C = ()> {
    grammar: Arc<Grammar<C>>,
    root: RecordId,
    options: Options,
}

impl<C> Clone for TokenGrammar<C> {
    fn clone(&self) -> Self {
        Self { grammar: Arc::clone(&self.grammar), root: self.root, options: self.options.clone() }
    }
}

impl<C> std::fmt::Debug for TokenGrammar<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrammar")
            .field("root", &self.grammar.schema().get(self.root).name)
            .field("options", &self.options)
            .finish()
    }
}

impl<C> TokenGrammar<C> {
    /// Bind `grammar` to its root record type `root`.
    pub fn new(grammar: impl Into<Arc<Grammar<C>>>, root: &str) -> Result<Self, ConfigError> {
        let grammar = grammar.into();
        let root = grammar.schema().lookup(root).ok_or_else(|| ConfigError::UnknownRecord(root.to_string()))?;
        Ok(Self { grammar, root, options: Options::default() })
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn grammar(&self) -> &Grammar<C> {
        &self.grammar
    }

    /// Populate one root record from the start of `reader`.
    ///
    /// Input after the record is left unread and is not an error.
    pub fn tokenize<R: BufRead>(&self, reader: R, context: &mut C) -> Result<Value, ParseError> {
        self.run(reader, context, false).map(|outcome| outcome.value)
    }

    /// Parse the whole of `reader` as one root record.
    ///
    /// Fails with [`ParseError::TrailingInput`] if anything other than
    /// whitespace or the root's ignored characters follows the record.
    pub fn parse<R: BufRead>(&self, reader: R, context: &mut C) -> Result<Value, ParseError> {
        self.run(reader, context, true).map(|outcome| outcome.value)
    }

    pub fn parse_str(&self, input: &str, context: &mut C) -> Result<Value, ParseError> {
        self.parse(input.as_bytes(), context)
    }

    /// Parse and convert the result into `T`.
    pub fn parse_as<T: FromValue, R: BufRead>(&self, reader: R, context: &mut C) -> Result<T, ParseError> {
        let value = self.parse(reader, context)?;
        Ok(T::from_value(value)?)
    }

    /// Like [`parse`](Self::parse), but also returns how much input the root
    /// held and the run metrics.
    pub fn parse_verbose<R: BufRead>(&self, reader: R, context: &mut C) -> Result<ParseOutcome, ParseError> {
        self.run(reader, context, true)
    }

    fn run<R: BufRead>(&self, reader: R, context: &mut C, check_trailing: bool) -> Result<ParseOutcome, ParseError> {
        let mut tokenizer = engine::Tokenizer::new(self.grammar.schema(), reader, &self.options.source);
        let root = tokenizer.run(self.root, check_trailing)?;

        let start = Instant::now();
        let value = engine::assemble(&self.grammar, tokenizer.tree(), root, context);
        let mut metrics = tokenizer.metrics().clone();
        metrics.resolve = start.elapsed();

        Ok(ParseOutcome { value, consumed: tokenizer.tree().consumed(root), end: tokenizer.end_location(root), metrics })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::BufReader;

    use super::*;
    use crate::schema::{GrammarBuilder, SlotSpec};
    use crate::value::Record;

    fn statement() -> TokenGrammar {
        let grammar = Grammar::builder()
            .rule("Statement", |r| r.literal("marker", ":").pattern("name", "[a-z]+"))
            .build()
            .unwrap();
        TokenGrammar::new(grammar, "Statement").unwrap()
    }

    #[test]
    fn unknown_root_is_a_config_error() {
        let grammar = Grammar::builder().rule("A", |r| r.literal("x", "x")).build().unwrap();
        assert!(matches!(TokenGrammar::new(grammar, "B"), Err(ConfigError::UnknownRecord(ref name)) if name == "B"));
    }

    #[test]
    fn tokenize_stops_after_the_root_and_parse_checks_the_rest() {
        let parser = statement();
        let value = parser.tokenize(":test:test".as_bytes(), &mut ()).unwrap();
        assert_eq!(value.to_string(), "Statement(marker: \":\", name: \"test\")");

        let err = parser.parse(":test:test".as_bytes(), &mut ()).unwrap_err();
        match err {
            ParseError::TrailingInput { tail, location } => {
                assert_eq!(tail, ":test");
                assert_eq!(location.offset, 5);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn verbose_reports_consumed_input_and_metrics() {
        let parser = statement().with_options(Options { source: "inline".to_string() });
        let outcome = parser.parse_verbose(":test  \n".as_bytes(), &mut ()).unwrap();
        assert_eq!(outcome.consumed, 5);
        assert_eq!(outcome.end.to_string(), "inline:1:6");
        assert!(outcome.metrics.steps > 0);
        assert!(outcome.metrics.matcher_calls >= 2);
        assert_eq!(outcome.metrics.rotations, 0);
    }

    #[test]
    fn consumed_counts_bytes_and_columns_count_characters() {
        let grammar = Grammar::builder().rule("Word", |r| r.pattern("text", r"\w+")).build().unwrap();
        let parser = TokenGrammar::new(grammar, "Word").unwrap();
        let outcome = parser.parse_verbose("héllo".as_bytes(), &mut ()).unwrap();
        assert_eq!(outcome.consumed, 6);
        assert_eq!(outcome.end.offset, 6);
        assert_eq!(outcome.end.column, 6);
    }

    #[test]
    fn parse_as_converts_the_root() {
        let record: Record = statement().parse_as(":abc".as_bytes(), &mut ()).unwrap();
        assert!(record.is("Statement"));

        let err = statement().parse_as::<i64, _>(":abc".as_bytes(), &mut ()).unwrap_err();
        assert!(matches!(err, ParseError::Conversion(_)));
    }

    #[test]
    fn syntax_errors_point_at_the_furthest_failure() {
        let err = statement().parse_str(":42", &mut ()).unwrap_err();
        let ParseError::Syntax(err) = err else {
            panic!("expected a syntax error");
        };
        assert_eq!(err.location.column, 2);
        assert_eq!(err.found, "\"42\"");
        assert_eq!(err.trail, vec!["Statement".to_string(), "Statement.name".to_string()]);
    }

    #[test]
    fn hooks_receive_the_callers_context() {
        let grammar = GrammarBuilder::<HashMap<String, String>>::new()
            .rule("Evaluatable", |r| r.literal("marker", "$").slot(SlotSpec::pattern("name", r"[^\s;]+")))
            .on_populated("Evaluatable", |record, vars: &mut HashMap<String, String>| {
                if let Ok(name) = record.get_as::<String>("name") {
                    let current = vars.get(&name).cloned().unwrap_or_default();
                    vars.insert(name, format!("{current}test"));
                }
            })
            .build()
            .unwrap();
        let parser = TokenGrammar::new(grammar, "Evaluatable").unwrap();

        let mut vars = HashMap::from([("test".to_string(), "100".to_string())]);
        parser.parse(BufReader::new("$test".as_bytes()), &mut vars).unwrap();
        assert_eq!(vars["test"], "100test");
    }

    #[test]
    fn token_grammar_is_shareable_between_threads() {
        let parser = statement();
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let parser = parser.clone();
                std::thread::spawn(move || parser.parse_str(&format!(":t{}", "x".repeat(n)), &mut ()).is_ok())
            })
            .collect();
        assert!(handles.into_iter().all(|h| h.join().unwrap()));
    }
}
