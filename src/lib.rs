//! Record-shaped backtracking parser.
//!
//! A grammar is a set of record types. A *rule* is an ordered list of typed
//! slots (literals, patterns, numbers, enumerators, nested records and
//! collections); a *variant* is a list of candidate records tried in order.
//! Parsing populates one root record from a byte stream, backtracking through
//! variant candidates and optional slots, and regrouping self-referential
//! rules so that operator chains come out left-associative and respect
//! per-record priorities.
//!
//! ```
//! use shapeparse::{Grammar, SlotSpec, TokenGrammar};
//!
//! let grammar = Grammar::builder()
//!     .variant("Expr", ["Num", "Add"])
//!     .rule("Num", |r| r.slot(SlotSpec::integer("value")))
//!     .rule("Add", |r| r.record("left", "Expr").literal("op", "+").record("right", "Expr"))
//!     .build()
//!     .unwrap();
//! let parser = TokenGrammar::new(grammar, "Expr").unwrap();
//!
//! let value = parser.parse_str("1+2+3", &mut ()).unwrap();
//! assert_eq!(value.to_source(), "1+2+3");
//! let left = value.as_record().and_then(|add| add.get("left")).and_then(|v| v.as_record());
//! assert!(left.is_some_and(|left| left.is("Add")));
//! ```

#[macro_use]
mod macros;
mod api;
mod engine;

pub mod error;
pub mod grammars;
pub mod schema;
pub mod value;

pub use api::{Options, ParseOutcome, TokenGrammar};
pub use engine::{CapturePattern, NumberKind, ParserLocation, RunMetrics};
pub use error::{ConfigError, ConversionError, ParseError, SyntaxError};
pub use schema::{Grammar, GrammarBuilder, RecordId, SlotSpec};
pub use value::{FromValue, Record, Value};
