//! Tokenizing and resolution engine.
//!
//! The engine turns a byte stream into a tree of partial tokens, one per
//! grammar element being populated, and then into a [`Value`](crate::Value).
//! It is split into focused submodules under `src/engine/`.
//!
//! ## How the parts work together
//!
//! ```text
//! reader ── ParserState (state.rs) ───────── lines pulled on demand
//!                  │
//!                  v
//!          Tokenizer::run (parser.rs)
//!            - open the root record
//!            - advance the top of the stack of open tokens
//!            - terminals: Matcher::apply (matcher.rs)
//!            - failure: backtrack to the latest choice point
//!            - variants: rotate / sort priorities (rotation.rs)
//!                  │
//!                  v
//!          TokenTree (token.rs) ─── populated root
//!                  │
//!                  v
//!          assemble (resolve.rs) ── Value tree + population hooks
//! ```
//!
//! ## Responsibilities by module
//!
//! - `location.rs`: source name, byte offset, line and column.
//! - `state.rs`: the input buffer, lazy line reads and pushback.
//! - `matcher.rs`: terminal matchers and their streaming answers.
//! - `token.rs`: the arena of partial tokens.
//! - `rotation.rs`: left-to-right regrouping of self-referential rules and
//!   priority sorting.
//! - `parser.rs`: the tokenizer driver and backtracking.
//! - `resolve.rs`: value assembly and hooks.
//! - `metrics.rs`: counters surfaced by `parse_verbose` and the CLI.
//!
//! ## Debugging
//!
//! The engine logs through `tracing`. `debug` shows rotations, forced
//! completions and run summaries; `trace` adds every slot, match, pushback
//! and retry.

#[path = "engine/location.rs"]
mod location;
#[path = "engine/matcher.rs"]
mod matcher;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/parser.rs"]
mod parser;
#[path = "engine/resolve.rs"]
mod resolve;
#[path = "engine/rotation.rs"]
mod rotation;
#[path = "engine/state.rs"]
mod state;
#[path = "engine/token.rs"]
mod token;

pub use location::ParserLocation;
pub use matcher::{CapturePattern, NumberKind};
pub use metrics::RunMetrics;

pub(crate) use parser::Tokenizer;
pub(crate) use resolve::assemble;
