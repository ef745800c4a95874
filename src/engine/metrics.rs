//! Tokenizer run metrics.
//!
//! Every run collects a handful of counters. They are cheap (plain integer
//! increments) and are surfaced through `TokenGrammar::parse_verbose` and the
//! CLI report.
//!
//! ## Reading the numbers
//!
//! - `steps` counts iterations of the driver loop, the closest thing to a cost
//!   measure for a parse.
//! - A high `backtracks`/`steps` ratio points at a grammar that relies on
//!   trial and error (for example a variant whose early candidates share long
//!   prefixes with later ones).
//! - `rotations` and `unrotations` show how much operator re-association
//!   happened.

use std::time::Duration;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunMetrics {
    /// Time spent in the tokenizer.
    pub total: Duration,
    /// Time spent assembling the value tree and running hooks.
    pub resolve: Duration,
    /// Iterations of the driver loop.
    pub steps: usize,
    /// Matcher applications, including retries after reading more input.
    pub matcher_calls: usize,
    /// Times a failure was routed through the backtrack protocol.
    pub backtracks: usize,
    pub rotations: usize,
    pub unrotations: usize,
    /// Partial tokens created, including ones later discarded.
    pub tokens_created: usize,
    /// Deepest stack of open tokens.
    pub max_depth: usize,
}

impl RunMetrics {
    pub(crate) fn observe_depth(&mut self, depth: usize) {
        self.max_depth = self.max_depth.max(depth);
    }
}
