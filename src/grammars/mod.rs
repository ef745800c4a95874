//! Bundled grammars.
//!
//! - [`statements`]: colon commands, comments and separators, plus the
//!   collection and variable-substitution records built on them.
//! - [`arithmetic`]: infix arithmetic with the usual precedence and left
//!   associativity, produced by rotation.
//!
//! Both are used by the `shapeparse` binary and double as worked examples of
//! the builder API.

pub mod arithmetic;
pub mod statements;

#[cfg(test)]
mod tests;
