//! Line-oriented statements.
//!
//! ```text
//! Junction         = Statement | Comment | MultilineComment | Separator
//! Statement        = ":" command:/[^;\n]+/
//! Comment          = "//" comment:/[^\n]*/ ["\n"]
//! MultilineComment = "/*" comment:(text until "*/") "*/"
//! Separator        = value:/[\s\n]*;[\s\n]*/
//! Script           = tokens:Junction{2,4}
//! Bang             = "!" command:Statement
//! OptionalCommand  = ":" [command:/[^\s\n]+/]
//! Padded           = test:OptionalCommand " "
//! Tagged           = "<" tag:/[a-z]+/ ">" body:/[^<]*/ "</" close:=tag ">"
//! Setting          = verb:(set|unset) name:/[a-z_]+/ ["="] value:int   (value required after "=")
//! ```
//!
//! [`with_variables`] adds `Evaluatable = "$" name:/[^\s\n;]+/`, whose hook
//! appends `"test"` to the named entry of the caller's [`Variables`].

use std::collections::HashMap;

use crate::error::ConfigError;
use crate::schema::{Grammar, GrammarBuilder, SlotSpec};

/// Context of the [`with_variables`] grammar.
pub type Variables = HashMap<String, String>;

/// Record types a parse may start from.
pub const ROOTS: &[&str] =
    &["Junction", "Statement", "Script", "Bang", "Padded", "Tagged", "Setting"];

pub fn grammar() -> Result<Grammar, ConfigError> {
    define(GrammarBuilder::new()).build()
}

pub fn with_variables() -> Result<Grammar<Variables>, ConfigError> {
    define(GrammarBuilder::new())
        .rule("Evaluatable", |r| r.literal("marker", "$").pattern("name", r"[^\s\n;]+"))
        .on_populated("Evaluatable", |record, vars: &mut Variables| {
            let Some(name) = record.get("name").and_then(|v| v.as_str()) else {
                return;
            };
            let current = vars.get(name).map(String::as_str).unwrap_or("null");
            let updated = format!("{current}test");
            vars.insert(name.to_string(), updated);
        })
        .build()
}

fn define<C>(builder: GrammarBuilder<C>) -> GrammarBuilder<C> {
    builder
        .variant("Junction", ["Statement", "Comment", "MultilineComment", "Separator"])
        .rule("Statement", |r| r.literal("marker", ":").pattern("command", r"[^;\n]+"))
        .rule("Comment", |r| {
            r.literal("marker", "//").pattern("comment", r"[^\n]*").slot(SlotSpec::literal("tail", "\n").optional())
        })
        .rule("MultilineComment", |r| {
            r.literal("marker", "/*").slot(SlotSpec::until("comment", r"\*/")).literal("tail", "*/")
        })
        .rule("Separator", |r| r.pattern("value", r"[\s\n]*;[\s\n]*"))
        .rule("Script", |r| r.slot(SlotSpec::collection("tokens", "Junction", 2, Some(4))))
        .rule("Bang", |r| r.literal("marker", "!").record("command", "Statement"))
        .rule("OptionalCommand", |r| {
            r.literal("marker", ":").slot(SlotSpec::pattern("command", r"[^\s\n]+").optional())
        })
        .rule("Padded", |r| r.record("test", "OptionalCommand").literal("space", " "))
        .rule("Tagged", |r| {
            r.literal("open", "<")
                .pattern("tag", "[a-z]+")
                .literal("open_end", ">")
                .pattern("body", "[^<]*")
                .literal("close", "</")
                .slot(SlotSpec::context_equals("close_tag", "tag"))
                .literal("close_end", ">")
        })
        .rule("Setting", |r| {
            r.slot(SlotSpec::enumeration("verb", ["set", "unset"]).ignore_case())
                .pattern("name", "[a-z_]+")
                .slot(SlotSpec::literal("eq", "=").optional())
                .slot(SlotSpec::integer("value").optional_when_null("eq"))
                .ignore_characters(" \t", false)
        })
}
