//! Value assembly.
//!
//! Once the tokenizer has a populated root, the partial-token tree is turned
//! into a [`Value`] tree:
//!
//! - a rule becomes a [`Record`] with one field per slot, in slot order;
//!   skipped and never-opened optional slots get the slot kind's empty value;
//! - a variant is transparent and yields its child's value;
//! - a collection yields a list of its elements;
//! - a terminal yields its converted value.
//!
//! Population hooks run post-order: every nested record's hook has fired
//! before its parent's. Only records in the final tree are visited, so a hook
//! never sees a branch that backtracking discarded.

use super::token::{Slot, TokenId, TokenKind, TokenTree};
use crate::schema::Grammar;
use crate::value::{Record, Value};

pub(crate) fn assemble<C>(grammar: &Grammar<C>, tree: &TokenTree, id: TokenId, ctx: &mut C) -> Value {
    match &tree.get(id).kind {
        TokenKind::Terminal(terminal) => terminal.value.clone().unwrap_or(Value::Null),
        TokenKind::Variant(variant) => match variant.child {
            Some(child) => assemble(grammar, tree, child, ctx),
            None => Value::Null,
        },
        TokenKind::Collection(collection) => {
            Value::List(collection.elements.iter().map(|&element| assemble(grammar, tree, element, ctx)).collect())
        }
        TokenKind::Rule(rule) => {
            let record_type = grammar.schema().get(rule.record);
            let mut record = Record::new(record_type.name.clone());
            for (slot, descriptor) in rule.values.iter().zip(record_type.slots()) {
                let value = match slot {
                    Slot::Filled(child) => assemble(grammar, tree, *child, ctx),
                    Slot::Pending | Slot::Skipped => descriptor.kind.empty_value(),
                };
                record.fields.push((descriptor.name.clone(), value));
            }
            if let Some(hook) = grammar.hook(rule.record) {
                tracing::trace!(record = %record.type_name, "population hook");
                hook(&record, ctx);
            }
            Value::Record(record)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::engine::ParserLocation;
    use crate::engine::matcher::{Matched, Matcher};
    use crate::engine::token::{PartialToken, Rotation, RuleToken, SlotRef, TerminalToken, VariantToken};
    use crate::schema::{GrammarBuilder, SlotSpec};

    #[test]
    fn rules_become_records_and_hooks_run_post_order() {
        let grammar = GrammarBuilder::<Vec<String>>::new()
            .variant("Item", ["Word"])
            .rule("Word", |r| r.pattern("text", "[a-z]+").slot(SlotSpec::literal("bang", "!").optional()))
            .rule("Pair", |r| r.record("item", "Item"))
            .on_populated("Word", |record, seen: &mut Vec<String>| seen.push(format!("word {record}")))
            .on_populated("Pair", |_, seen: &mut Vec<String>| seen.push("pair".to_string()))
            .build()
            .unwrap();
        let schema = grammar.schema();
        let word = schema.lookup("Word").unwrap();
        let item = schema.lookup("Item").unwrap();
        let pair = schema.lookup("Pair").unwrap();

        let mut tree = TokenTree::default();
        let at = ParserLocation::start("mem");
        let node = |kind| PartialToken { location: at.clone(), ignore: Arc::from(""), sealed: false, kind };
        let text = tree.push(node(TokenKind::Terminal(TerminalToken {
            slot: SlotRef { record: word, index: 0 },
            matcher: Matcher::Null,
            matched: Some(Matched { text: "hi".to_string(), consumed: 2 }),
            value: Some(Value::Text("hi".to_string())),
        })));
        let word_id = tree.push(node(TokenKind::Rule(RuleToken {
            record: word,
            next_slot: 2,
            values: vec![Slot::Filled(text), Slot::Skipped],
        })));
        let item_id = tree.push(node(TokenKind::Variant(VariantToken {
            record: item,
            cursor: 0,
            child: Some(word_id),
            rotation: Rotation::Untried,
        })));
        let root = tree.push(node(TokenKind::Rule(RuleToken {
            record: pair,
            next_slot: 1,
            values: vec![Slot::Filled(item_id)],
        })));

        let mut seen = Vec::new();
        let value = assemble(&grammar, &tree, root, &mut seen);
        assert_eq!(value.to_string(), "Pair(item: Word(text: \"hi\", bang: null))");
        assert_eq!(seen, vec!["word Word(text: \"hi\", bang: null)".to_string(), "pair".to_string()]);
    }
}
