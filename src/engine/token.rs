//! Partial tokens: the parse tree under construction.
//!
//! Every grammar element being populated gets one node in a [`TokenTree`]
//! arena. Nodes refer to their children by [`TokenId`]; there are no parent
//! pointers, the tokenizer's stack of open ids plays that role.
//!
//! ```text
//! Rule      Add            values: [Filled(#3), Filled(#7), Pending]
//!            ├─ Variant Expr       child: #4, cursor 0
//!            │   └─ Rule Num ...
//!            ├─ Terminal "+"       matched "+"
//!            └─ (pending)
//! ```
//!
//! Nodes discarded by backtracking stay in the arena, unreachable. A parse is
//! short-lived, so the arena is simply dropped with the tokenizer.

use std::sync::Arc;

use super::location::ParserLocation;
use super::matcher::{Matched, Matcher};
use crate::schema::{CaptureLimit, RecordId, Schema};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct TokenId(pub usize);

/// Slot `index` of rule `record`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SlotRef {
    pub record: RecordId,
    pub index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Slot {
    Pending,
    Filled(TokenId),
    Skipped,
}

#[derive(Debug, Clone)]
pub(crate) struct RuleToken {
    pub record: RecordId,
    /// Index of the next slot to open.
    pub next_slot: usize,
    pub values: Vec<Slot>,
}

/// Rotation bookkeeping of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Rotation {
    Untried,
    /// `inner` is wrapped into a new rule of rotation target number `next - 1`.
    Trying { inner: TokenId, inner_end: usize, next: usize },
    Spent,
}

#[derive(Debug, Clone)]
pub(crate) struct VariantToken {
    pub record: RecordId,
    /// Candidate currently being tried.
    pub cursor: usize,
    pub child: Option<TokenId>,
    pub rotation: Rotation,
}

#[derive(Debug, Clone)]
pub(crate) struct CollectionToken {
    pub element: RecordId,
    pub limit: CaptureLimit,
    pub elements: Vec<TokenId>,
    /// No more elements will be attempted.
    pub closed: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct TerminalToken {
    pub slot: SlotRef,
    pub matcher: Matcher,
    pub matched: Option<Matched>,
    pub value: Option<Value>,
}

#[derive(Debug, Clone)]
pub(crate) enum TokenKind {
    Rule(RuleToken),
    Variant(VariantToken),
    Collection(CollectionToken),
    Terminal(TerminalToken),
}

#[derive(Debug, Clone)]
pub(crate) struct PartialToken {
    pub location: ParserLocation,
    /// Effective ignore characters for terminals below this node.
    pub ignore: Arc<str>,
    /// Closed to backtracking: the search for alternatives does not enter it.
    pub sealed: bool,
    pub kind: TokenKind,
}

#[derive(Debug, Default)]
pub(crate) struct TokenTree {
    nodes: Vec<PartialToken>,
}

impl TokenTree {
    pub fn push(&mut self, token: PartialToken) -> TokenId {
        self.nodes.push(token);
        TokenId(self.nodes.len() - 1)
    }

    pub fn get(&self, id: TokenId) -> &PartialToken {
        &self.nodes[id.0]
    }

    pub fn get_mut(&mut self, id: TokenId) -> &mut PartialToken {
        &mut self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn rule(&self, id: TokenId) -> Option<&RuleToken> {
        match &self.get(id).kind {
            TokenKind::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn rule_mut(&mut self, id: TokenId) -> Option<&mut RuleToken> {
        match &mut self.get_mut(id).kind {
            TokenKind::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn variant(&self, id: TokenId) -> Option<&VariantToken> {
        match &self.get(id).kind {
            TokenKind::Variant(variant) => Some(variant),
            _ => None,
        }
    }

    pub fn variant_mut(&mut self, id: TokenId) -> Option<&mut VariantToken> {
        match &mut self.get_mut(id).kind {
            TokenKind::Variant(variant) => Some(variant),
            _ => None,
        }
    }

    pub fn collection_mut(&mut self, id: TokenId) -> Option<&mut CollectionToken> {
        match &mut self.get_mut(id).kind {
            TokenKind::Collection(collection) => Some(collection),
            _ => None,
        }
    }

    /// Record type of a rule or variant node.
    pub fn record_of(&self, id: TokenId) -> Option<RecordId> {
        match &self.get(id).kind {
            TokenKind::Rule(rule) => Some(rule.record),
            TokenKind::Variant(variant) => Some(variant.record),
            _ => None,
        }
    }

    /// Byte offset just past the last character held by `id`.
    pub fn end(&self, id: TokenId) -> usize {
        let token = self.get(id);
        let last_child = match &token.kind {
            TokenKind::Terminal(t) => {
                return token.location.offset + t.matched.as_ref().map_or(0, |m| m.consumed);
            }
            TokenKind::Rule(rule) => rule.values.iter().rev().find_map(|slot| match slot {
                Slot::Filled(child) => Some(*child),
                _ => None,
            }),
            TokenKind::Variant(variant) => variant.child,
            TokenKind::Collection(collection) => collection.elements.last().copied(),
        };
        last_child.map_or(token.location.offset, |child| self.end(child))
    }

    /// Number of bytes held by `id`.
    pub fn consumed(&self, id: TokenId) -> usize {
        self.end(id) - self.get(id).location.offset
    }

    /// Swap `old` for `new` wherever `parent` holds it.
    pub fn replace_child(&mut self, parent: TokenId, old: TokenId, new: TokenId) {
        if old == new {
            return;
        }
        match &mut self.get_mut(parent).kind {
            TokenKind::Rule(rule) => {
                for slot in rule.values.iter_mut() {
                    if *slot == Slot::Filled(old) {
                        *slot = Slot::Filled(new);
                    }
                }
            }
            TokenKind::Variant(variant) => {
                if variant.child == Some(old) {
                    variant.child = Some(new);
                }
            }
            TokenKind::Collection(collection) => {
                for element in collection.elements.iter_mut() {
                    if *element == old {
                        *element = new;
                    }
                }
            }
            TokenKind::Terminal(_) => {}
        }
    }

    /// Whether `id` holds a complete value.
    ///
    /// Rules are scanned from the last slot backwards: a filled, populated slot
    /// or a skipped slot settles the answer; an unfilled slot is only
    /// acceptable when it is optional.
    pub fn is_populated(&self, schema: &Schema, id: TokenId) -> bool {
        match &self.get(id).kind {
            TokenKind::Terminal(t) => t.matched.is_some(),
            TokenKind::Variant(v) => v.child.is_some_and(|child| self.is_populated(schema, child)),
            TokenKind::Collection(c) => {
                c.elements.len() >= c.limit.min && (c.closed || !c.limit.allows_more(c.elements.len()))
            }
            TokenKind::Rule(rule) => {
                let slots = schema.get(rule.record).slots();
                for (idx, slot) in rule.values.iter().enumerate().rev() {
                    match slot {
                        Slot::Filled(child) if self.is_populated(schema, *child) => return true,
                        Slot::Skipped => return true,
                        _ if slots[idx].is_optional() => continue,
                        _ => return false,
                    }
                }
                true
            }
        }
    }

    /// Short label for traces and error trails.
    pub fn describe(&self, schema: &Schema, id: TokenId) -> String {
        match &self.get(id).kind {
            TokenKind::Rule(rule) => schema.get(rule.record).name.clone(),
            TokenKind::Variant(v) => schema.get(v.record).name.clone(),
            TokenKind::Collection(c) => format!("[{}]", schema.get(c.element).name),
            TokenKind::Terminal(t) => {
                let record = schema.get(t.slot.record);
                format!("{}.{}", record.name, record.slots()[t.slot.index].name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Grammar, SlotSpec};

    fn terminal(tree: &mut TokenTree, record: RecordId, index: usize, at: usize, text: &str) -> TokenId {
        let location = ParserLocation::start("mem").advance(&" ".repeat(at));
        tree.push(PartialToken {
            location,
            ignore: Arc::from(""),
            sealed: false,
            kind: TokenKind::Terminal(TerminalToken {
                slot: SlotRef { record, index },
                matcher: Matcher::Null,
                matched: Some(Matched { text: text.to_string(), consumed: text.len() }),
                value: Some(Value::Text(text.to_string())),
            }),
        })
    }

    #[test]
    fn end_and_populated_follow_the_last_filled_slot() {
        let grammar = Grammar::builder()
            .rule("Cmd", |r| {
                r.literal("marker", ":").pattern("name", "[a-z]+").slot(SlotSpec::literal("tail", ";").optional())
            })
            .build()
            .unwrap();
        let schema = grammar.schema();
        let cmd = schema.lookup("Cmd").unwrap();

        let mut tree = TokenTree::default();
        let marker = terminal(&mut tree, cmd, 0, 0, ":");
        let name = terminal(&mut tree, cmd, 1, 1, "test");
        let rule = tree.push(PartialToken {
            location: ParserLocation::start("mem"),
            ignore: Arc::from(""),
            sealed: false,
            kind: TokenKind::Rule(RuleToken {
                record: cmd,
                next_slot: 2,
                values: vec![Slot::Filled(marker), Slot::Filled(name), Slot::Pending],
            }),
        });

        assert_eq!(tree.end(rule), 5);
        assert_eq!(tree.consumed(rule), 5);
        assert!(tree.is_populated(schema, rule));
        assert_eq!(tree.describe(schema, name), "Cmd.name");

        tree.rule_mut(rule).unwrap().values[1] = Slot::Pending;
        assert!(!tree.is_populated(schema, rule));
    }
}
