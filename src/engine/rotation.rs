//! Rotation: re-association of self-referential rules.
//!
//! A rule is *rotatable* when its first and last slots can both hold a value
//! of its own type, like `Add = left:Expr "+" right:Expr`. Such rules are
//! never entered left-recursively; instead, once a variant holds a populated
//! rotatable rule and parsing cannot continue, the rule is wrapped as slot 0 of
//! a fresh rule and population resumes at slot 1:
//!
//! ```text
//! input "1-2-3"      Sub(1, -, 2)   then "-3" remains
//!
//! rotate:            Sub( [Sub(1, -, 2)], -, _ )     resume at slot 1
//!                    Sub( [Sub(1, -, 2)], -, 3 )     left associative
//! ```
//!
//! After every populated rule, `sort_priorities` looks at its slot-0 child.
//! When that child is also rotatable and binds more loosely (lower priority),
//! the pair is re-associated once:
//!
//! ```text
//! unrotate:   X( K(a, op, b), op2, c )   ->   K( a, op, X(b, op2, c) )
//!
//!             Mul( Add(1, +, 2), *, 3 )  ->   Add( 1, +, Mul(2, *, 3) )
//! ```
//!
//! Nodes moved by a rotation are sealed: backtracking does not search inside
//! them, it retries the rotation as a whole instead.

use std::sync::Arc;

use super::token::{PartialToken, Rotation, RuleToken, Slot, TokenId, TokenKind, TokenTree, VariantToken};
use crate::schema::{RecordId, Schema, SlotKind};

impl TokenTree {
    /// Populated rule with at least three slots whose first and last slot
    /// accept its own record type.
    pub(crate) fn rotatable(&self, schema: &Schema, id: TokenId) -> bool {
        let Some(rule) = self.rule(id) else {
            return false;
        };
        let slots = schema.get(rule.record).slots();
        slots.len() >= 3
            && rule.next_slot == slots.len()
            && self.is_populated(schema, id)
            && schema.accepts(&slots[0].kind, rule.record)
            && schema.accepts(&slots[slots.len() - 1].kind, rule.record)
    }

    /// Candidates of `variant` that `inner` can be rotated into, in declaration order.
    pub(crate) fn rotation_targets(&self, schema: &Schema, variant: RecordId, inner: TokenId) -> Vec<RecordId> {
        let Some(inner_record) = self.record_of(inner) else {
            return Vec::new();
        };
        schema
            .get(variant)
            .candidates()
            .iter()
            .copied()
            .filter(|&candidate| {
                let slots = schema.get(candidate).slots();
                slots.len() >= 3
                    && schema.accepts(&slots[0].kind, inner_record)
                    && schema.accepts(&slots[slots.len() - 1].kind, candidate)
            })
            .collect()
    }

    /// Wrap `inner` as slot 0 of a new rule of type `target`.
    ///
    /// Returns the new rule, positioned at `inner`'s start and ready to open
    /// slot 1. `inner` is sealed; the caller restores it if the rotation fails.
    pub(crate) fn rotate(&mut self, schema: &Schema, inner: TokenId, target: RecordId, ignore: Arc<str>) -> TokenId {
        let location = self.get(inner).location.clone();
        let inner_ignore = Arc::clone(&self.get(inner).ignore);
        let slots = schema.get(target).slots();
        self.get_mut(inner).sealed = true;

        let holder = match slots[0].kind {
            SlotKind::Variant(record) => self.push(PartialToken {
                location: location.clone(),
                ignore: inner_ignore,
                sealed: true,
                kind: TokenKind::Variant(VariantToken {
                    record,
                    cursor: schema.get(record).candidates().len(),
                    child: Some(inner),
                    rotation: Rotation::Spent,
                }),
            }),
            _ => inner,
        };

        let mut values = vec![Slot::Pending; slots.len()];
        values[0] = Slot::Filled(holder);
        let outer = self.push(PartialToken {
            location,
            ignore,
            sealed: false,
            kind: TokenKind::Rule(RuleToken { record: target, next_slot: 1, values }),
        });
        tracing::debug!(
            inner = %self.describe(schema, inner),
            target = %schema.get(target).name,
            "rotate"
        );
        outer
    }

    /// Re-associate `id` with its slot-0 child when the child binds more
    /// loosely. Returns the node that now stands in `id`'s place.
    pub(crate) fn sort_priorities(&mut self, schema: &Schema, id: TokenId) -> TokenId {
        if !self.rotatable(schema, id) {
            return id;
        }
        let Some(rule) = self.rule(id) else {
            return id;
        };
        let Slot::Filled(first) = rule.values[0] else {
            return id;
        };
        let nested = match &self.get(first).kind {
            TokenKind::Variant(v) => v.child,
            TokenKind::Rule(_) => Some(first),
            _ => None,
        };
        let Some(nested) = nested.filter(|&k| k != id && self.rotatable(schema, k)) else {
            return id;
        };

        let outer_record = schema.get(rule.record);
        let Some(nested_record) = self.record_of(nested) else {
            return id;
        };
        let inner_type = schema.get(nested_record);
        if inner_type.priority >= outer_record.priority {
            return id;
        }
        let inner_slots = inner_type.slots();
        let last_kind = &inner_slots[inner_slots.len() - 1].kind;
        if !same_target(&outer_record.slots()[0].kind, last_kind) || !schema.accepts(last_kind, rule.record) {
            return id;
        }
        self.unrotate(schema, id, first, nested)
    }

    /// `X(first -> K(a, op, b), op2, c)` becomes `K(a, op, first -> X(b, op2, c))`.
    fn unrotate(&mut self, schema: &Schema, outer: TokenId, first: TokenId, nested: TokenId) -> TokenId {
        let Some(nested_rule) = self.rule(nested) else {
            return outer;
        };
        let last = nested_rule.values.len() - 1;
        let Slot::Filled(tail) = nested_rule.values[last] else {
            return outer;
        };
        let tail_location = self.get(tail).location.clone();

        if let Some(rule) = self.rule_mut(outer) {
            rule.values[0] = Slot::Filled(tail);
        }
        self.get_mut(outer).location = tail_location.clone();

        let moved = if first == nested {
            self.get_mut(outer).sealed = true;
            outer
        } else {
            if let Some(variant) = self.variant_mut(first) {
                variant.child = Some(outer);
                variant.rotation = Rotation::Spent;
            }
            let holder = self.get_mut(first);
            holder.location = tail_location;
            holder.sealed = true;
            first
        };
        if let Some(rule) = self.rule_mut(nested) {
            rule.values[last] = Slot::Filled(moved);
        }
        self.get_mut(nested).sealed = false;

        tracing::debug!(
            outer = %self.describe(schema, outer),
            nested = %self.describe(schema, nested),
            "unrotate"
        );
        nested
    }
}

fn same_target(a: &SlotKind, b: &SlotKind) -> bool {
    match (a, b) {
        (SlotKind::Variant(x), SlotKind::Variant(y)) | (SlotKind::SubRule(x), SlotKind::SubRule(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::ParserLocation;
    use crate::engine::matcher::{Matched, Matcher};
    use crate::engine::token::{SlotRef, TerminalToken};
    use crate::schema::{Grammar, SlotSpec};
    use crate::value::Value;

    struct Fixture {
        grammar: Grammar,
        tree: TokenTree,
    }

    impl Fixture {
        fn new() -> Self {
            let grammar = Grammar::builder()
                .variant("Expr", ["Num", "Add", "Mul"])
                .rule("Num", |r| r.slot(SlotSpec::integer("value")))
                .rule("Add", |r| r.record("left", "Expr").literal("op", "+").record("right", "Expr").priority(1))
                .rule("Mul", |r| r.record("left", "Expr").literal("op", "*").record("right", "Expr").priority(2))
                .build()
                .unwrap();
            Self { grammar, tree: TokenTree::default() }
        }

        fn id(&self, name: &str) -> RecordId {
            self.grammar.schema().lookup(name).unwrap()
        }

        fn node(&mut self, at: usize, kind: TokenKind) -> TokenId {
            let location = ParserLocation::start("mem").advance(&"x".repeat(at));
            self.tree.push(PartialToken { location, ignore: Arc::from(""), sealed: false, kind })
        }

        fn terminal(&mut self, record: &str, index: usize, at: usize, text: &str) -> TokenId {
            let slot = SlotRef { record: self.id(record), index };
            self.node(
                at,
                TokenKind::Terminal(TerminalToken {
                    slot,
                    matcher: Matcher::Null,
                    matched: Some(Matched { text: text.to_string(), consumed: text.len() }),
                    value: Some(Value::Text(text.to_string())),
                }),
            )
        }

        /// `Expr -> Num(text)` at `at`.
        fn number(&mut self, at: usize, text: &str) -> TokenId {
            let digits = self.terminal("Num", 0, at, text);
            let record = self.id("Num");
            let num = self.node(
                at,
                TokenKind::Rule(RuleToken { record, next_slot: 1, values: vec![Slot::Filled(digits)] }),
            );
            self.expr(at, Some(num))
        }

        fn expr(&mut self, at: usize, child: Option<TokenId>) -> TokenId {
            let record = self.id("Expr");
            self.node(at, TokenKind::Variant(VariantToken { record, cursor: 0, child, rotation: Rotation::Untried }))
        }

        fn binary(&mut self, name: &str, at: usize, left: TokenId, op_at: usize, op: &str, right: TokenId) -> TokenId {
            let op = self.terminal(name, 1, op_at, op);
            let record = self.id(name);
            self.node(
                at,
                TokenKind::Rule(RuleToken {
                    record,
                    next_slot: 3,
                    values: vec![Slot::Filled(left), Slot::Filled(op), Slot::Filled(right)],
                }),
            )
        }

        fn record_at(&self, id: TokenId) -> String {
            self.tree.describe(self.grammar.schema(), id)
        }

        fn child(&self, id: TokenId, slot: usize) -> TokenId {
            let Slot::Filled(child) = self.tree.rule(id).unwrap().values[slot] else {
                panic!("slot {slot} not filled");
            };
            match self.tree.variant(child) {
                Some(variant) => variant.child.unwrap(),
                None => child,
            }
        }
    }

    #[test]
    fn binary_rules_are_rotatable_and_numbers_are_not() {
        let mut fx = Fixture::new();
        let one = fx.number(0, "1");
        let two = fx.number(2, "2");
        let add = fx.binary("Add", 0, one, 1, "+", two);
        let schema = fx.grammar.schema();

        assert!(fx.tree.rotatable(schema, add));
        let num = fx.tree.variant(one).unwrap().child.unwrap();
        assert!(!fx.tree.rotatable(schema, num));

        let targets = fx.tree.rotation_targets(schema, fx.id("Expr"), add);
        assert_eq!(targets, vec![fx.id("Add"), fx.id("Mul")]);
    }

    #[test]
    fn rotate_wraps_inner_and_resumes_at_slot_one() {
        let mut fx = Fixture::new();
        let one = fx.number(0, "1");
        let two = fx.number(2, "2");
        let add = fx.binary("Add", 0, one, 1, "+", two);
        let target = fx.id("Mul");

        let outer = fx.tree.rotate(fx.grammar.schema(), add, target, Arc::from(""));
        let rule = fx.tree.rule(outer).unwrap();
        assert_eq!(rule.next_slot, 1);
        assert_eq!(fx.child(outer, 0), add);
        assert!(fx.tree.get(add).sealed);
        assert_eq!(fx.tree.get(outer).location.offset, 0);
    }

    #[test]
    fn lower_priority_child_is_unrotated() {
        let mut fx = Fixture::new();
        // Mul(Add(1, +, 2), *, 3)
        let one = fx.number(0, "1");
        let two = fx.number(2, "2");
        let add = fx.binary("Add", 0, one, 1, "+", two);
        let wrapped = fx.expr(0, Some(add));
        let three = fx.number(4, "3");
        let mul = fx.binary("Mul", 0, wrapped, 3, "*", three);

        let top = fx.tree.sort_priorities(fx.grammar.schema(), mul);
        assert_eq!(top, add);
        assert_eq!(fx.record_at(top), "Add");
        let right = fx.child(top, 2);
        assert_eq!(right, mul);
        assert_eq!(fx.tree.get(mul).location.offset, 2);
        assert_eq!(fx.record_at(fx.child(mul, 0)), "Num");
        assert_eq!(fx.tree.end(top), 5);
    }

    #[test]
    fn equal_or_higher_priority_child_stays() {
        let mut fx = Fixture::new();
        // Add(Mul(1, *, 2), +, 3)
        let one = fx.number(0, "1");
        let two = fx.number(2, "2");
        let mul = fx.binary("Mul", 0, one, 1, "*", two);
        let wrapped = fx.expr(0, Some(mul));
        let three = fx.number(4, "3");
        let add = fx.binary("Add", 0, wrapped, 3, "+", three);

        assert_eq!(fx.tree.sort_priorities(fx.grammar.schema(), add), add);
        assert_eq!(fx.child(add, 0), mul);
    }
}
