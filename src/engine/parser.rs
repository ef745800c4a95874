//! Tokenizer driver: the token-construction automaton.
//!
//! The driver owns a stack of open partial tokens. Each step it asks the top
//! of the stack what it needs next:
//!
//! ```text
//!            ┌──────────── Descend(child) ── push child ◀──────┐
//!            │                                                 │
//! advance(top) ── Populated ── complete: pop, sort priorities, │
//!            │                 fold into parent ── advance(parent)
//!            │
//!            └── Failed ──── backtrack: pop, ask each parent to
//!                            recover (skip, retry, rotate) or fail
//!                            upward; empty stack = SyntaxError
//! ```
//!
//! Terminals call their matcher on the buffer. `Continue` reads another line
//! and tries again; at end of input a tentative match is accepted as is.
//!
//! ## Backtracking
//!
//! When a child fails its parent tries, in order:
//!
//! 1. skipping the failed slot, when it is optional (rules), or closing the
//!    list, when enough elements were collected (collections);
//! 2. the most recent untried choice inside an earlier, already populated
//!    sibling: a rotation, a deeper choice, the next variant candidate, or
//!    skipping/dropping a populated optional part;
//! 3. failing itself, which hands the problem to its own parent.
//!
//! Input consumed by discarded branches is returned to the buffer by moving
//! the read position back to where the reopened node started.
//!
//! ## Left recursion
//!
//! A rule that would open at the same offset as an open ancestor of the same
//! type fails at once. Left-recursive shapes (`Add = Expr "+" Expr`) are still
//! reachable: the variant first populates a non-recursive candidate and
//! rotation grows it to the left (see `rotation.rs`).

use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use super::location::ParserLocation;
use super::matcher::{MatchResult, Matched, Matcher};
use super::metrics::RunMetrics;
use super::state::ParserState;
use super::token::{
    CollectionToken, PartialToken, Rotation, RuleToken, Slot, SlotRef, TerminalToken, TokenId, TokenKind, TokenTree,
    VariantToken,
};
use crate::error::{ConfigError, ParseError, SyntaxError};
use crate::schema::{Optionality, RecordId, Schema, SlotDescriptor, SlotFlags, SlotKind};
use crate::value::Value;

/// What the top of the stack asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Descend(TokenId),
    Populated,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Choice {
    Rotate,
    NextCandidate,
    SkipSlot(usize),
    DropElement,
}

/// An untried alternative, reached by reopening `path` (outermost first).
#[derive(Debug)]
struct ChoicePoint {
    path: Vec<TokenId>,
    choice: Choice,
}

impl ChoicePoint {
    fn at(id: TokenId, choice: Choice) -> Self {
        Self { path: vec![id], choice }
    }

    fn below(mut self, id: TokenId) -> Self {
        self.path.insert(0, id);
        self
    }
}

/// Furthest terminal failure seen so far.
#[derive(Debug)]
struct Failure {
    location: ParserLocation,
    expected: Vec<String>,
    trail: Vec<String>,
}

pub(crate) struct Tokenizer<'g, R> {
    schema: &'g Schema,
    state: ParserState<R>,
    tree: TokenTree,
    stack: Vec<TokenId>,
    furthest: Option<Failure>,
    metrics: RunMetrics,
}

impl<'g, R: BufRead> Tokenizer<'g, R> {
    pub(crate) fn new(schema: &'g Schema, reader: R, source: &str) -> Self {
        Self {
            schema,
            state: ParserState::new(reader, source),
            tree: TokenTree::default(),
            stack: Vec::new(),
            furthest: None,
            metrics: RunMetrics::default(),
        }
    }

    pub(crate) fn tree(&self) -> &TokenTree {
        &self.tree
    }

    pub(crate) fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Populate a token of type `root` from the input. With `to_end`, a root
    /// followed by anything but whitespace or its ignored characters counts as
    /// a failure, and the remaining alternatives are tried before giving up.
    pub(crate) fn run(&mut self, root: RecordId, to_end: bool) -> Result<TokenId, ParseError> {
        let start = Instant::now();
        let result = self.drive(root, to_end);
        self.metrics.total = start.elapsed();
        self.metrics.tokens_created = self.tree.len();
        match &result {
            Ok(id) => tracing::debug!(
                root = %self.schema.get(root).name,
                consumed = self.tree.consumed(*id),
                steps = self.metrics.steps,
                backtracks = self.metrics.backtracks,
                "tokenize finished"
            ),
            Err(err) => tracing::debug!(root = %self.schema.get(root).name, error = %err, "tokenize failed"),
        }
        result
    }

    /// Location just past the text held by `id`.
    pub(crate) fn end_location(&self, id: TokenId) -> ParserLocation {
        self.state.locate(&self.tree.get(id).location, self.tree.end(id))
    }

    /// Fail unless only whitespace and `root`'s ignored characters remain.
    fn check_trailing(&mut self, root: TokenId) -> Result<(), ParseError> {
        let ignore = Arc::clone(&self.tree.get(root).ignore);
        let end = self.end_location(root);
        self.state.rewind(&end);
        let remaining = self.state.drain_remaining()?;
        let tail = remaining.trim_start_matches(|c: char| c.is_whitespace() || ignore.contains(c));
        if tail.is_empty() {
            return Ok(());
        }
        let skipped = remaining.len() - tail.len();
        let tail = tail.chars().take(32).collect::<String>();
        let location = self.state.locate(&end, end.offset + skipped);
        Err(ParseError::TrailingInput { tail, location })
    }

    fn drive(&mut self, root: RecordId, to_end: bool) -> Result<TokenId, ParseError> {
        let location = self.state.location().clone();
        let root = self.open_record(root, location, &Arc::from(""));
        self.stack.push(root);
        let mut trailing: Option<ParseError> = None;

        loop {
            self.metrics.steps += 1;
            self.metrics.observe_depth(self.stack.len());
            let Some(&top) = self.stack.last() else {
                return Err(self.syntax_error().into());
            };
            let step = match self.advance(top)? {
                Outcome::Descend(child) => {
                    self.stack.push(child);
                    Ok(())
                }
                Outcome::Populated => match self.complete() {
                    Ok(Some(done)) if !to_end => return Ok(done),
                    Ok(Some(done)) => match self.check_trailing(done) {
                        Ok(()) => return Ok(done),
                        Err(err @ ParseError::TrailingInput { .. }) => {
                            keep_furthest(&mut trailing, err);
                            match self.find_choice(done) {
                                Some(choice) => {
                                    tracing::debug!("input remains after the root, retrying");
                                    self.metrics.backtracks += 1;
                                    self.apply(choice);
                                    Ok(())
                                }
                                None => return Err(self.exhausted(self.syntax_error(), trailing)),
                            }
                        }
                        Err(err) => return Err(err),
                    },
                    Ok(None) => Ok(()),
                    Err(err) => Err(err),
                },
                Outcome::Failed => self.backtrack(),
            };
            match step {
                Ok(()) => {}
                Err(ParseError::Syntax(err)) => return Err(self.exhausted(err, trailing)),
                Err(err) => return Err(err),
            }
        }
    }

    // --- Opening tokens -------------------------------------------------------

    fn push_token(&mut self, location: ParserLocation, ignore: Arc<str>, kind: TokenKind) -> TokenId {
        self.tree.push(PartialToken { location, ignore, sealed: false, kind })
    }

    fn open_record(&mut self, record: RecordId, location: ParserLocation, parent_ignore: &Arc<str>) -> TokenId {
        let ignore = self.record_ignore(parent_ignore, record);
        let record_type = self.schema.get(record);
        let kind = if record_type.is_variant() {
            TokenKind::Variant(VariantToken { record, cursor: 0, child: None, rotation: Rotation::Untried })
        } else {
            let values = vec![Slot::Pending; record_type.slots().len()];
            TokenKind::Rule(RuleToken { record, next_slot: 0, values })
        };
        self.push_token(location, ignore, kind)
    }

    fn record_ignore(&self, parent: &Arc<str>, record: RecordId) -> Arc<str> {
        match &self.schema.get(record).ignore {
            None => Arc::clone(parent),
            Some(own) if own.inherit => merge_ignore(parent, &own.chars),
            Some(own) => Arc::from(own.chars.as_str()),
        }
    }

    fn slot_ignore(&self, parent: &Arc<str>, slot: &SlotDescriptor) -> Arc<str> {
        match &slot.ignore {
            None => Arc::clone(parent),
            Some(own) if slot.flags.contains(SlotFlags::INHERIT_IGNORE) => merge_ignore(parent, own),
            Some(own) => Arc::from(own.as_str()),
        }
    }

    /// Value currently held by slot `index` of `rule`, as seen by optional
    /// guards and context-equals slots. Nested records and lists have no
    /// scalar value and report their kind instead.
    ///
    /// A pending or skipped slot reads as `Null` here, whatever its kind. The
    /// finished record fills skipped slots with the kind's empty value
    /// instead (`""` for pattern slots, see `SlotKind::empty_value`), so a guard
    /// that saw `Null` may sit next to a field that prints as `""`.
    fn sibling(&self, rule: TokenId, index: usize) -> Result<Value, &'static str> {
        let Some(rule) = self.tree.rule(rule) else {
            return Ok(Value::Null);
        };
        match rule.values[index] {
            Slot::Filled(child) => match &self.tree.get(child).kind {
                TokenKind::Terminal(t) => Ok(t.value.clone().unwrap_or(Value::Null)),
                TokenKind::Collection(_) => Err("list"),
                _ => Err("record"),
            },
            Slot::Pending | Slot::Skipped => Ok(Value::Null),
        }
    }

    /// Whether slot `index` of `rule` may be left empty at input offset `offset`.
    fn skippable(&self, rule: TokenId, index: usize, offset: usize) -> bool {
        let Some(record) = self.tree.rule(rule).map(|r| r.record) else {
            return false;
        };
        match &self.schema.slot(record, index).optional {
            None => false,
            Some(Optionality::Always) => true,
            Some(Optionality::WhenNull(sibling)) => matches!(self.sibling(rule, *sibling), Ok(Value::Null)),
            Some(Optionality::WhenNotNull(sibling)) => !matches!(self.sibling(rule, *sibling), Ok(Value::Null)),
            Some(Optionality::WhenFollowedBy(pattern)) => {
                let ignore = &self.tree.get(rule).ignore;
                let rest = self.state.text_from(offset).trim_start_matches(|c: char| ignore.contains(c));
                pattern.is_match(rest)
            }
        }
    }

    // --- Advancing ------------------------------------------------------------

    fn advance(&mut self, id: TokenId) -> Result<Outcome, ParseError> {
        match &self.tree.get(id).kind {
            TokenKind::Terminal(_) => self.match_terminal(id),
            TokenKind::Rule(_) => self.advance_rule(id),
            TokenKind::Variant(_) => Ok(self.advance_variant(id)),
            TokenKind::Collection(_) => Ok(self.advance_collection(id)),
        }
    }

    fn advance_rule(&mut self, id: TokenId) -> Result<Outcome, ParseError> {
        let schema = self.schema;
        let Some((record, next)) = self.tree.rule(id).map(|r| (r.record, r.next_slot)) else {
            return Ok(Outcome::Failed);
        };
        let slots = schema.get(record).slots();

        if next == 0 && self.left_recursive(id) {
            tracing::trace!(rule = %schema.get(record).name, "left recursion refused");
            return Ok(Outcome::Failed);
        }
        if next == slots.len() {
            return Ok(Outcome::Populated);
        }

        let offset = self.state.location().offset;
        if self.state.at_end()? && (next..slots.len()).all(|idx| self.skippable(id, idx, offset)) {
            if let Some(rule) = self.tree.rule_mut(id) {
                rule.values[next..].fill(Slot::Skipped);
                rule.next_slot = slots.len();
            }
            tracing::debug!(rule = %schema.get(record).name, skipped = slots.len() - next, "force-populated at end of input");
            return Ok(Outcome::Populated);
        }

        let slot = &slots[next];
        let location = self.state.location().clone();
        let parent_ignore = Arc::clone(&self.tree.get(id).ignore);
        let ignore = self.slot_ignore(&parent_ignore, slot);
        let slot_ref = SlotRef { record, index: next };

        let child = match &slot.kind {
            SlotKind::SubRule(target) | SlotKind::Variant(target) => self.open_record(*target, location, &ignore),
            SlotKind::Collection { element, limit } => self.push_token(
                location,
                ignore,
                TokenKind::Collection(CollectionToken {
                    element: *element,
                    limit: *limit,
                    elements: Vec::new(),
                    closed: false,
                }),
            ),
            SlotKind::Literal(text) => {
                let matcher = Matcher::Literal { text: text.clone(), ignore_case: slot.ignore_case() };
                self.open_terminal(location, ignore, slot_ref, matcher)
            }
            SlotKind::Pattern(pattern) => {
                self.open_terminal(location, ignore, slot_ref, Matcher::Pattern(pattern.clone()))
            }
            SlotKind::Enum(set) => self.open_terminal(location, ignore, slot_ref, Matcher::Pattern(set.pattern.clone())),
            SlotKind::Number(kind) => self.open_terminal(location, ignore, slot_ref, Matcher::Number(*kind)),
            SlotKind::ContextEquals { sibling } => {
                let matcher = self
                    .sibling(id, *sibling)
                    .and_then(|value| Matcher::context_equals(&value, slot.ignore_case()))
                    .map_err(|found| ConfigError::ContextNotText {
                        record: schema.get(record).name.clone(),
                        slot: slot.name.clone(),
                        found,
                    })?;
                self.open_terminal(location, ignore, slot_ref, matcher)
            }
        };

        if let Some(rule) = self.tree.rule_mut(id) {
            rule.values[next] = Slot::Filled(child);
            rule.next_slot = next + 1;
        }
        tracing::trace!(rule = %schema.get(record).name, slot = %slot.name, "open slot");
        Ok(Outcome::Descend(child))
    }

    fn open_terminal(&mut self, location: ParserLocation, ignore: Arc<str>, slot: SlotRef, matcher: Matcher) -> TokenId {
        self.push_token(location, ignore, TokenKind::Terminal(TerminalToken { slot, matcher, matched: None, value: None }))
    }

    fn left_recursive(&self, id: TokenId) -> bool {
        let token = self.tree.get(id);
        let Some(record) = self.tree.record_of(id) else {
            return false;
        };
        self.stack.iter().rev().skip(1).any(|&open| {
            let ancestor = self.tree.get(open);
            ancestor.location.offset == token.location.offset
                && matches!(&ancestor.kind, TokenKind::Rule(rule) if rule.record == record)
        })
    }

    fn advance_variant(&mut self, id: TokenId) -> Outcome {
        let Some(variant) = self.tree.variant(id) else {
            return Outcome::Failed;
        };
        if variant.child.is_some() {
            return Outcome::Populated;
        }
        let Some(&candidate) = self.schema.get(variant.record).candidates().get(variant.cursor) else {
            return Outcome::Failed;
        };
        let location = self.state.location().clone();
        let ignore = Arc::clone(&self.tree.get(id).ignore);
        let child = self.open_record(candidate, location, &ignore);
        if let Some(variant) = self.tree.variant_mut(id) {
            variant.child = Some(child);
        }
        tracing::trace!(candidate = %self.schema.get(candidate).name, "try candidate");
        Outcome::Descend(child)
    }

    fn advance_collection(&mut self, id: TokenId) -> Outcome {
        let (element, closed, len, limit) = match &self.tree.get(id).kind {
            TokenKind::Collection(c) => (c.element, c.closed, c.elements.len(), c.limit),
            _ => return Outcome::Failed,
        };
        if closed || !limit.allows_more(len) {
            return if len >= limit.min { Outcome::Populated } else { Outcome::Failed };
        }
        let location = self.state.location().clone();
        let ignore = Arc::clone(&self.tree.get(id).ignore);
        let child = self.open_record(element, location, &ignore);
        if let Some(collection) = self.tree.collection_mut(id) {
            collection.elements.push(child);
        }
        Outcome::Descend(child)
    }

    fn match_terminal(&mut self, id: TokenId) -> Result<Outcome, ParseError> {
        loop {
            let token = self.tree.get(id);
            let TokenKind::Terminal(terminal) = &token.kind else {
                return Ok(Outcome::Failed);
            };
            let result = terminal.matcher.apply(self.state.buffer(), &token.ignore);
            self.metrics.matcher_calls += 1;

            let matched = match result {
                MatchResult::Match(m) => Some(m),
                MatchResult::Continue(tentative) => {
                    if self.state.fill()? {
                        continue;
                    }
                    tentative
                }
                MatchResult::Fail => None,
            };
            return match matched {
                Some(m) => self.accept_terminal(id, m),
                None => {
                    self.record_failure(id);
                    Ok(Outcome::Failed)
                }
            };
        }
    }

    fn accept_terminal(&mut self, id: TokenId, matched: Matched) -> Result<Outcome, ParseError> {
        let TokenKind::Terminal(terminal) = &self.tree.get(id).kind else {
            return Ok(Outcome::Failed);
        };
        let record = self.schema.get(terminal.slot.record);
        let slot = &record.slots()[terminal.slot.index];
        let conversion = |message: String| ConfigError::Conversion {
            record: record.name.clone(),
            slot: slot.name.clone(),
            text: matched.text.clone(),
            message,
        };

        let value = match (&slot.kind, slot.converter) {
            (_, Some(convert)) => convert(&matched.text).map_err(conversion)?,
            (SlotKind::Number(kind), None) => kind.convert(&matched.text).map_err(conversion)?,
            (SlotKind::Enum(set), None) => {
                let name = set
                    .canonical(&matched.text, slot.ignore_case())
                    .ok_or_else(|| conversion("no such enumerator".to_string()))?;
                Value::Enum(name.to_string())
            }
            (SlotKind::ContextEquals { .. }, None) if matches!(terminal.matcher, Matcher::Null) => Value::Null,
            _ => Value::Text(matched.text.clone()),
        };

        tracing::trace!(slot = %slot.name, text = ?matched.text, "matched");
        self.state.consume(matched.consumed);
        if let TokenKind::Terminal(terminal) = &mut self.tree.get_mut(id).kind {
            terminal.matched = Some(matched);
            terminal.value = Some(value);
        }
        Ok(Outcome::Populated)
    }

    fn record_failure(&mut self, id: TokenId) {
        let token = self.tree.get(id);
        let TokenKind::Terminal(terminal) = &token.kind else {
            return;
        };
        let buffer = self.state.buffer();
        let lead = buffer.len() - buffer.trim_start_matches(|c: char| token.ignore.contains(c)).len();
        let location = self.state.locate(&token.location, token.location.offset + lead);
        let expected = self.schema.describe_slot(terminal.slot.record, terminal.slot.index);

        if let Some(furthest) = self.furthest.as_mut() {
            if furthest.location.offset > location.offset {
                return;
            }
            if furthest.location.offset == location.offset {
                if !furthest.expected.contains(&expected) {
                    furthest.expected.push(expected);
                }
                return;
            }
        }
        let trail = self.stack.iter().map(|&open| self.tree.describe(self.schema, open)).collect();
        self.furthest = Some(Failure { location, expected: vec![expected], trail });
    }

    /// Error for a search that ran dry after input was left over: the
    /// trailing input, unless some branch failed further along.
    fn exhausted(&self, syntax: SyntaxError, trailing: Option<ParseError>) -> ParseError {
        match trailing {
            Some(trailing) if trailing.location().is_some_and(|l| l.offset >= syntax.location.offset) => trailing,
            _ => syntax.into(),
        }
    }

    fn syntax_error(&self) -> SyntaxError {
        let (location, expected, trail) = match &self.furthest {
            Some(f) => (f.location.clone(), f.expected.join(" or "), f.trail.clone()),
            None => (self.state.location().clone(), "input".to_string(), Vec::new()),
        };
        let rest = self.state.text_from(location.offset);
        let found = match rest.chars().next() {
            None => "end of input".to_string(),
            Some(_) => format!("{:?}", rest.chars().take_while(|c| *c != '\n').take(16).collect::<String>()),
        };
        SyntaxError { expected, found, location, trail }
    }

    // --- Completing -----------------------------------------------------------

    /// Fold the populated top of the stack into its parent. Returns the root
    /// once the stack is empty.
    fn complete(&mut self) -> Result<Option<TokenId>, ParseError> {
        let Some(&top) = self.stack.last() else {
            return Err(self.syntax_error().into());
        };

        // A rotation must consume past the rule it wrapped.
        if let Some(&parent) = self.stack.iter().rev().nth(1) {
            if let Some(VariantToken { rotation: Rotation::Trying { inner_end, .. }, .. }) = self.tree.variant(parent) {
                if self.tree.end(top) <= *inner_end {
                    tracing::trace!("rotation made no progress");
                    self.backtrack()?;
                    return Ok(None);
                }
            }
        }

        self.stack.pop();
        let mut done = top;
        if self.tree.rule(top).is_some() {
            done = self.tree.sort_priorities(self.schema, top);
            if done != top {
                self.metrics.unrotations += 1;
            }
        }
        let Some(&parent) = self.stack.last() else {
            return Ok(Some(done));
        };
        self.tree.replace_child(parent, top, done);

        let zero_width = self.tree.consumed(done) == 0;
        match &mut self.tree.get_mut(parent).kind {
            TokenKind::Variant(variant) => variant.rotation = Rotation::Untried,
            TokenKind::Collection(collection) if zero_width => collection.closed = true,
            _ => {}
        }
        Ok(None)
    }

    // --- Backtracking ---------------------------------------------------------

    fn backtrack(&mut self) -> Result<(), ParseError> {
        self.metrics.backtracks += 1;
        let Some(mut failed) = self.stack.pop() else {
            return Err(self.syntax_error().into());
        };
        loop {
            let Some(&parent) = self.stack.last() else {
                return Err(self.syntax_error().into());
            };
            tracing::trace!(
                failed = %self.tree.describe(self.schema, failed),
                parent = %self.tree.describe(self.schema, parent),
                "pushback"
            );
            if self.recover(parent, failed)? {
                return Ok(());
            }
            failed = parent;
            self.stack.pop();
        }
    }

    /// Let `parent` react to the failure of its open child `failed`. Returns
    /// `false` when `parent` has no way forward and fails as well.
    fn recover(&mut self, parent: TokenId, failed: TokenId) -> Result<bool, ParseError> {
        let failed_location = self.tree.get(failed).location.clone();
        match &self.tree.get(parent).kind {
            TokenKind::Rule(rule) => {
                let Some(index) = rule.values.iter().position(|slot| *slot == Slot::Filled(failed)) else {
                    return Ok(false);
                };
                if self.skippable(parent, index, failed_location.offset) {
                    self.truncate_rule(parent, index, Slot::Skipped);
                    self.state.rewind(&failed_location);
                    tracing::trace!(slot = index, "optional slot skipped");
                    return Ok(true);
                }
                self.truncate_rule(parent, index, Slot::Pending);
                if let Some(rule) = self.tree.rule_mut(parent) {
                    rule.next_slot = index;
                }
                self.search_rule(parent, index)
            }
            TokenKind::Variant(variant) => {
                if let Rotation::Trying { inner, next, .. } = variant.rotation {
                    let record = variant.record;
                    self.tree.get_mut(inner).sealed = false;
                    if let Some(variant) = self.tree.variant_mut(parent) {
                        variant.child = Some(inner);
                        variant.rotation = Rotation::Spent;
                    }
                    let targets = self.tree.rotation_targets(self.schema, record, inner);
                    if next < targets.len() {
                        self.start_rotation(parent, inner, &targets, next);
                        return Ok(true);
                    }
                    if let Some(choice) = self.find_choice(inner) {
                        self.apply(choice);
                        return Ok(true);
                    }
                }
                Ok(self.next_candidate(parent))
            }
            TokenKind::Collection(collection) => {
                let min = collection.limit.min;
                let remaining = collection.elements.len().saturating_sub(1);
                if let Some(collection) = self.tree.collection_mut(parent) {
                    collection.elements.retain(|&e| e != failed);
                }
                if remaining >= min {
                    if let Some(collection) = self.tree.collection_mut(parent) {
                        collection.closed = true;
                    }
                    self.state.rewind(&failed_location);
                    return Ok(true);
                }
                let elements = match &self.tree.get(parent).kind {
                    TokenKind::Collection(c) => c.elements.clone(),
                    _ => Vec::new(),
                };
                for (k, &element) in elements.iter().enumerate().rev() {
                    if let Some(choice) = self.find_choice(element) {
                        if let Some(collection) = self.tree.collection_mut(parent) {
                            collection.elements.truncate(k + 1);
                            collection.closed = false;
                        }
                        self.apply(choice);
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            TokenKind::Terminal(_) => Ok(false),
        }
    }

    /// Look for an alternative among slots `0..before` of `rule`, most recent first.
    fn search_rule(&mut self, rule: TokenId, before: usize) -> Result<bool, ParseError> {
        let values = match self.tree.rule(rule) {
            Some(r) => r.values.clone(),
            None => return Ok(false),
        };
        for (index, slot) in values.iter().enumerate().take(before).rev() {
            let Slot::Filled(child) = *slot else {
                continue;
            };
            if let Some(choice) = self.find_choice(child) {
                self.truncate_rule(rule, index, Slot::Filled(child));
                self.apply(choice);
                return Ok(true);
            }
            let child_location = self.tree.get(child).location.clone();
            if self.tree.consumed(child) > 0 && self.skippable(rule, index, child_location.offset) {
                self.truncate_rule(rule, index, Slot::Skipped);
                self.state.rewind(&child_location);
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Set slot `index` to `value`, clear every later slot and resume after `index`.
    fn truncate_rule(&mut self, rule: TokenId, index: usize, value: Slot) {
        if let Some(rule) = self.tree.rule_mut(rule) {
            rule.values[index] = value;
            rule.values[index + 1..].fill(Slot::Pending);
            rule.next_slot = index + 1;
        }
    }

    fn next_candidate(&mut self, id: TokenId) -> bool {
        let location = self.tree.get(id).location.clone();
        let Some(variant) = self.tree.variant_mut(id) else {
            return false;
        };
        if variant.cursor + 1 >= self.schema.get(variant.record).candidates().len() {
            return false;
        }
        variant.cursor += 1;
        variant.child = None;
        variant.rotation = Rotation::Untried;
        self.state.rewind(&location);
        true
    }

    fn start_rotation(&mut self, variant: TokenId, inner: TokenId, targets: &[RecordId], index: usize) {
        let target = targets[index];
        let inner_end = self.tree.end(inner);
        let parent_ignore = Arc::clone(&self.tree.get(variant).ignore);
        let ignore = self.record_ignore(&parent_ignore, target);
        let end = self.end_location(inner);
        let outer = self.tree.rotate(self.schema, inner, target, ignore);
        if let Some(v) = self.tree.variant_mut(variant) {
            v.child = Some(outer);
            v.rotation = Rotation::Trying { inner, inner_end, next: index + 1 };
        }
        self.state.rewind(&end);
        self.stack.push(outer);
        self.metrics.rotations += 1;
    }

    /// Most recent untried alternative inside the closed subtree `id`.
    fn find_choice(&self, id: TokenId) -> Option<ChoicePoint> {
        let token = self.tree.get(id);
        if token.sealed {
            return None;
        }
        match &token.kind {
            TokenKind::Terminal(_) => None,
            TokenKind::Variant(variant) => {
                let child = variant.child?;
                if variant.rotation == Rotation::Untried
                    && self.tree.rotatable(self.schema, child)
                    && !self.tree.rotation_targets(self.schema, variant.record, child).is_empty()
                {
                    return Some(ChoicePoint::at(id, Choice::Rotate));
                }
                if let Some(choice) = self.find_choice(child) {
                    return Some(choice.below(id));
                }
                let candidates = self.schema.get(variant.record).candidates().len();
                (variant.cursor + 1 < candidates).then(|| ChoicePoint::at(id, Choice::NextCandidate))
            }
            TokenKind::Rule(rule) => rule.values.iter().enumerate().rev().find_map(|(index, slot)| {
                let Slot::Filled(child) = *slot else {
                    return None;
                };
                if let Some(choice) = self.find_choice(child) {
                    return Some(choice.below(id));
                }
                let offset = self.tree.get(child).location.offset;
                (self.tree.consumed(child) > 0 && self.skippable(id, index, offset))
                    .then(|| ChoicePoint::at(id, Choice::SkipSlot(index)))
            }),
            TokenKind::Collection(collection) => {
                let last = collection.elements.len().checked_sub(1)?;
                collection.elements.iter().enumerate().rev().find_map(|(k, &element)| {
                    if let Some(choice) = self.find_choice(element) {
                        return Some(choice.below(id));
                    }
                    (k == last && last >= collection.limit.min).then(|| ChoicePoint::at(id, Choice::DropElement))
                })
            }
        }
    }

    /// Reopen the choice point's path and take the alternative.
    fn apply(&mut self, point: ChoicePoint) {
        let ChoicePoint { path, choice } = point;
        for pair in path.windows(2) {
            self.reopen(pair[0], pair[1]);
        }
        self.stack.extend(path.iter().copied());
        let Some(&target) = path.last() else {
            return;
        };
        tracing::trace!(at = %self.tree.describe(self.schema, target), choice = ?choice, "retry");

        match choice {
            Choice::Rotate => {
                let Some(variant) = self.tree.variant(target) else {
                    return;
                };
                let (record, inner) = (variant.record, variant.child);
                if let Some(inner) = inner {
                    let targets = self.tree.rotation_targets(self.schema, record, inner);
                    self.start_rotation(target, inner, &targets, 0);
                }
            }
            Choice::NextCandidate => {
                self.next_candidate(target);
            }
            Choice::SkipSlot(index) => {
                let child = self.tree.rule(target).and_then(|rule| match rule.values[index] {
                    Slot::Filled(child) => Some(child),
                    _ => None,
                });
                if let Some(child) = child {
                    let location = self.tree.get(child).location.clone();
                    self.truncate_rule(target, index, Slot::Skipped);
                    self.state.rewind(&location);
                }
            }
            Choice::DropElement => {
                let dropped = self.tree.collection_mut(target).and_then(|c| {
                    c.closed = true;
                    c.elements.pop()
                });
                if let Some(dropped) = dropped {
                    let location = self.tree.get(dropped).location.clone();
                    self.state.rewind(&location);
                }
            }
        }
    }

    /// Make `node` resume right after its child `child`.
    fn reopen(&mut self, node: TokenId, child: TokenId) {
        match &mut self.tree.get_mut(node).kind {
            TokenKind::Rule(rule) => {
                if let Some(index) = rule.values.iter().position(|slot| *slot == Slot::Filled(child)) {
                    rule.values[index + 1..].fill(Slot::Pending);
                    rule.next_slot = index + 1;
                }
            }
            TokenKind::Collection(collection) => {
                if let Some(k) = collection.elements.iter().position(|&e| e == child) {
                    collection.elements.truncate(k + 1);
                    collection.closed = false;
                }
            }
            TokenKind::Variant(_) | TokenKind::Terminal(_) => {}
        }
    }
}

/// Keep whichever trailing-input error lies further into the input.
fn keep_furthest(kept: &mut Option<ParseError>, err: ParseError) {
    let offset = |e: &ParseError| e.location().map_or(0, |l| l.offset);
    if kept.as_ref().is_none_or(|k| offset(&err) > offset(k)) {
        *kept = Some(err);
    }
}

fn merge_ignore(parent: &str, own: &str) -> Arc<str> {
    let mut merged = parent.to_string();
    merged.extend(own.chars().filter(|c| !parent.contains(*c)));
    Arc::from(merged)
}
