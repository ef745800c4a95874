//! Grammar schema and builder.
//!
//! A grammar is a set of named *record types*. A record type is either:
//!
//! - a **rule**: an ordered list of slots, matched one after the other, or
//! - a **variant**: an ordered list of candidate record types, the first one
//!   that fully populates wins.
//!
//! ```text
//! Junction   = Statement | Comment | Separator          (variant)
//! Statement  = marker:":"  command:/[^;\n]+/            (rule)
//! Comment    = marker:"//" comment:/[^\n]*/ tail:"\n"?  (rule)
//! ```
//!
//! The same grammar with the builder:
//!
//! ```
//! use shapeparse::{Grammar, SlotSpec};
//!
//! let grammar = Grammar::builder()
//!     .variant("Junction", ["Statement", "Comment"])
//!     .rule("Statement", |r| r.literal("marker", ":").pattern("command", r"[^;\n]+"))
//!     .rule("Comment", |r| {
//!         r.literal("marker", "//")
//!             .pattern("comment", r"[^\n]*")
//!             .slot(SlotSpec::literal("tail", "\n").optional())
//!     })
//!     .build()
//!     .unwrap();
//! assert_eq!(grammar.schema().len(), 3);
//! ```
//!
//! ## Design notes
//!
//! - Builders only record names and pattern sources. All resolution (record
//!   references, sibling names, regex compilation) happens in
//!   [`GrammarBuilder::build`], which reports every problem as a
//!   [`ConfigError`].
//! - The built [`Grammar`] is immutable and `Send + Sync`; it can be shared
//!   between threads and reused for any number of parses.

use std::collections::HashMap;
use std::fmt;

use regex::{Regex, RegexBuilder};

use crate::engine::{CapturePattern, NumberKind};
use crate::error::ConfigError;
use crate::value::{Record, Value};

/// Index of a record type inside a [`Schema`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub(crate) usize);

/// Conversion applied to the text matched by a pattern slot.
pub type Converter = fn(&str) -> Result<Value, String>;

/// Callback run for every populated record of a type, with the caller's context.
pub type Hook<C> = Box<dyn Fn(&Record, &mut C) + Send + Sync>;

bitflags::bitflags! {
    /// Per-slot matching modifiers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SlotFlags: u8 {
        /// Compare literals, patterns and enumerators case-insensitively.
        const IGNORE_CASE    = 1 << 0;
        /// Slot-level ignore characters extend the owner's set instead of replacing it.
        const INHERIT_IGNORE = 1 << 1;
    }
}

// --- Resolved schema ----------------------------------------------------------

/// Characters skipped before every terminal match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreCharacters {
    pub chars: String,
    /// Add to the enclosing record's set instead of replacing it.
    pub inherit: bool,
}

/// Repetition bounds for a collection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimit {
    pub min: usize,
    /// `None` means unbounded.
    pub max: Option<usize>,
}

impl CaptureLimit {
    pub const UNBOUNDED: CaptureLimit = CaptureLimit { min: 0, max: None };

    pub fn allows_more(&self, len: usize) -> bool {
        self.max.is_none_or(|max| len < max)
    }
}

/// Enumerator slot: matches any of a fixed set of words.
#[derive(Debug, Clone)]
pub struct EnumSet {
    pub names: Vec<String>,
    pub(crate) pattern: CapturePattern,
}

impl EnumSet {
    /// Canonical enumerator for matched text.
    pub fn canonical(&self, text: &str, ignore_case: bool) -> Option<&str> {
        self.names
            .iter()
            .find(|name| if ignore_case { name.to_lowercase() == text.to_lowercase() } else { *name == text })
            .map(String::as_str)
    }
}

/// When an optional slot may be skipped.
#[derive(Debug, Clone)]
pub enum Optionality {
    Always,
    /// Only while the sibling at this index is null.
    WhenNull(usize),
    /// Only while the sibling at this index holds a value.
    WhenNotNull(usize),
    /// Only if the input at the slot's position matches.
    WhenFollowedBy(Regex),
}

#[derive(Debug, Clone)]
pub enum SlotKind {
    Literal(String),
    Pattern(CapturePattern),
    Number(NumberKind),
    /// Nested rule.
    SubRule(RecordId),
    /// Nested variant.
    Variant(RecordId),
    Collection {
        element: RecordId,
        limit: CaptureLimit,
    },
    Enum(EnumSet),
    /// Must repeat the text already captured by an earlier sibling.
    ContextEquals {
        sibling: usize,
    },
}

impl SlotKind {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlotKind::SubRule(_) | SlotKind::Variant(_) | SlotKind::Collection { .. })
    }

    /// Value stored for a slot that was skipped.
    pub(crate) fn empty_value(&self) -> Value {
        match self {
            SlotKind::Pattern(_) => Value::Text(String::new()),
            SlotKind::Collection { .. } => Value::List(Vec::new()),
            _ => Value::Null,
        }
    }

    /// Record type a nested slot opens, if any.
    pub fn record(&self) -> Option<RecordId> {
        match self {
            SlotKind::SubRule(id) | SlotKind::Variant(id) => Some(*id),
            _ => None,
        }
    }
}

/// One ordered component of a rule.
#[derive(Clone)]
pub struct SlotDescriptor {
    pub name: String,
    pub kind: SlotKind,
    pub flags: SlotFlags,
    pub optional: Option<Optionality>,
    /// Slot-level ignore characters; see [`SlotFlags::INHERIT_IGNORE`].
    pub ignore: Option<String>,
    pub(crate) converter: Option<Converter>,
}

impl SlotDescriptor {
    pub fn is_optional(&self) -> bool {
        self.optional.is_some()
    }

    pub fn ignore_case(&self) -> bool {
        self.flags.contains(SlotFlags::IGNORE_CASE)
    }
}

impl fmt::Debug for SlotDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("flags", &self.flags)
            .field("optional", &self.optional)
            .field("ignore", &self.ignore)
            .field("converter", &self.converter.map(|_| "<function>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Shape {
    Rule(Vec<SlotDescriptor>),
    Variant(Vec<RecordId>),
}

#[derive(Debug, Clone)]
pub struct RecordType {
    pub name: String,
    pub shape: Shape,
    /// Binding strength during rotation; higher binds tighter.
    pub priority: i32,
    pub ignore: Option<IgnoreCharacters>,
}

impl RecordType {
    pub fn slots(&self) -> &[SlotDescriptor] {
        match &self.shape {
            Shape::Rule(slots) => slots,
            Shape::Variant(_) => &[],
        }
    }

    pub fn candidates(&self) -> &[RecordId] {
        match &self.shape {
            Shape::Rule(_) => &[],
            Shape::Variant(candidates) => candidates,
        }
    }

    pub fn is_variant(&self) -> bool {
        matches!(self.shape, Shape::Variant(_))
    }
}

/// Resolved, immutable set of record types.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    records: Vec<RecordType>,
    by_name: HashMap<String, RecordId>,
}

impl Schema {
    pub fn get(&self, id: RecordId) -> &RecordType {
        &self.records[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &RecordType)> {
        self.records.iter().enumerate().map(|(idx, r)| (RecordId(idx), r))
    }

    pub(crate) fn slot(&self, record: RecordId, index: usize) -> &SlotDescriptor {
        &self.get(record).slots()[index]
    }

    /// Whether a slot of `kind` can hold a value of record type `record`,
    /// directly or through nested variants.
    pub fn accepts(&self, kind: &SlotKind, record: RecordId) -> bool {
        match kind {
            SlotKind::SubRule(id) => *id == record,
            SlotKind::Variant(id) => self.variant_contains(*id, record, &mut Vec::new()),
            _ => false,
        }
    }

    fn variant_contains(&self, variant: RecordId, record: RecordId, seen: &mut Vec<RecordId>) -> bool {
        if variant == record {
            return true;
        }
        if seen.contains(&variant) {
            return false;
        }
        seen.push(variant);
        self.get(variant).candidates().iter().any(|&c| {
            c == record || (self.get(c).is_variant() && self.variant_contains(c, record, seen))
        })
    }

    /// Human readable expectation for a terminal slot.
    pub(crate) fn describe_slot(&self, record: RecordId, index: usize) -> String {
        let rec = self.get(record);
        let slot = &rec.slots()[index];
        let what = match &slot.kind {
            SlotKind::Literal(text) => format!("{text:?}"),
            SlotKind::Pattern(p) => p.to_string(),
            SlotKind::Number(NumberKind::Integer) => "an integer".to_string(),
            SlotKind::Number(NumberKind::Float) => "a number".to_string(),
            SlotKind::Enum(set) => format!("one of {}", set.names.join(", ")),
            SlotKind::ContextEquals { sibling } => format!("the same text as `{}`", rec.slots()[*sibling].name),
            SlotKind::SubRule(id) | SlotKind::Variant(id) => self.get(*id).name.clone(),
            SlotKind::Collection { element, .. } => format!("list of {}", self.get(*element).name),
        };
        format!("{what} for `{}.{}`", rec.name, slot.name)
    }
}

/// A schema plus the per-record hooks that run once a parse succeeds.
///
/// `C` is the caller's context type, handed mutably to every hook.
pub struct Grammar<C = ()> {
    schema: Schema,
    hooks: HashMap<RecordId, Hook<C>>,
}

impl Grammar<()> {
    /// Builder for a grammar without context.
    pub fn builder() -> GrammarBuilder<()> {
        GrammarBuilder::new()
    }
}

impl<C> Grammar<C> {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Look up a record type by name.
    pub fn record(&self, name: &str) -> Option<&RecordType> {
        self.schema.lookup(name).map(|id| self.schema.get(id))
    }

    pub(crate) fn hook(&self, id: RecordId) -> Option<&Hook<C>> {
        self.hooks.get(&id)
    }
}

impl<C> fmt::Debug for Grammar<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grammar")
            .field("schema", &self.schema)
            .field("hooks", &self.hooks.keys().map(|id| &self.schema.get(*id).name).collect::<Vec<_>>())
            .finish()
    }
}

// --- Builder ------------------------------------------------------------------

#[derive(Debug, Clone)]
enum KindSpec {
    Literal(String),
    Pattern(String),
    Until(String),
    Number(NumberKind),
    Record(String),
    Collection { element: String, min: usize, max: Option<usize> },
    Enum(Vec<String>),
    ContextEquals(String),
}

#[derive(Debug, Clone)]
enum OptionalSpec {
    Always,
    WhenNull(String),
    WhenNotNull(String),
    WhenFollowedBy(String),
}

/// Unresolved slot declaration.
///
/// Constructors pick the slot kind, chained methods add modifiers:
///
/// ```
/// use shapeparse::SlotSpec;
///
/// let tail = SlotSpec::literal("tail", "\n").optional();
/// let body = SlotSpec::until("body", r"\*/").with_pattern(r"[^@]*");
/// let kind = SlotSpec::enumeration("kind", ["get", "put"]).ignore_case();
/// # let _ = (tail, body, kind);
/// ```
#[derive(Debug, Clone)]
pub struct SlotSpec {
    name: String,
    kind: KindSpec,
    flags: SlotFlags,
    optional: Option<OptionalSpec>,
    ignore: Option<String>,
    pattern: Option<String>,
    converter: Option<Converter>,
}

impl SlotSpec {
    fn new(name: impl Into<String>, kind: KindSpec) -> Self {
        Self {
            name: name.into(),
            kind,
            flags: SlotFlags::empty(),
            optional: None,
            ignore: None,
            pattern: None,
            converter: None,
        }
    }

    /// Fixed text.
    pub fn literal(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Literal(text.into()))
    }

    /// Text matched by a regular expression anchored at the current position.
    pub fn pattern(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Pattern(pattern.into()))
    }

    /// Everything up to (not including) the first match of `terminator`.
    pub fn until(name: impl Into<String>, terminator: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Until(terminator.into()))
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Number(NumberKind::Integer))
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Number(NumberKind::Float))
    }

    /// Nested rule or variant, by record type name.
    pub fn record(name: impl Into<String>, record: impl Into<String>) -> Self {
        Self::new(name, KindSpec::Record(record.into()))
    }

    /// Repetition of `element` with `min..=max` items (`None` = unbounded).
    pub fn collection(name: impl Into<String>, element: impl Into<String>, min: usize, max: Option<usize>) -> Self {
        Self::new(name, KindSpec::Collection { element: element.into(), min, max })
    }

    pub fn enumeration<I, S>(name: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(name, KindSpec::Enum(names.into_iter().map(Into::into).collect()))
    }

    /// Must match the text captured by the earlier sibling `sibling`.
    pub fn context_equals(name: impl Into<String>, sibling: impl Into<String>) -> Self {
        Self::new(name, KindSpec::ContextEquals(sibling.into()))
    }

    pub fn optional(mut self) -> Self {
        self.optional = Some(OptionalSpec::Always);
        self
    }

    /// Optional only while `sibling` is null.
    pub fn optional_when_null(mut self, sibling: impl Into<String>) -> Self {
        self.optional = Some(OptionalSpec::WhenNull(sibling.into()));
        self
    }

    /// Optional only while `sibling` holds a value.
    pub fn optional_when_present(mut self, sibling: impl Into<String>) -> Self {
        self.optional = Some(OptionalSpec::WhenNotNull(sibling.into()));
        self
    }

    /// Optional only if the input at this slot matches `pattern`.
    pub fn optional_if_followed_by(mut self, pattern: impl Into<String>) -> Self {
        self.optional = Some(OptionalSpec::WhenFollowedBy(pattern.into()));
        self
    }

    pub fn ignore_case(mut self) -> Self {
        self.flags |= SlotFlags::IGNORE_CASE;
        self
    }

    /// Characters to skip before this slot's terminals.
    pub fn ignore_characters(mut self, chars: impl Into<String>, inherit: bool) -> Self {
        self.ignore = Some(chars.into());
        self.flags.set(SlotFlags::INHERIT_IGNORE, inherit);
        self
    }

    /// Additional pattern the whole capture of an `until` slot must match.
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    /// Convert matched text into a value.
    pub fn convert(mut self, converter: Converter) -> Self {
        self.converter = Some(converter);
        self
    }
}

/// Record-level settings shared by rules and variants.
#[derive(Debug, Clone, Default)]
struct RecordOptions {
    priority: i32,
    ignore: Option<IgnoreCharacters>,
}

/// Slots and settings of one rule; handed to the closure of [`GrammarBuilder::rule`].
#[derive(Debug, Clone, Default)]
pub struct RuleBuilder {
    slots: Vec<SlotSpec>,
    options: RecordOptions,
}

impl RuleBuilder {
    pub fn slot(mut self, slot: SlotSpec) -> Self {
        self.slots.push(slot);
        self
    }

    pub fn literal(self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.slot(SlotSpec::literal(name, text))
    }

    pub fn pattern(self, name: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.slot(SlotSpec::pattern(name, pattern))
    }

    pub fn record(self, name: impl Into<String>, record: impl Into<String>) -> Self {
        self.slot(SlotSpec::record(name, record))
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.options.priority = priority;
        self
    }

    pub fn ignore_characters(mut self, chars: impl Into<String>, inherit: bool) -> Self {
        self.options.ignore = Some(IgnoreCharacters { chars: chars.into(), inherit });
        self
    }
}

/// Settings of one variant; handed to the closure of [`GrammarBuilder::variant_with`].
#[derive(Debug, Clone, Default)]
pub struct VariantBuilder {
    options: RecordOptions,
}

impl VariantBuilder {
    pub fn priority(mut self, priority: i32) -> Self {
        self.options.priority = priority;
        self
    }

    pub fn ignore_characters(mut self, chars: impl Into<String>, inherit: bool) -> Self {
        self.options.ignore = Some(IgnoreCharacters { chars: chars.into(), inherit });
        self
    }
}

#[derive(Debug, Clone)]
enum ShapeSpec {
    Rule(Vec<SlotSpec>),
    Variant(Vec<String>),
}

#[derive(Debug, Clone)]
struct RecordSpec {
    name: String,
    shape: ShapeSpec,
    options: RecordOptions,
}

/// Collects record declarations and hooks, then resolves them in [`build`](Self::build).
pub struct GrammarBuilder<C = ()> {
    records: Vec<RecordSpec>,
    hooks: Vec<(String, Hook<C>)>,
}

impl<C> Default for GrammarBuilder<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> GrammarBuilder<C> {
    pub fn new() -> Self {
        Self { records: Vec::new(), hooks: Vec::new() }
    }

    /// Declare a rule: an ordered sequence of slots.
    pub fn rule(mut self, name: impl Into<String>, define: impl FnOnce(RuleBuilder) -> RuleBuilder) -> Self {
        let built = define(RuleBuilder::default());
        self.records.push(RecordSpec { name: name.into(), shape: ShapeSpec::Rule(built.slots), options: built.options });
        self
    }

    /// Declare a variant: candidates are tried in the given order.
    pub fn variant<I, S>(self, name: impl Into<String>, candidates: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variant_with(name, candidates, |v| v)
    }

    pub fn variant_with<I, S>(
        mut self,
        name: impl Into<String>,
        candidates: I,
        define: impl FnOnce(VariantBuilder) -> VariantBuilder,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let built = define(VariantBuilder::default());
        let candidates = candidates.into_iter().map(Into::into).collect();
        self.records.push(RecordSpec { name: name.into(), shape: ShapeSpec::Variant(candidates), options: built.options });
        self
    }

    /// Run `hook` for every populated record of type `name`, after the parse succeeds.
    pub fn on_populated(mut self, name: impl Into<String>, hook: impl Fn(&Record, &mut C) + Send + Sync + 'static) -> Self {
        self.hooks.push((name.into(), Box::new(hook)));
        self
    }

    /// Resolve names, compile patterns and validate the grammar.
    pub fn build(self) -> Result<Grammar<C>, ConfigError> {
        let mut by_name = HashMap::new();
        for (idx, spec) in self.records.iter().enumerate() {
            if by_name.insert(spec.name.clone(), RecordId(idx)).is_some() {
                return Err(ConfigError::DuplicateRecord(spec.name.clone()));
            }
        }

        let mut records = Vec::with_capacity(self.records.len());
        for spec in &self.records {
            let shape = match &spec.shape {
                ShapeSpec::Variant(candidates) => {
                    if candidates.is_empty() {
                        return Err(ConfigError::EmptyVariant(spec.name.clone()));
                    }
                    let ids = candidates
                        .iter()
                        .map(|c| resolve_name(&by_name, &spec.name, c))
                        .collect::<Result<Vec<_>, _>>()?;
                    Shape::Variant(ids)
                }
                ShapeSpec::Rule(slots) => {
                    if slots.is_empty() {
                        return Err(ConfigError::EmptyRule(spec.name.clone()));
                    }
                    let resolved = slots
                        .iter()
                        .enumerate()
                        .map(|(idx, slot)| resolve_slot(&self.records, &by_name, spec, slots, idx, slot))
                        .collect::<Result<Vec<_>, _>>()?;
                    Shape::Rule(resolved)
                }
            };
            records.push(RecordType {
                name: spec.name.clone(),
                shape,
                priority: spec.options.priority,
                ignore: spec.options.ignore.clone(),
            });
        }

        let mut hooks = HashMap::new();
        for (name, hook) in self.hooks {
            let id = by_name.get(&name).copied().ok_or(ConfigError::UnknownRecord(name))?;
            hooks.insert(id, hook);
        }

        tracing::debug!(records = records.len(), hooks = hooks.len(), "grammar built");
        Ok(Grammar { schema: Schema { records, by_name }, hooks })
    }
}

fn resolve_name(by_name: &HashMap<String, RecordId>, owner: &str, name: &str) -> Result<RecordId, ConfigError> {
    by_name
        .get(name)
        .copied()
        .ok_or_else(|| ConfigError::UnresolvedReference { record: owner.to_string(), name: name.to_string() })
}

fn resolve_slot(
    specs: &[RecordSpec],
    by_name: &HashMap<String, RecordId>,
    owner: &RecordSpec,
    siblings: &[SlotSpec],
    index: usize,
    slot: &SlotSpec,
) -> Result<SlotDescriptor, ConfigError> {
    let ignore_case = slot.flags.contains(SlotFlags::IGNORE_CASE);
    let invalid = |source: regex::Error| ConfigError::InvalidPattern {
        record: owner.name.clone(),
        slot: slot.name.clone(),
        source,
    };
    let sibling_index = |sibling: &str| -> Result<usize, ConfigError> {
        let found = siblings.iter().position(|s| s.name == sibling).ok_or_else(|| ConfigError::UnknownSibling {
            record: owner.name.clone(),
            slot: slot.name.clone(),
            sibling: sibling.to_string(),
        })?;
        if found >= index {
            return Err(ConfigError::SiblingOrder {
                record: owner.name.clone(),
                slot: slot.name.clone(),
                sibling: sibling.to_string(),
            });
        }
        Ok(found)
    };

    let kind = match &slot.kind {
        KindSpec::Literal(text) => SlotKind::Literal(text.clone()),
        KindSpec::Pattern(pattern) => {
            SlotKind::Pattern(CapturePattern::new(Some(pattern.as_str()), None, ignore_case).map_err(invalid)?)
        }
        KindSpec::Until(terminator) => SlotKind::Pattern(
            CapturePattern::new(slot.pattern.as_deref(), Some(terminator.as_str()), ignore_case).map_err(invalid)?,
        ),
        KindSpec::Number(kind) => SlotKind::Number(*kind),
        KindSpec::Record(name) => {
            let id = resolve_name(by_name, &owner.name, name)?;
            match specs[id.0].shape {
                ShapeSpec::Rule(_) => SlotKind::SubRule(id),
                ShapeSpec::Variant(_) => SlotKind::Variant(id),
            }
        }
        KindSpec::Collection { element, min, max } => {
            if max.is_some_and(|max| max == 0 || max < *min) {
                return Err(ConfigError::InvalidCaptureLimit {
                    record: owner.name.clone(),
                    slot: slot.name.clone(),
                    min: *min,
                    max: max.unwrap_or_default(),
                });
            }
            SlotKind::Collection {
                element: resolve_name(by_name, &owner.name, element)?,
                limit: CaptureLimit { min: *min, max: *max },
            }
        }
        KindSpec::Enum(names) => {
            if names.is_empty() {
                return Err(ConfigError::MissingPattern { record: owner.name.clone(), slot: slot.name.clone() });
            }
            let mut sorted: Vec<&String> = names.iter().collect();
            sorted.sort_by_key(|name| std::cmp::Reverse(name.len()));
            let alternation = sorted.iter().map(|name| regex::escape(name)).collect::<Vec<_>>().join("|");
            let pattern = CapturePattern::new(Some(alternation.as_str()), None, ignore_case).map_err(invalid)?;
            SlotKind::Enum(EnumSet { names: names.clone(), pattern })
        }
        KindSpec::ContextEquals(sibling) => SlotKind::ContextEquals { sibling: sibling_index(sibling)? },
    };

    let optional = match &slot.optional {
        None => None,
        Some(OptionalSpec::Always) => Some(Optionality::Always),
        Some(OptionalSpec::WhenNull(sibling)) => Some(Optionality::WhenNull(sibling_index(sibling)?)),
        Some(OptionalSpec::WhenNotNull(sibling)) => Some(Optionality::WhenNotNull(sibling_index(sibling)?)),
        Some(OptionalSpec::WhenFollowedBy(pattern)) => Some(Optionality::WhenFollowedBy(
            RegexBuilder::new(&format!("^(?:{pattern})")).case_insensitive(ignore_case).build().map_err(invalid)?,
        )),
    };

    Ok(SlotDescriptor {
        name: slot.name.clone(),
        kind,
        flags: slot.flags,
        optional,
        ignore: slot.ignore.clone(),
        converter: slot.converter,
    })
}
