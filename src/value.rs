//! Parse results.
//!
//! A successful parse produces a [`Value`] tree that mirrors the grammar:
//! every rule becomes a [`Record`] with one field per slot (in slot order),
//! collections become lists, and terminals carry their converted text.
//!
//! Typed access goes through [`FromValue`], so callers can write
//! `record.get_as::<i64>("count")?` instead of matching by hand.

use std::fmt;
use std::str::FromStr;

use crate::error::ConversionError;

/// Dynamic value produced for a slot or record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Skipped optional slot, or a context-equals slot whose sibling was null.
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    /// Canonical enumerator name.
    Enum(String),
    Record(Record),
    List(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) | Value::Enum(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    /// Short name of the value's shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Text(_) => "text",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Enum(_) => "enum",
            Value::Record(_) => "record",
            Value::List(_) => "list",
        }
    }

    /// Concatenate the text of every terminal, in order.
    ///
    /// Ignored characters are not part of any terminal, so for inputs without
    /// them this reproduces the parsed text exactly.
    pub fn to_source(&self) -> String {
        let mut out = String::new();
        self.write_source(&mut out);
        out
    }

    fn write_source(&self, out: &mut String) {
        match self {
            Value::Null => {}
            Value::Text(s) | Value::Enum(s) => out.push_str(s),
            Value::Integer(n) => out.push_str(&n.to_string()),
            Value::Float(x) => out.push_str(&x.to_string()),
            Value::Record(r) => r.fields.iter().for_each(|(_, v)| v.write_source(out)),
            Value::List(items) => items.iter().for_each(|v| v.write_source(out)),
        }
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{x}"),
            Value::Enum(s) => f.write_str(s),
            Value::Record(r) => r.fmt(f),
            Value::List(items) => {
                f.write_str("[")?;
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt(f)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A populated rule: the record type's name and its slot values.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl Record {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self { type_name: type_name.into(), fields: Vec::new() }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.iter().find(|(name, _)| name == field).map(|(_, v)| v)
    }

    /// Typed field access.
    pub fn get_as<T: FromValue>(&self, field: &str) -> Result<T, ConversionError> {
        let value = self.get(field).ok_or_else(|| ConversionError::MissingField {
            record: self.type_name.clone(),
            field: field.to_string(),
        })?;
        T::from_value(value.clone())
    }

    pub fn is(&self, type_name: &str) -> bool {
        self.type_name == type_name
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.type_name)?;
        for (idx, (name, value)) in self.fields.iter().enumerate() {
            if idx > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        f.write_str(")")
    }
}

// --- Typed extraction ---------------------------------------------------------

/// Conversion from a parsed [`Value`] into a Rust type.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, ConversionError>;
}

fn mismatch(expected: &'static str, value: &Value) -> ConversionError {
    ConversionError::Mismatch { expected, found: value.kind() }
}

impl FromValue for Value {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        Ok(value)
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Text(s) | Value::Enum(s) => Ok(s),
            other => Err(mismatch("text", &other)),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Integer(n) => Ok(n),
            Value::Text(ref s) => s.trim().parse().map_err(|_| mismatch("integer", &value)),
            other => Err(mismatch("integer", &other)),
        }
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Integer(n) => Ok(n as f64),
            Value::Text(ref s) => s.trim().parse().map_err(|_| mismatch("float", &value)),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl FromValue for Record {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Record(r) => Ok(r),
            other => Err(mismatch("record", &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: Value) -> Result<Self, ConversionError> {
        match value {
            Value::List(items) => items.into_iter().map(T::from_value).collect(),
            other => Err(mismatch("list", &other)),
        }
    }
}

/// Converter that parses matched text with [`FromStr`].
///
/// ```
/// use shapeparse::{Grammar, SlotSpec, value::parsed};
///
/// let grammar = Grammar::builder()
///     .rule("Port", |r| r.literal("colon", ":").slot(SlotSpec::pattern("port", r"\d+").convert(parsed::<i64>)))
///     .build()
///     .unwrap();
/// assert!(grammar.record("Port").is_some());
/// ```
pub fn parsed<T>(text: &str) -> Result<Value, String>
where
    T: FromStr + Into<Value>,
    T::Err: fmt::Display,
{
    text.parse::<T>().map(Into::into).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Record {
        Record {
            type_name: "Statement".to_string(),
            fields: vec![
                ("marker".to_string(), Value::Text(":".to_string())),
                ("command".to_string(), Value::Text("test".to_string())),
                ("count".to_string(), Value::Integer(3)),
                ("note".to_string(), Value::Null),
            ],
        }
    }

    #[test]
    fn typed_field_access() {
        let record = sample();
        assert_eq!(record.get_as::<String>("command").unwrap(), "test");
        assert_eq!(record.get_as::<i64>("count").unwrap(), 3);
        assert_eq!(record.get_as::<f64>("count").unwrap(), 3.0);
        assert_eq!(record.get_as::<Option<String>>("note").unwrap(), None);
    }

    #[test]
    fn typed_access_reports_mismatch_and_missing() {
        let record = sample();
        assert!(matches!(record.get_as::<Record>("count"), Err(ConversionError::Mismatch { .. })));
        assert!(matches!(record.get_as::<String>("nope"), Err(ConversionError::MissingField { .. })));
    }

    #[test]
    fn to_source_concatenates_terminals() {
        let value = Value::Record(sample());
        assert_eq!(value.to_source(), ":test3");
    }

    #[test]
    fn parsed_converter_uses_from_str() {
        assert_eq!(parsed::<i64>("42"), Ok(Value::Integer(42)));
        assert!(parsed::<i64>("4x").is_err());
    }

    #[test]
    fn display_renders_nested_values() {
        let value = Value::List(vec![Value::Integer(1), Value::Record(Record::new("Empty"))]);
        assert_eq!(value.to_string(), "[1, Empty()]");
    }
}
