//! Infix arithmetic.
//!
//! ```text
//! Formula = expr:Expr
//! Expr    = Num | Paren | Add | Sub | Mul | Div
//! Num     = value:float
//! Paren   = "(" expr:Expr ")"
//! Add     = left:Expr "+" right:Expr      priority 1
//! Sub     = left:Expr "-" right:Expr      priority 1
//! Mul     = left:Expr "*" right:Expr      priority 2
//! Div     = left:Expr "/" right:Expr      priority 2
//! ```
//!
//! Whitespace, including line breaks, is ignored everywhere below `Formula`.
//! The operator rules are written left-recursively; rotation turns `1-2-3`
//! into `Sub(Sub(1, 2), 3)` and priorities turn `1+2*3` into
//! `Add(1, Mul(2, 3))`. `Expr` works as a root too, without the whitespace
//! handling.

use crate::error::ConfigError;
use crate::schema::{Grammar, RuleBuilder, SlotSpec};
use crate::value::{Record, Value};

pub const ROOT: &str = "Formula";

pub fn grammar() -> Result<Grammar, ConfigError> {
    Grammar::builder()
        .rule("Formula", |r| r.record("expr", "Expr").ignore_characters(" \t\r\n", false))
        .variant("Expr", ["Num", "Paren", "Add", "Sub", "Mul", "Div"])
        .rule("Num", |r| r.slot(SlotSpec::float("value")))
        .rule("Paren", |r| r.literal("open", "(").record("expr", "Expr").literal("close", ")"))
        .rule("Add", |r| binary(r, "+").priority(1))
        .rule("Sub", |r| binary(r, "-").priority(1))
        .rule("Mul", |r| binary(r, "*").priority(2))
        .rule("Div", |r| binary(r, "/").priority(2))
        .build()
}

fn binary(rule: RuleBuilder, op: &str) -> RuleBuilder {
    rule.record("left", "Expr").literal("op", op).record("right", "Expr")
}

/// Fully parenthesised prefix rendering: `1+2*3` becomes `(+ 1 (* 2 3))`.
pub fn render(value: &Value) -> String {
    let Some(record) = value.as_record() else {
        return value.to_string();
    };
    match record.type_name.as_str() {
        "Formula" | "Paren" => record.get("expr").map(render).unwrap_or_default(),
        "Num" => record.get("value").map(Value::to_string).unwrap_or_default(),
        _ => {
            let operand = |name: &str| record.get(name).map(render).unwrap_or_default();
            let op = record.get("op").and_then(Value::as_str).unwrap_or("?");
            format!("({op} {} {})", operand("left"), operand("right"))
        }
    }
}

/// Evaluate a parsed formula. Returns `None` for a record this grammar does
/// not produce.
pub fn evaluate(value: &Value) -> Option<f64> {
    let record = value.as_record()?;
    match record.type_name.as_str() {
        "Formula" | "Paren" => evaluate(record.get("expr")?),
        "Num" => match record.get("value")? {
            Value::Float(x) => Some(*x),
            Value::Integer(n) => Some(*n as f64),
            _ => None,
        },
        _ => {
            let (left, right) = operands(record)?;
            match record.type_name.as_str() {
                "Add" => Some(left + right),
                "Sub" => Some(left - right),
                "Mul" => Some(left * right),
                "Div" => Some(left / right),
                _ => None,
            }
        }
    }
}

fn operands(record: &Record) -> Option<(f64, f64)> {
    Some((evaluate(record.get("left")?)?, evaluate(record.get("right")?)?))
}
