/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Compiled route conditions: an immutable predicate tree and a pure evaluator.

use crate::message::{system_properties, Message};
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::sync::Arc;

/// Three-valued truth used by condition evaluation.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Truth {
    True,
    False,
    Undefined,
}

impl Truth {
    fn from_bool(value: bool) -> Self {
        if value {
            Truth::True
        } else {
            Truth::False
        }
    }

    pub fn and(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::False, _) | (_, Truth::False) => Truth::False,
            (Truth::True, Truth::True) => Truth::True,
            _ => Truth::Undefined,
        }
    }

    pub fn or(self, other: Truth) -> Truth {
        match (self, other) {
            (Truth::True, _) | (_, Truth::True) => Truth::True,
            (Truth::False, Truth::False) => Truth::False,
            _ => Truth::Undefined,
        }
    }

    pub fn not(self) -> Truth {
        match self {
            Truth::True => Truth::False,
            Truth::False => Truth::True,
            Truth::Undefined => Truth::Undefined,
        }
    }

    pub fn is_true(self) -> bool {
        self == Truth::True
    }
}

/// Runtime value of an operand.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl Value {
    fn truth(&self) -> Truth {
        match self {
            Value::Bool(value) => Truth::from_bool(*value),
            _ => Truth::Undefined,
        }
    }

    fn from_truth(truth: Truth) -> Value {
        match truth {
            Truth::True => Value::Bool(true),
            Truth::False => Value::Bool(false),
            Truth::Undefined => Value::Undefined,
        }
    }

    fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(*value),
            serde_json::Value::Number(number) => number
                .as_f64()
                .map(Value::Number)
                .unwrap_or(Value::Undefined),
            serde_json::Value::String(value) => Value::String(value.clone()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => Value::Undefined,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// Built-in functions callable from a condition.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Builtin {
    IsDefined,
    IsString,
    IsNumber,
    IsBool,
    StartsWith,
    EndsWith,
    Contains,
    Lower,
    Upper,
}

impl Builtin {
    pub fn from_name(name: &str) -> Option<Self> {
        let builtin = match name.to_ascii_uppercase().as_str() {
            "IS_DEFINED" => Builtin::IsDefined,
            "IS_STRING" => Builtin::IsString,
            "IS_NUMBER" => Builtin::IsNumber,
            "IS_BOOL" => Builtin::IsBool,
            "STARTS_WITH" => Builtin::StartsWith,
            "ENDS_WITH" => Builtin::EndsWith,
            "CONTAINS" => Builtin::Contains,
            "LOWER" => Builtin::Lower,
            "UPPER" => Builtin::Upper,
            _ => return None,
        };
        Some(builtin)
    }

    pub fn arity(self) -> usize {
        match self {
            Builtin::StartsWith | Builtin::EndsWith | Builtin::Contains => 2,
            _ => 1,
        }
    }

    fn apply(self, args: &[Value]) -> Value {
        match (self, args) {
            (Builtin::IsDefined, [value]) => Value::Bool(*value != Value::Undefined),
            (Builtin::IsString, [value]) => Value::Bool(matches!(value, Value::String(_))),
            (Builtin::IsNumber, [value]) => Value::Bool(matches!(value, Value::Number(_))),
            (Builtin::IsBool, [value]) => Value::Bool(matches!(value, Value::Bool(_))),
            (Builtin::StartsWith, [Value::String(text), Value::String(prefix)]) => {
                Value::Bool(text.starts_with(prefix.as_str()))
            }
            (Builtin::EndsWith, [Value::String(text), Value::String(suffix)]) => {
                Value::Bool(text.ends_with(suffix.as_str()))
            }
            (Builtin::Contains, [Value::String(text), Value::String(needle)]) => {
                Value::Bool(text.contains(needle.as_str()))
            }
            (Builtin::Lower, [Value::String(text)]) => Value::String(text.to_lowercase()),
            (Builtin::Upper, [Value::String(text)]) => Value::String(text.to_uppercase()),
            _ => Value::Undefined,
        }
    }
}

/// Predicate tree produced by the rule parser.
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Literal(Value),
    /// Application property, addressed by a bare identifier.
    Property(String),
    /// System property, addressed as `$name`.
    SystemProperty(String),
    /// JSON body query, addressed as `$body.a.b`.
    BodyQuery(Vec<String>),
    Compare {
        op: ComparisonOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Call {
        function: Builtin,
        args: Vec<Expr>,
    },
}

/// Per-message evaluation state. The JSON body is decoded at most once.
struct EvaluationContext<'a> {
    message: &'a Message,
    body: OnceCell<Option<serde_json::Value>>,
}

impl<'a> EvaluationContext<'a> {
    fn new(message: &'a Message) -> Self {
        Self {
            message,
            body: OnceCell::new(),
        }
    }

    fn json_body(&self) -> Option<&serde_json::Value> {
        self.body
            .get_or_init(|| {
                if !has_json_content(self.message) {
                    return None;
                }
                serde_json::from_slice(self.message.body()).ok()
            })
            .as_ref()
    }
}

fn has_json_content(message: &Message) -> bool {
    let content_type_is_json = message
        .system_property(system_properties::CONTENT_TYPE)
        .map(|content_type| {
            content_type
                .split(';')
                .next()
                .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
                .unwrap_or(false)
        })
        .unwrap_or(false);
    let encoding_is_utf8 = message
        .system_property(system_properties::CONTENT_ENCODING)
        .map(|encoding| {
            encoding.eq_ignore_ascii_case("utf-8") || encoding.eq_ignore_ascii_case("utf8")
        })
        .unwrap_or(true);

    content_type_is_json && encoding_is_utf8
}

impl Expr {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Value {
        match self {
            Expr::Literal(value) => value.clone(),
            Expr::Property(name) => ctx
                .message
                .property(name)
                .map(|value| Value::String(value.to_string()))
                .unwrap_or(Value::Undefined),
            Expr::SystemProperty(name) => ctx
                .message
                .system_property(name)
                .map(|value| Value::String(value.to_string()))
                .unwrap_or(Value::Undefined),
            Expr::BodyQuery(path) => {
                let mut current = match ctx.json_body() {
                    Some(body) => body,
                    None => return Value::Undefined,
                };
                for segment in path {
                    current = match current.get(segment.as_str()) {
                        Some(next) => next,
                        None => return Value::Undefined,
                    };
                }
                Value::from_json(current)
            }
            Expr::Compare { op, lhs, rhs } => {
                Value::from_truth(compare(&lhs.evaluate(ctx), &rhs.evaluate(ctx), *op))
            }
            Expr::And(lhs, rhs) => {
                let left = lhs.evaluate(ctx).truth();
                if left == Truth::False {
                    return Value::Bool(false);
                }
                Value::from_truth(left.and(rhs.evaluate(ctx).truth()))
            }
            Expr::Or(lhs, rhs) => {
                let left = lhs.evaluate(ctx).truth();
                if left == Truth::True {
                    return Value::Bool(true);
                }
                Value::from_truth(left.or(rhs.evaluate(ctx).truth()))
            }
            Expr::Not(inner) => Value::from_truth(inner.evaluate(ctx).truth().not()),
            Expr::Call { function, args } => {
                let values: Vec<Value> = args.iter().map(|arg| arg.evaluate(ctx)).collect();
                function.apply(&values)
            }
        }
    }
}

fn compare(lhs: &Value, rhs: &Value, op: ComparisonOp) -> Truth {
    let ordering = match (lhs, rhs) {
        (Value::Number(left), Value::Number(right)) => left.partial_cmp(right),
        (Value::String(left), Value::String(right)) => Some(left.cmp(right)),
        (Value::Bool(left), Value::Bool(right)) => {
            return match op {
                ComparisonOp::Eq => Truth::from_bool(left == right),
                ComparisonOp::Ne => Truth::from_bool(left != right),
                _ => Truth::Undefined,
            };
        }
        (Value::Null, Value::Null) => {
            return match op {
                ComparisonOp::Eq => Truth::True,
                ComparisonOp::Ne => Truth::False,
                _ => Truth::Undefined,
            };
        }
        _ => None,
    };

    let Some(ordering) = ordering else {
        return Truth::Undefined;
    };

    Truth::from_bool(match op {
        ComparisonOp::Eq => ordering == Ordering::Equal,
        ComparisonOp::Ne => ordering != Ordering::Equal,
        ComparisonOp::Lt => ordering == Ordering::Less,
        ComparisonOp::Le => ordering != Ordering::Greater,
        ComparisonOp::Gt => ordering == Ordering::Greater,
        ComparisonOp::Ge => ordering != Ordering::Less,
    })
}

/// A compiled, shareable route condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    expr: Arc<Expr>,
}

impl Condition {
    pub fn new(expr: Expr) -> Self {
        Self {
            expr: Arc::new(expr),
        }
    }

    /// Condition of a route without a `WHERE` clause.
    pub fn always() -> Self {
        Self::new(Expr::Literal(Value::Bool(true)))
    }

    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    pub fn evaluate(&self, message: &Message) -> Truth {
        let ctx = EvaluationContext::new(message);
        self.expr.evaluate(&ctx).truth()
    }

    /// True only when the condition evaluates to `true`; undefined does not match.
    pub fn matches(&self, message: &Message) -> bool {
        self.evaluate(message).is_true()
    }
}
