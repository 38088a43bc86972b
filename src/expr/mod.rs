// Copyright (c) 2025 - Cowboy AI, Inc.

//! Expression Engine
//!
//! A closed pipeline grammar evaluated against a host's [`AttributeMap`]:
//! a dotted attribute path followed by zero or more `| filter(args…)`
//! stages applied left-to-right. Powers both `compose` (computed host
//! variables) and `keyed_groups` (templated group names); static `groups`
//! use the same pipeline with an optional trailing `==`/`!=` comparison.
//!
//! Supported stages:
//!
//! - `default(x)` - substitute `x` when the upstream value is absent or
//!   empty-equivalent (null, `""`, `[]`, `{}`)
//! - `split(sep)` - split a string on a literal separator
//! - `reject('equalto', x)` - drop list elements equal to `x`
//! - `list` - coerce the value into its list representation
//!
//! Evaluation is pure and total: a stage applied to an absent value yields
//! absent (modeled as `None`) unless the stage is `default`. Structural
//! errors (unknown filter, wrong argument count) are caught at parse time,
//! never during a per-host evaluation. This is a fixed tagged-variant AST,
//! not general-purpose templating, so rule behavior stays auditable.

mod parser;

use serde_json::Value;
use thiserror::Error;

use crate::record::{lookup, AttributeMap};

/// Expression parse error, raised at configuration-load time
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExpressionError {
    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unterminated string literal starting at position {0}")]
    UnterminatedString(usize),

    #[error("Unknown filter '{0}'")]
    UnknownFilter(String),

    #[error("Filter '{0}' expects {1} argument(s), got {2}")]
    WrongArity(String, usize, usize),

    #[error("Unsupported test '{0}', only 'equalto' is available")]
    UnknownTest(String),

    #[error("Invalid argument for '{0}': {1}")]
    InvalidArgument(String, String),

    #[error("Invalid literal '{0}'")]
    InvalidLiteral(String),
}

/// One pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Default(Value),
    Split(String),
    RejectEqualTo(Value),
    List,
}

/// A parsed pipeline expression
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    path: String,
    stages: Vec<Stage>,
}

impl Expression {
    /// Parse an expression string, validating filter names and arities
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        parser::parse_expression(input)
    }

    /// The original expression text
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a host's attributes. `None` means absent.
    pub fn evaluate(&self, attrs: &AttributeMap) -> Option<Value> {
        let mut value = lookup(attrs, &self.path).cloned();
        for stage in &self.stages {
            value = apply(stage, value);
        }
        value
    }
}

/// Comparison operator usable in a static-group predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
}

/// A membership predicate for static `groups` configuration
///
/// Without a comparison the pipeline result is tested for truthiness.
/// An absent result never matches, under either operator, so hosts
/// missing the referenced attribute are excluded from the group.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    expr: Expression,
    comparison: Option<(Comparison, Value)>,
}

impl Predicate {
    /// Parse a predicate string
    pub fn parse(input: &str) -> Result<Self, ExpressionError> {
        parser::parse_predicate(input)
    }

    /// Decide membership for one host
    pub fn matches(&self, attrs: &AttributeMap) -> bool {
        let value = self.expr.evaluate(attrs);
        match (&self.comparison, value) {
            (None, value) => truthy(value.as_ref()),
            (Some(_), None) => false,
            (Some((Comparison::Eq, expected)), Some(actual)) => actual == *expected,
            (Some((Comparison::Ne, expected)), Some(actual)) => actual != *expected,
        }
    }
}

fn apply(stage: &Stage, value: Option<Value>) -> Option<Value> {
    match stage {
        Stage::Default(fallback) => match value {
            Some(v) if !is_empty_equivalent(&v) => Some(v),
            _ => Some(fallback.clone()),
        },
        Stage::Split(sep) => {
            let text = scalar_text(&value?)?;
            Some(Value::Array(
                text.split(sep.as_str())
                    .map(|part| Value::String(part.to_string()))
                    .collect(),
            ))
        }
        Stage::RejectEqualTo(rejected) => {
            let items = into_list(value?);
            Some(Value::Array(
                items.into_iter().filter(|item| item != rejected).collect(),
            ))
        }
        Stage::List => Some(Value::Array(into_list(value?))),
    }
}

/// Values `default` treats as substitutable
fn is_empty_equivalent(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    }
}

/// Truthiness for predicate results
pub(crate) fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(Value::Object(o)) => !o.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
    }
}

/// Scalar text for `split`; non-scalar inputs yield absent
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// List coercion: lists pass through, mappings yield their keys,
/// scalars become singleton lists
fn into_list(value: Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items,
        Value::Object(fields) => fields.keys().map(|k| Value::String(k.clone())).collect(),
        Value::Null => Vec::new(),
        scalar => vec![scalar],
    }
}
