// Copyright (c) 2025 - Cowboy AI, Inc.

//! Compiled rule set
//!
//! Configuration-derived rules, read-only for the run. Compiling parses
//! every `compose`, `keyed_groups` and `groups` expression up front so a
//! malformed rule fails the configuration load instead of surfacing once
//! per host during the build.

use serde_json::Value;

use crate::config::{GroupByField, InventoryConfig, StaticGroupConfig};
use crate::errors::InventoryResult;
use crate::expr::{Expression, Predicate};
use crate::graph::sanitize_group_name;

/// A computed host variable
#[derive(Debug, Clone)]
pub struct ComposeRule {
    pub variable: String,
    pub expression: Expression,
}

/// A dynamic group derivation rule
#[derive(Debug, Clone)]
pub struct KeyedGroupRule {
    pub source: Expression,
    pub prefix: String,
    pub separator: String,
    pub default_value: Option<String>,
    pub parent_groups: Vec<String>,
    leading_separator: bool,
}

impl KeyedGroupRule {
    /// Derive the sanitized group names for one host's evaluation result.
    ///
    /// A scalar result is treated as a singleton list. Empty elements are
    /// substituted with `default_value` when set, otherwise dropped; a
    /// result with no usable elements yields no membership under this rule
    /// unless `default_value` fills in.
    pub fn group_names(&self, result: Option<Value>) -> Vec<String> {
        let elements = match result {
            None => Vec::new(),
            Some(Value::Array(items)) => items,
            Some(scalar) => vec![scalar],
        };

        let mut names = Vec::new();
        for element in &elements {
            let Some(text) = stringify(element) else {
                continue;
            };
            let text = if text.is_empty() {
                match &self.default_value {
                    Some(default) => default.clone(),
                    None => continue,
                }
            } else {
                text
            };
            let name = self.group_name(&text);
            if !names.contains(&name) {
                names.push(name);
            }
        }

        if names.is_empty() {
            if let Some(default) = &self.default_value {
                names.push(self.group_name(default));
            }
        }
        names
    }

    fn group_name(&self, element: &str) -> String {
        let element = sanitize_group_name(element);
        if self.prefix.is_empty() && !self.leading_separator {
            element
        } else {
            format!("{}{}{}", self.prefix, self.separator, element)
        }
    }
}

/// A static group with an optional membership predicate and parents
#[derive(Debug, Clone)]
pub struct StaticGroupRule {
    pub name: String,
    pub predicate: Option<Predicate>,
    pub parents: Vec<String>,
}

/// Everything the Group Graph Builder needs, parsed and validated
#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub statics: Vec<StaticGroupRule>,
    pub compose: Vec<ComposeRule>,
    pub keyed: Vec<KeyedGroupRule>,
    /// Built-in grouping dimensions, applied before the keyed rules
    pub group_by: Vec<GroupByField>,
    /// Region name used by the `region` built-in grouping
    pub region: Option<String>,
}

impl CompiledRules {
    /// Parse all rule expressions from the configuration, in declaration
    /// order
    pub fn compile(config: &InventoryConfig) -> InventoryResult<Self> {
        let mut statics = Vec::with_capacity(config.groups.len());
        for (name, group) in &config.groups {
            let (when, parents) = match group {
                StaticGroupConfig::Predicate(when) => (Some(when.as_str()), Vec::new()),
                StaticGroupConfig::Detailed { when, parents } => {
                    (when.as_deref(), parents.clone())
                }
            };
            statics.push(StaticGroupRule {
                name: name.clone(),
                predicate: when.map(Predicate::parse).transpose()?,
                parents,
            });
        }

        let mut compose = Vec::with_capacity(config.compose.len());
        for (variable, source) in &config.compose {
            compose.push(ComposeRule {
                variable: variable.clone(),
                expression: Expression::parse(source)?,
            });
        }

        let mut keyed = Vec::with_capacity(config.keyed_groups.len());
        for rule in &config.keyed_groups {
            keyed.push(KeyedGroupRule {
                source: Expression::parse(&rule.key)?,
                prefix: rule.prefix.clone(),
                separator: rule.separator.clone(),
                default_value: rule.default_value.clone(),
                parent_groups: rule.parent_groups.clone(),
                leading_separator: config.leading_separator,
            });
        }

        Ok(Self {
            statics,
            compose,
            keyed,
            group_by: config.group_by.clone(),
            region: config.region.clone(),
        })
    }
}

fn stringify(element: &Value) -> Option<String> {
    match element {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        // Nested collections are not usable as group name components
        _ => None,
    }
}
