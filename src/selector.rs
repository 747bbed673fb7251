// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Label selector parsing and matching.
//!
//! This module implements the Kubernetes label-selector grammar and uses it
//! for three things:
//!
//! - the configured **label selector**, evaluated against Service labels
//! - the configured **annotation filter**, evaluated against Service annotations
//! - **pod selection**, where a Service's `spec.selector` is matched against
//!   pods held in the reflector store
//!
//! # Grammar
//!
//! Requirements are separated by commas and all must hold:
//!
//! | Form | Meaning |
//! |------|---------|
//! | `key` | key is present |
//! | `!key` | key is absent |
//! | `key=value`, `key==value` | key is present with `value` |
//! | `key!=value` | key is absent or has another value |
//! | `key in (a, b)` | key is present with one of the values |
//! | `key notin (a, b)` | key is absent or has none of the values |
//!
//! An empty expression selects everything.
//!
//! # Example
//!
//! ```rust
//! use svcdns::selector::Selector;
//! use std::collections::BTreeMap;
//!
//! let selector: Selector = "app=web, tier in (frontend, edge)".parse().unwrap();
//! let labels = BTreeMap::from([
//!     ("app".to_string(), "web".to_string()),
//!     ("tier".to_string(), "edge".to_string()),
//! ]);
//! assert!(selector.matches(&labels));
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use kube::runtime::reflector::Store;
use kube::{Resource, ResourceExt};

const MAX_NAME_LENGTH: usize = 63;
const MAX_PREFIX_LENGTH: usize = 253;

/// Selector operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// A single `key <op> values` requirement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub key: String,
    pub operator: Operator,
    pub values: BTreeSet<String>,
}

impl Requirement {
    fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
            Operator::NotEquals | Operator::NotIn => value.is_none_or(|v| !self.values.contains(v)),
            Operator::Exists => value.is_some(),
            Operator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = || self.values.iter().cloned().collect::<Vec<_>>().join(",");
        match self.operator {
            Operator::Equals => write!(f, "{}={}", self.key, joined()),
            Operator::NotEquals => write!(f, "{}!={}", self.key, joined()),
            Operator::In => write!(f, "{} in ({})", self.key, joined()),
            Operator::NotIn => write!(f, "{} notin ({})", self.key, joined()),
            Operator::Exists => write!(f, "{}", self.key),
            Operator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A parsed label selector: a conjunction of requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    requirements: Vec<Requirement>,
}

impl Selector {
    /// A selector that matches every label set.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Builds an equality selector from a `matchLabels`-style map.
    ///
    /// An empty map yields a selector matching everything, the same way a
    /// Service with an empty `spec.selector` selects all pods.
    #[must_use]
    pub fn from_map(labels: &BTreeMap<String, String>) -> Self {
        Self {
            requirements: labels
                .iter()
                .map(|(key, value)| Requirement {
                    key: key.clone(),
                    operator: Operator::Equals,
                    values: BTreeSet::from([value.clone()]),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn is_everything(&self) -> bool {
        self.requirements.is_empty()
    }

    #[must_use]
    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    /// Returns `true` when every requirement holds for `labels`.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
        f.write_str(&parts.join(","))
    }
}

impl FromStr for Selector {
    type Err = String;

    fn from_str(expression: &str) -> Result<Self, Self::Err> {
        if expression.trim().is_empty() {
            return Ok(Self::everything());
        }

        let requirements = split_requirements(expression)?
            .into_iter()
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { requirements })
    }
}

/// Splits on commas that are not inside a parenthesised value set.
fn split_requirements(expression: &str) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (index, c) in expression.char_indices() {
        match c {
            '(' => {
                if depth > 0 {
                    return Err(format!("nested '(' at position {index}"));
                }
                depth += 1;
            }
            ')' => {
                if depth == 0 {
                    return Err(format!("unmatched ')' at position {index}"));
                }
                depth -= 1;
            }
            ',' if depth == 0 => {
                parts.push(&expression[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err("unclosed '(' in value set".to_string());
    }
    parts.push(&expression[start..]);

    Ok(parts)
}

fn parse_requirement(raw: &str) -> Result<Requirement, String> {
    let text = raw.trim();
    if text.is_empty() {
        return Err("empty requirement".to_string());
    }

    if let Some(key) = text.strip_prefix('!') {
        let key = key.trim();
        validate_key(key)?;
        return Ok(Requirement {
            key: key.to_string(),
            operator: Operator::DoesNotExist,
            values: BTreeSet::new(),
        });
    }

    if let Some(open) = text.find('(') {
        return parse_set_requirement(text, open);
    }

    let (key, operator, value) = if let Some((key, value)) = text.split_once("!=") {
        (key, Operator::NotEquals, value)
    } else if let Some((key, value)) = text.split_once("==") {
        (key, Operator::Equals, value)
    } else if let Some((key, value)) = text.split_once('=') {
        (key, Operator::Equals, value)
    } else {
        validate_key(text)?;
        return Ok(Requirement {
            key: text.to_string(),
            operator: Operator::Exists,
            values: BTreeSet::new(),
        });
    };

    let key = key.trim();
    let value = value.trim();
    validate_key(key)?;
    validate_value(value)?;

    Ok(Requirement {
        key: key.to_string(),
        operator,
        values: BTreeSet::from([value.to_string()]),
    })
}

fn parse_set_requirement(text: &str, open: usize) -> Result<Requirement, String> {
    let head: Vec<&str> = text[..open].split_whitespace().collect();
    let (key, operator) = match head.as_slice() {
        [key, "in"] => (*key, Operator::In),
        [key, "notin"] => (*key, Operator::NotIn),
        _ => {
            return Err(format!(
                "expected '<key> in (...)' or '<key> notin (...)', found '{text}'"
            ))
        }
    };
    validate_key(key)?;

    let body = text[open + 1..]
        .strip_suffix(')')
        .ok_or_else(|| format!("unexpected text after value set in '{text}'"))?;

    let mut values = BTreeSet::new();
    for value in body.split(',') {
        let value = value.trim();
        validate_value(value)?;
        values.insert(value.to_string());
    }
    if body.trim().is_empty() {
        return Err(format!("value set for '{key}' cannot be empty"));
    }

    Ok(Requirement {
        key: key.to_string(),
        operator,
        values,
    })
}

/// Validates a qualified name: `[prefix/]name`.
fn validate_key(key: &str) -> Result<(), String> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix {
        let valid_prefix = !prefix.is_empty()
            && prefix.len() <= MAX_PREFIX_LENGTH
            && prefix.split('.').all(|label| {
                !label.is_empty()
                    && !label.starts_with('-')
                    && !label.ends_with('-')
                    && label
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            });
        if !valid_prefix {
            return Err(format!("invalid key prefix '{prefix}' in '{key}'"));
        }
    }

    if name.is_empty() || !is_label_token(name) {
        return Err(format!("invalid key '{key}'"));
    }
    Ok(())
}

/// Validates a label value; the empty value is allowed.
fn validate_value(value: &str) -> Result<(), String> {
    if value.is_empty() || is_label_token(value) {
        Ok(())
    } else {
        Err(format!("invalid value '{value}'"))
    }
}

fn is_label_token(token: &str) -> bool {
    let bytes = token.as_bytes();
    token.len() <= MAX_NAME_LENGTH
        && bytes.first().is_some_and(u8::is_ascii_alphanumeric)
        && bytes.last().is_some_and(u8::is_ascii_alphanumeric)
        && bytes
            .iter()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'))
}

/// Lists objects in `namespace` whose labels match `selector`.
///
/// The reflector store is read synchronously; no API call is made.
///
/// # Arguments
///
/// * `store` - In-memory cache maintained by a reflector
/// * `namespace` - Namespace the objects must live in
/// * `selector` - Selector evaluated against each object's labels
///
/// # Returns
///
/// Matching objects, in store iteration order.
pub fn find_matching<K>(store: &Store<K>, namespace: &str, selector: &Selector) -> Vec<Arc<K>>
where
    K: Resource<DynamicType = ()> + ResourceExt + Clone + 'static,
{
    store
        .state()
        .into_iter()
        .filter(|obj| obj.namespace().as_deref() == Some(namespace))
        .filter(|obj| selector.matches(obj.labels()))
        .collect()
}

#[cfg(test)]
#[path = "selector_tests.rs"]
mod selector_tests;
