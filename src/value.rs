use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use crate::{
    paths::{quote, Component, ComponentKind, PathIdentifier},
    PathflowError,
};

/// Value held by an attribute, or produced by a formula.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Number(0.0)
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Map(_) => "map",
        }
    }

    pub fn as_number(&self) -> Result<f64, PathflowError> {
        match self {
            Value::Number(n) => Ok(*n),
            Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
            other => Err(PathflowError::Evaluation(format!(
                "expected a number, found {}",
                other.type_name()
            ))),
        }
    }

    fn step(&self, field: &str) -> Option<&Value> {
        match self {
            Value::Map(map) => map.get(field),
            _ => None,
        }
    }

    fn step_mut(&mut self, field: &str) -> Option<&mut Value> {
        match self {
            Value::Map(map) => map.get_mut(field),
            _ => None,
        }
    }

    fn access(&self, kind: &ComponentKind) -> Option<&Value> {
        match (kind, self) {
            (ComponentKind::Simple, _) => Some(self),
            (ComponentKind::Array(index), Value::List(items)) => items.get(*index),
            (ComponentKind::Map(key), Value::Map(map)) => map.get(key),
            _ => None,
        }
    }

    fn access_mut(&mut self, kind: &ComponentKind) -> Option<&mut Value> {
        match (kind, self) {
            (ComponentKind::Simple, value) => Some(value),
            (ComponentKind::Array(index), Value::List(items)) => items.get_mut(*index),
            (ComponentKind::Map(key), Value::Map(map)) => {
                Some(map.entry(key.clone()).or_default())
            }
            _ => None,
        }
    }

    /// Follow `path` below this value. Component 0's name has already selected this value, so
    /// only its accessor applies; later components select map fields.
    pub fn get_path(&self, path: &[Component]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        let mut current = self.access(&first.kind)?;
        for component in rest {
            current = current.step(&component.name)?.access(&component.kind)?;
        }
        Some(current)
    }

    /// Like [`Value::access`], but `Some(None)` when a map key would be created.
    fn probe(&self, kind: &ComponentKind) -> Option<Option<&Value>> {
        match (kind, self) {
            (ComponentKind::Simple, _) => Some(Some(self)),
            (ComponentKind::Array(index), Value::List(items)) => items.get(*index).map(Some),
            (ComponentKind::Map(key), Value::Map(map)) => Some(map.get(key)),
            _ => None,
        }
    }

    /// Whether [`Value::set_path`] can reach the end of `path`. Only the last component may
    /// name a field or key that does not exist yet.
    fn can_set_path(&self, path: &[Component]) -> bool {
        let mut current = Some(self);
        for (idx, component) in path.iter().enumerate() {
            let Some(value) = current else {
                return false;
            };
            let field = if idx == 0 {
                Some(value)
            } else {
                match value {
                    Value::Map(map) => map.get(&component.name),
                    _ => return false,
                }
            };
            current = match field {
                Some(field) => match field.probe(&component.kind) {
                    Some(next) => next,
                    None => return false,
                },
                None if component.kind == ComponentKind::Simple => None,
                None => return false,
            };
        }
        true
    }

    /// Replace the value addressed by `path` (same convention as [`Value::get_path`]).
    ///
    /// A missing map field or key is created when it is the last component; list indices must
    /// already exist. A failed write leaves the value untouched.
    pub fn set_path(&mut self, path: &[Component], value: Value) -> Result<(), PathflowError> {
        let Some((first, rest)) = path.split_first() else {
            *self = value;
            return Ok(());
        };
        if !self.can_set_path(path) {
            return Err(PathflowError::UnresolvedPath(format!(
                "no writable value at '{}'",
                PathIdentifier::new(path.to_vec())
            )));
        }
        let missing = |c: &Component| {
            PathflowError::UnresolvedPath(format!("no value at component '{c}'"))
        };
        let mut current = self.access_mut(&first.kind).ok_or_else(|| missing(first))?;
        for component in rest {
            if let Value::Map(map) = &mut *current {
                map.entry(component.name.clone()).or_default();
            }
            current = current
                .step_mut(&component.name)
                .ok_or_else(|| missing(component))?
                .access_mut(&component.kind)
                .ok_or_else(|| missing(component))?;
        }
        *current = value;
        Ok(())
    }

    /// Paths to every nested map field and list entry, relative to this value.
    pub fn sub_paths(&self, prefix: &[Component]) -> Vec<Vec<Component>> {
        let mut found = Vec::new();
        match self {
            Value::Map(map) => {
                for (field, child) in map {
                    let mut path = prefix.to_vec();
                    path.push(Component::simple(field.clone()));
                    found.push(path.clone());
                    found.extend(child.sub_paths(&path));
                }
            }
            Value::List(items) => {
                if let Some((last, head)) = prefix.split_last() {
                    if last.is_simple() {
                        for idx in 0..items.len() {
                            let mut path = head.to_vec();
                            path.push(Component::array(last.name.clone(), idx));
                            found.push(path);
                        }
                    }
                }
            }
            _ => {}
        }
        found
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(t) => write!(f, "{}", quote(t)),
            Value::List(items) => {
                let parts = items.iter().map(|v| v.to_string()).collect::<Vec<_>>();
                write!(f, "[{}]", parts.join(", "))
            }
            Value::Map(map) => {
                let parts = map
                    .iter()
                    .map(|(k, v)| format!("{k} = {v}"))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", parts.join(", "))
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}
