use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
};

use super::quote::{quote, quote_if_needed};

/// Accessor applied after a component's field name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Bare field.
    Simple,
    /// Field followed by a list index, `name[3]`.
    Array(usize),
    /// Field followed by a map key, `name[<<key>>]`.
    Map(String),
}

impl ComponentKind {
    fn rank(&self) -> u8 {
        match self {
            ComponentKind::Simple => 0,
            ComponentKind::Array(_) => 1,
            ComponentKind::Map(_) => 2,
        }
    }
}

/// One segment of a [`super::PathIdentifier`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: ComponentKind,
}

impl Component {
    pub fn simple<S: Into<String>>(name: S) -> Component {
        Component {
            name: name.into(),
            kind: ComponentKind::Simple,
        }
    }

    pub fn array<S: Into<String>>(name: S, index: usize) -> Component {
        Component {
            name: name.into(),
            kind: ComponentKind::Array(index),
        }
    }

    pub fn map<S: Into<String>, K: Into<String>>(name: S, key: K) -> Component {
        Component {
            name: name.into(),
            kind: ComponentKind::Map(key.into()),
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self.kind, ComponentKind::Simple)
    }

    pub fn index(&self) -> Option<usize> {
        match self.kind {
            ComponentKind::Array(index) => Some(index),
            _ => None,
        }
    }

    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            ComponentKind::Map(key) => Some(key),
            _ => None,
        }
    }
}

/// Name first, then kind, then index or key.
impl Ord for Component {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name
            .cmp(&other.name)
            .then_with(|| self.kind.rank().cmp(&other.kind.rank()))
            .then_with(|| match (&self.kind, &other.kind) {
                (ComponentKind::Array(l), ComponentKind::Array(r)) => l.cmp(r),
                (ComponentKind::Map(l), ComponentKind::Map(r)) => l.cmp(r),
                _ => Ordering::Equal,
            })
    }
}

impl PartialOrd for Component {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for Component {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", quote_if_needed(&self.name))?;
        match &self.kind {
            ComponentKind::Simple => Ok(()),
            ComponentKind::Array(index) => write!(f, "[{index}]"),
            ComponentKind::Map(key) => write!(f, "[{}]", quote(key)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_display() {
        assert_eq!(Component::simple("Length").to_string(), "Length");
        assert_eq!(Component::array("Points", 2).to_string(), "Points[2]");
        assert_eq!(
            Component::map("Constraints", "width").to_string(),
            "Constraints[<<width>>]"
        );
        assert_eq!(Component::simple("two words").to_string(), "<<two words>>");
    }

    #[test]
    fn test_component_ordering() {
        let mut comps = vec![
            Component::map("b", "z"),
            Component::array("b", 3),
            Component::simple("b"),
            Component::array("b", 1),
            Component::simple("a"),
            Component::map("b", "a"),
        ];
        comps.sort();
        assert_eq!(
            comps,
            vec![
                Component::simple("a"),
                Component::simple("b"),
                Component::array("b", 1),
                Component::array("b", 3),
                Component::map("b", "a"),
                Component::map("b", "z"),
            ]
        );
    }
}
