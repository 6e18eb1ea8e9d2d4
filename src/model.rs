//! Contract between the engine and the object model that owns attributes.
//!
//! The engine never holds references into the host. It addresses holders by [`HolderRef`] and
//! asks the [`AttributeHost`] for everything else: holder lookup, attribute reads and writes,
//! staleness and the object-level dependency closure.

use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
};

use crate::{
    paths::{quote_if_needed, Component, PathIdentifier},
    value::Value,
    PathflowError,
};

/// Stable address of a holder: container name plus the holder's stable name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HolderRef {
    pub container: String,
    pub holder: String,
}

impl HolderRef {
    pub fn new<C: Into<String>, H: Into<String>>(container: C, holder: H) -> HolderRef {
        HolderRef {
            container: container.into(),
            holder: holder.into(),
        }
    }

    /// Pinned path to `components` on this holder.
    pub fn path(&self, components: Vec<Component>) -> PathIdentifier {
        PathIdentifier::qualified(&self.container, &self.holder, components)
    }

    /// Pinned path to a top level attribute of this holder.
    pub fn attribute(&self, attribute: &str) -> PathIdentifier {
        self.path(vec![Component::simple(attribute)])
    }
}

impl Display for HolderRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}#{}",
            quote_if_needed(&self.container),
            quote_if_needed(&self.holder)
        )
    }
}

/// Snapshot of one holder's identity inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolderEntry {
    pub name: String,
    pub label: String,
}

impl HolderEntry {
    pub fn new<N: Into<String>, L: Into<String>>(name: N, label: L) -> HolderEntry {
        HolderEntry {
            name: name.into(),
            label: label.into(),
        }
    }
}

/// Outcome of resolving user text to a holder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HolderLookup {
    /// Stable name of the single holder the text designates.
    Unique(String),
    NotFound,
    Ambiguous,
}

impl HolderLookup {
    pub fn unique(self) -> Option<String> {
        match self {
            HolderLookup::Unique(name) => Some(name),
            _ => None,
        }
    }
}

/// Resolve `text` against stable names and labels.
///
/// - exactly one label match and no name match: that holder
/// - a name match and no label match: that holder
/// - a name match and a single label match on the same holder: that holder
/// - several label matches, or name and label matching different holders: ambiguous
pub fn lookup_holder(entries: &[HolderEntry], text: &str) -> HolderLookup {
    let mut by_label = None;
    for entry in entries.iter().filter(|e| e.label == text) {
        if by_label.is_some() {
            return HolderLookup::Ambiguous;
        }
        by_label = Some(entry.name.as_str());
    }
    let by_name = entries
        .iter()
        .find(|e| e.name == text)
        .map(|e| e.name.as_str());

    match (by_name, by_label) {
        (None, None) => HolderLookup::NotFound,
        (Some(name), None) | (None, Some(name)) => HolderLookup::Unique(name.to_string()),
        (Some(name), Some(label_owner)) if name == label_owner => {
            HolderLookup::Unique(name.to_string())
        }
        (Some(_), Some(_)) => HolderLookup::Ambiguous,
    }
}

/// Object model collaborator.
///
/// Methods take `&self`: evaluation writes back through the host while the engine is running,
/// and a write may trigger further engine activity. Implementations use interior mutability.
pub trait AttributeHost {
    fn containers(&self) -> Vec<String>;

    fn has_container(&self, container: &str) -> bool {
        self.containers().iter().any(|c| c == container)
    }

    /// Stable names and labels of every holder in `container`.
    fn holders(&self, container: &str) -> Vec<HolderEntry>;

    fn resolve_holder(&self, container: &str, text: &str) -> HolderLookup {
        lookup_holder(&self.holders(container), text)
    }

    fn attribute_names(&self, holder: &HolderRef) -> Vec<String>;

    fn has_attribute(&self, holder: &HolderRef, attribute: &str) -> bool {
        self.attribute_names(holder).iter().any(|a| a == attribute)
    }

    /// Read the value addressed by `path`, component 0 being the attribute.
    fn read_attribute(&self, holder: &HolderRef, path: &[Component]) -> Result<Value, PathflowError>;

    fn write_attribute(
        &self,
        holder: &HolderRef,
        path: &[Component],
        value: Value,
    ) -> Result<(), PathflowError>;

    fn is_out_of_date(&self, holder: &HolderRef, attribute: &str) -> bool;

    /// Every holder of `container` reachable from `holders` through object-level dependencies,
    /// the starting holders included.
    fn dependency_closure(&self, container: &str, holders: &[String]) -> BTreeSet<String>;

    /// Give the addressed attribute a chance to redirect to a more specific internal path.
    fn canonicalize(&self, _holder: &HolderRef, components: Vec<Component>) -> Vec<Component> {
        components
    }

    /// Addressable paths under `holder`, used for suggestions.
    fn attribute_paths(&self, holder: &HolderRef) -> Vec<PathIdentifier> {
        self.attribute_names(holder)
            .into_iter()
            .map(|name| holder.attribute(&name))
            .collect()
    }
}
