use serde::{Deserialize, Serialize};
use std::{
    cmp::Ordering,
    fmt::{Display, Formatter},
    hash::{Hash, Hasher},
    str::FromStr,
};

use super::{
    component::Component,
    parse::parse_path,
    quote::{needs_quoting, quote},
};
use crate::PathflowError;

/// A stated container or holder name.
///
/// `quoted` remembers that the text was entered in quoted form so formatting can reproduce it.
/// Equality, ordering and hashing only look at the text.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Name {
    pub text: String,
    pub quoted: bool,
}

impl Name {
    pub fn new<S: Into<String>>(text: S) -> Name {
        Name {
            text: text.into(),
            quoted: false,
        }
    }

    pub fn quoted<S: Into<String>>(text: S) -> Name {
        Name {
            text: text.into(),
            quoted: true,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub(crate) fn fmt_segment(&self, force_quote: bool) -> String {
        if self.quoted || force_quote || needs_quoting(&self.text) {
            quote(&self.text)
        } else {
            self.text.clone()
        }
    }
}

impl PartialEq for Name {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Name {}

impl Hash for Name {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

/// Structured address of one attribute.
///
/// Textual form: `[container#][holder.]attribute[.sub]*`. A stated `container` or `holder` is
/// pinned; an absent one is inferred from the owning holder during resolution. Until resolved, a
/// leading component may still turn out to name a holder (see [`super::resolve`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathIdentifier {
    container: Option<Name>,
    holder: Option<Name>,
    components: Vec<Component>,
}

impl PathIdentifier {
    pub fn new(components: Vec<Component>) -> PathIdentifier {
        PathIdentifier {
            container: None,
            holder: None,
            components,
        }
    }

    /// Single-component path naming `attribute` on the owning holder.
    pub fn attribute<S: Into<String>>(attribute: S) -> PathIdentifier {
        PathIdentifier::new(vec![Component::simple(attribute)])
    }

    /// Fully pinned path, the shape canonical paths take.
    pub fn qualified<C: Into<String>, H: Into<String>>(
        container: C,
        holder: H,
        components: Vec<Component>,
    ) -> PathIdentifier {
        PathIdentifier {
            container: Some(Name::new(container)),
            holder: Some(Name::new(holder)),
            components,
        }
    }

    pub fn with_container<N: Into<Name>>(mut self, container: N) -> PathIdentifier {
        self.container = Some(container.into());
        self
    }

    pub fn with_holder<N: Into<Name>>(mut self, holder: N) -> PathIdentifier {
        self.holder = Some(holder.into());
        self
    }

    pub fn push(&mut self, component: Component) -> &mut Self {
        self.components.push(component);
        self
    }

    pub fn container(&self) -> Option<&Name> {
        self.container.as_ref()
    }

    pub fn holder(&self) -> Option<&Name> {
        self.holder.as_ref()
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub(crate) fn from_parts(
        container: Option<Name>,
        holder: Option<Name>,
        components: Vec<Component>,
    ) -> PathIdentifier {
        PathIdentifier {
            container,
            holder,
            components,
        }
    }

    /// Rewrite a stated container name equal to `old`. Returns true when something changed.
    pub fn rename_container(&mut self, old: &str, new: &str) -> bool {
        match self.container.as_mut() {
            Some(name) if name.text == old => {
                name.text = new.to_string();
                true
            }
            _ => false,
        }
    }

    /// Rewrite a holder name equal to `old`.
    ///
    /// A stated holder is rewritten in place. Without a stated holder, a simple leading component
    /// followed by more components is the holder alias form and is rewritten as well. Single
    /// component paths always address the owner and are left alone.
    ///
    /// This is purely textual. Whether the leading component really names a holder depends on
    /// the host; see [`PathIdentifier::names_holder`].
    pub fn rename_holder(&mut self, old: &str, new: &str) -> bool {
        if let Some(name) = self.holder.as_mut() {
            if name.text == old {
                name.text = new.to_string();
                return true;
            }
            return false;
        }
        match self.components.as_mut_slice() {
            [first, _, ..] if first.is_simple() && first.name == old => {
                first.name = new.to_string();
                true
            }
            _ => false,
        }
    }

    /// The components from `property_index` on, joined the way they are displayed.
    pub fn sub_path_string(&self, property_index: usize) -> String {
        self.components
            .iter()
            .skip(property_index)
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Container, then holder, then component count, then each component.
impl Ord for PathIdentifier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.container
            .cmp(&other.container)
            .then_with(|| self.holder.cmp(&other.holder))
            .then_with(|| self.components.len().cmp(&other.components.len()))
            .then_with(|| self.components.cmp(&other.components))
    }
}

impl PartialOrd for PathIdentifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for PathIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if let Some(container) = &self.container {
            write!(f, "{}#", container.fmt_segment(false))?;
        }
        if let Some(holder) = &self.holder {
            // Without a container prefix a bare holder would re-parse as a component.
            write!(f, "{}.", holder.fmt_segment(self.container.is_none()))?;
        }
        write!(f, "{}", self.sub_path_string(0))
    }
}

impl FromStr for PathIdentifier {
    type Err = PathflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_path(s)
    }
}

impl TryFrom<String> for PathIdentifier {
    type Error = PathflowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PathIdentifier> for String {
    fn from(path: PathIdentifier) -> Self {
        path.to_string()
    }
}
