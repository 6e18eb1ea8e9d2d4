//! Path suggestions for editors.
//!
//! A read-only walk over the object model listing what can be typed at a given point: other
//! containers, holders of the owner's container (by stable name and, when it differs, by label)
//! and every addressable attribute path.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{
    model::{AttributeHost, HolderRef},
    paths::{quote_if_needed, unescape, QUOTE_CLOSE, QUOTE_OPEN},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuggestionKind {
    Container,
    Holder,
    Attribute,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Suggestion {
    pub kind: SuggestionKind,
    pub text: String,
}

impl Suggestion {
    fn new(kind: SuggestionKind, text: String) -> Suggestion {
        Suggestion { kind, text }
    }
}

pub struct Completer<'a> {
    host: &'a dyn AttributeHost,
    owner: &'a HolderRef,
}

impl<'a> Completer<'a> {
    pub fn new(host: &'a dyn AttributeHost, owner: &'a HolderRef) -> Completer<'a> {
        Completer { host, owner }
    }

    /// Every suggestion starting with `prefix`, ordered by kind then text.
    ///
    /// A prefix containing `#` switches to the named container and returns container-qualified
    /// suggestions.
    pub fn complete(&self, prefix: &str) -> Vec<Suggestion> {
        let mut found = BTreeSet::new();
        match prefix.split_once('#') {
            Some((container, _)) => {
                let container = unquote(container);
                if self.host.has_container(&container) {
                    let scope = format!("{}#", quote_if_needed(&container));
                    self.holder_suggestions(&container, &scope, true, &mut found);
                }
            }
            None => {
                for container in self.host.containers() {
                    if container != self.owner.container {
                        found.insert(Suggestion::new(
                            SuggestionKind::Container,
                            format!("{}#", quote_if_needed(&container)),
                        ));
                    }
                }
                self.holder_suggestions(&self.owner.container, "", false, &mut found);
                for path in self.host.attribute_paths(self.owner) {
                    found.insert(Suggestion::new(
                        SuggestionKind::Attribute,
                        path.sub_path_string(0),
                    ));
                }
            }
        }
        found
            .into_iter()
            .filter(|suggestion| suggestion.text.starts_with(prefix))
            .collect()
    }

    fn holder_suggestions(
        &self,
        container: &str,
        scope: &str,
        qualified: bool,
        found: &mut BTreeSet<Suggestion>,
    ) {
        for entry in self.host.holders(container) {
            let holder = HolderRef::new(container, entry.name.clone());
            if !qualified && holder == *self.owner {
                continue;
            }
            let mut spellings = vec![quote_if_needed(&entry.name)];
            if entry.label != entry.name {
                spellings.push(quote_if_needed(&entry.label));
            }
            let attributes = self.host.attribute_paths(&holder);
            for spelling in spellings {
                found.insert(Suggestion::new(
                    SuggestionKind::Holder,
                    format!("{scope}{spelling}."),
                ));
                for path in &attributes {
                    found.insert(Suggestion::new(
                        SuggestionKind::Attribute,
                        format!("{scope}{spelling}.{}", path.sub_path_string(0)),
                    ));
                }
            }
        }
    }
}

fn unquote(text: &str) -> String {
    text.strip_prefix(QUOTE_OPEN)
        .and_then(|inner| inner.strip_suffix(QUOTE_CLOSE))
        .and_then(|inner| unescape(inner).ok())
        .unwrap_or_else(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{tests::helpers::*, value::Value};
    use std::collections::BTreeMap;
    use test_log::test;

    fn texts(suggestions: &[Suggestion]) -> Vec<&str> {
        suggestions.iter().map(|s| s.text.as_str()).collect()
    }

    #[test]
    fn test_holders_by_name_and_label() {
        let ws = create_test_workspace(&[("Box", "Base plate"), ("Pin", "Pin")]);
        ws.set_attribute(&holder("Box"), "Width", Value::Number(1.0))
            .unwrap();
        let owner = holder("Pin");
        let completer = Completer::new(&ws, &owner);

        let holders = completer
            .complete("")
            .into_iter()
            .filter(|s| s.kind == SuggestionKind::Holder)
            .collect::<Vec<_>>();
        assert_eq!(texts(&holders), vec!["<<Base plate>>.", "Box."]);

        let widths = completer.complete("Box.");
        assert_eq!(texts(&widths), vec!["Box.", "Box.Width"]);
    }

    #[test]
    fn test_owner_attributes_and_nested_paths() {
        let ws = create_test_workspace(&[("Box", "Box")]);
        let owner = holder("Box");
        let mut base = BTreeMap::new();
        base.insert("x".to_string(), Value::Number(0.0));
        let mut placement = BTreeMap::new();
        placement.insert("Base".to_string(), Value::Map(base));
        ws.set_attribute(&owner, "Placement", Value::Map(placement))
            .unwrap();
        ws.set_attribute(&owner, "Points", Value::List(vec![Value::Number(1.0)]))
            .unwrap();

        let found = Completer::new(&ws, &owner).complete("P");
        assert_eq!(
            texts(&found),
            vec![
                "Placement",
                "Placement.Base",
                "Placement.Base.x",
                "Points",
                "Points[0]"
            ]
        );
    }

    #[test]
    fn test_container_scope() {
        let ws = create_test_workspace(&[("Box", "Box")]);
        ws.add_container("Other Doc").unwrap();
        ws.add_holder("Other Doc", "Rod", "Rod").unwrap();
        ws.set_attribute(&HolderRef::new("Other Doc", "Rod"), "Length", Value::Number(1.0))
            .unwrap();
        let owner = holder("Box");
        let completer = Completer::new(&ws, &owner);

        assert_eq!(texts(&completer.complete("<<Oth")), vec!["<<Other Doc>>#"]);
        assert_eq!(
            texts(&completer.complete("<<Other Doc>>#R")),
            vec!["<<Other Doc>>#Rod.", "<<Other Doc>>#Rod.Length"]
        );
    }
}
