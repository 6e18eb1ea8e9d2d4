//! Resolution of a [`PathIdentifier`] against a live host.
//!
//! Resolution never mutates the identifier: it derives a [`ResolvedPath`] from the stored fields
//! and the owning holder, so repeating it is free of side effects.

use super::{component::Component, identifier::PathIdentifier};
use crate::{
    model::{AttributeHost, HolderLookup, HolderRef},
    PathflowError,
};

/// Effective location of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub holder: HolderRef,
    /// Index of the component naming the attribute itself.
    pub property_index: usize,
}

impl ResolvedPath {
    /// Name of the addressed attribute.
    pub fn attribute<'a>(&self, path: &'a PathIdentifier) -> &'a str {
        &path.components()[self.property_index].name
    }

    /// Components from the attribute on.
    pub fn sub_components<'a>(&self, path: &'a PathIdentifier) -> &'a [Component] {
        &path.components()[self.property_index..]
    }
}

impl PathIdentifier {
    /// Determine the effective container, holder and attribute component for this path.
    ///
    /// `owner` is the holder the path was written on. A stated container that does not exist
    /// falls back to the owner's container. A stated holder must resolve through
    /// [`AttributeHost::resolve_holder`]. Without a stated holder, a single component is an
    /// attribute of the owner; with two or more, a simple component 0 is first tried as a holder
    /// and otherwise treated as an attribute of the owner.
    pub fn resolve(
        &self,
        host: &dyn AttributeHost,
        owner: &HolderRef,
    ) -> Result<ResolvedPath, PathflowError> {
        let container = match self.container() {
            Some(name) if host.has_container(name.as_str()) => name.as_str().to_string(),
            _ => owner.container.clone(),
        };

        let unresolved = |why: &str| PathflowError::UnresolvedPath(format!("'{self}': {why}"));

        if self.is_empty() {
            return Err(unresolved("path has no components"));
        }

        if let Some(holder) = self.holder() {
            return match host.resolve_holder(&container, holder.as_str()) {
                HolderLookup::Unique(name) => Ok(ResolvedPath {
                    holder: HolderRef::new(container, name),
                    property_index: 0,
                }),
                HolderLookup::NotFound => Err(unresolved("holder not found")),
                HolderLookup::Ambiguous => Err(unresolved("holder name is ambiguous")),
            };
        }

        let components = self.components();
        if components.len() == 1 {
            return Ok(ResolvedPath {
                holder: HolderRef::new(container, owner.holder.clone()),
                property_index: 0,
            });
        }
        if !components[0].is_simple() {
            return Err(unresolved("leading component cannot name a holder"));
        }
        match host.resolve_holder(&container, &components[0].name) {
            HolderLookup::Unique(name) => Ok(ResolvedPath {
                holder: HolderRef::new(container, name),
                property_index: 1,
            }),
            _ => Ok(ResolvedPath {
                holder: HolderRef::new(container, owner.holder.clone()),
                property_index: 0,
            }),
        }
    }

    /// Canonical form: pinned container and holder, component 0 being the attribute, after the
    /// attribute's own canonicalization. Fails when the attribute does not exist.
    pub fn canonical(
        &self,
        host: &dyn AttributeHost,
        owner: &HolderRef,
    ) -> Result<PathIdentifier, PathflowError> {
        let resolved = self.resolve(host, owner)?;
        let attribute = resolved.attribute(self);
        if !host.has_attribute(&resolved.holder, attribute) {
            return Err(PathflowError::UnresolvedPath(format!(
                "'{self}': no attribute '{attribute}' on {}",
                resolved.holder
            )));
        }
        let components = host.canonicalize(
            &resolved.holder,
            resolved.sub_components(self).to_vec(),
        );
        Ok(resolved.holder.path(components))
    }

    /// Whether this path designates `holder` and spells it `spelled`, either as its stated holder
    /// or as a leading component that resolution took as the holder.
    pub fn names_holder(
        &self,
        host: &dyn AttributeHost,
        owner: &HolderRef,
        holder: &HolderRef,
        spelled: &str,
    ) -> bool {
        let Ok(resolved) = self.resolve(host, owner) else {
            return false;
        };
        if resolved.holder != *holder {
            return false;
        }
        match self.holder() {
            Some(name) => name.as_str() == spelled,
            None => resolved.property_index == 1 && self.components()[0].name == spelled,
        }
    }

    /// Stable address of the holder this path designates, if it resolves.
    pub fn holder_ref(&self, host: &dyn AttributeHost, owner: &HolderRef) -> Option<HolderRef> {
        self.resolve(host, owner).ok().map(|r| r.holder)
    }
}
