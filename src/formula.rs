//! Formula language contract.
//!
//! The engine treats formulas as opaque programs that can be evaluated, report the paths they
//! read, print their source, and optionally rewrite their references after a rename. [`crate::expr`]
//! provides the reference implementation.

use std::{collections::BTreeSet, fmt, sync::Arc};

use crate::{
    model::{AttributeHost, HolderRef},
    paths::PathIdentifier,
    value::Value,
    PathflowError,
};

/// What a formula sees while evaluating: the host and the holder it is written on.
pub struct EvalContext<'a> {
    pub host: &'a dyn AttributeHost,
    pub owner: &'a HolderRef,
}

impl<'a> EvalContext<'a> {
    pub fn new(host: &'a dyn AttributeHost, owner: &'a HolderRef) -> Self {
        EvalContext { host, owner }
    }

    /// Read the value `path` addresses, resolved relative to the owner.
    pub fn read(&self, path: &PathIdentifier) -> Result<Value, PathflowError> {
        let resolved = path.resolve(self.host, self.owner)?;
        self.host
            .read_attribute(&resolved.holder, resolved.sub_components(path))
    }
}

pub trait Formula: fmt::Debug + fmt::Display + Send + Sync {
    fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<Value, PathflowError>;

    /// Every path the formula reads, without duplicates.
    fn references(&self) -> BTreeSet<PathIdentifier>;

    /// Copy of this formula with references passed through `rewrite`, or `None` when no
    /// reference changed.
    fn rewrite_references(
        &self,
        _rewrite: &mut dyn FnMut(&PathIdentifier) -> Option<PathIdentifier>,
    ) -> Option<Arc<dyn Formula>> {
        None
    }
}

/// Turns formula source text into a [`Formula`].
pub trait FormulaParser {
    fn parse(&self, text: &str, context: &HolderRef) -> Result<Arc<dyn Formula>, PathflowError>;
}

/// Paths read by `formula`.
pub fn extract_dependencies(formula: &dyn Formula) -> BTreeSet<PathIdentifier> {
    formula.references()
}
