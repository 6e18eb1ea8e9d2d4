//! Acceptance checks run before a formula enters an engine.

use std::{collections::BTreeMap, sync::Arc};

use super::{base::ExpressionEngine, graph::DependencyGraph};
use crate::{
    formula::{extract_dependencies, Formula},
    model::AttributeHost,
    paths::PathIdentifier,
    PathflowError,
};

/// Pluggable acceptance hook. Returning `Some(message)` rejects the formula with
/// [`PathflowError::CustomValidation`] carrying the message verbatim.
pub trait FormulaValidator: Send + Sync {
    fn validate(&self, path: &PathIdentifier, formula: &dyn Formula) -> Option<String>;
}

impl<F> FormulaValidator for F
where
    F: Fn(&PathIdentifier, &dyn Formula) -> Option<String> + Send + Sync,
{
    fn validate(&self, path: &PathIdentifier, formula: &dyn Formula) -> Option<String> {
        self(path, formula)
    }
}

impl ExpressionEngine {
    /// Decide whether `formula` may be stored at `path`.
    ///
    /// `path` is first brought to its canonical target form, which must address an attribute of
    /// the owner. Checks then run in order and the first failure is returned:
    /// 1. the installed [`FormulaValidator`], if any;
    /// 2. every dependency on another holder of the same container must not reach back to the
    ///    owner through the host's object-level dependency closure;
    /// 3. the formula map with `path` replaced by `formula` must be acyclic.
    #[tracing::instrument(skip(self, host, formula))]
    pub fn validate(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
        formula: &Arc<dyn Formula>,
    ) -> Result<(), PathflowError> {
        let target = self.canonical_target(host, path)?;
        self.validate_target(host, target, formula)
    }

    /// [`Self::validate`] for a path already in canonical target form.
    pub(crate) fn validate_target(
        &self,
        host: &dyn AttributeHost,
        path: PathIdentifier,
        formula: &Arc<dyn Formula>,
    ) -> Result<(), PathflowError> {
        if let Some(validator) = self.validator() {
            if let Some(message) = validator.validate(&path, formula.as_ref()) {
                return Err(PathflowError::CustomValidation(message));
            }
        }

        let owner = self.owner();
        for dependency in extract_dependencies(formula.as_ref()) {
            let Some(dep_holder) = dependency.holder_ref(host, &owner) else {
                continue;
            };
            if dep_holder == owner || dep_holder.container != owner.container {
                continue;
            }
            let closure =
                host.dependency_closure(&dep_holder.container, &[dep_holder.holder.clone()]);
            if closure.contains(&owner.holder) {
                tracing::debug!(
                    "[Engine] {dep_holder} already depends on {owner}, rejecting '{dependency}'"
                );
                return Err(PathflowError::cycle(&dependency));
            }
        }

        let mut hypothetical: BTreeMap<PathIdentifier, Arc<dyn Formula>> = self
            .records()
            .into_iter()
            .map(|(target, record)| (target, record.formula))
            .collect();
        hypothetical.insert(path, formula.clone());
        DependencyGraph::build(host, &owner, &hypothetical).check_acyclic()
    }
}
