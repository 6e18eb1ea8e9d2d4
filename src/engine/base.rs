use parking_lot::{Mutex, RwLock};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    sync::{mpsc::Sender, Arc},
};

use super::{
    graph::DependencyGraph,
    guard::{EngineState, ExecutionGuard},
    validate::FormulaValidator,
};
use crate::{
    event::FormulaEvent,
    formula::{extract_dependencies, EvalContext, Formula, FormulaParser},
    model::{AttributeHost, HolderRef},
    paths::PathIdentifier,
    PathflowError,
};

/// One stored formula.
#[derive(Debug, Clone)]
pub struct FormulaRecord {
    pub formula: Arc<dyn Formula>,
    pub comment: Option<String>,
    pub disabled: bool,
}

impl FormulaRecord {
    pub fn new(formula: Arc<dyn Formula>, comment: Option<String>) -> FormulaRecord {
        FormulaRecord {
            formula,
            comment,
            disabled: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The schedule ran to the end; `applied` formulas were written back.
    Completed { applied: usize },
    /// The engine was already executing; nothing ran.
    AlreadyRunning,
}

/// Formula store for the attributes of one holder.
///
/// Keys are canonical target paths, so a holder carries at most one formula per attribute path.
/// The engine keeps no reference to the host: every operation that needs the object model takes
/// it as an argument. Locks are only held while copying state in or out, never across calls into
/// the host, so attribute writes may re-enter the engine.
pub struct ExpressionEngine {
    owner: RwLock<HolderRef>,
    formulas: RwLock<BTreeMap<PathIdentifier, FormulaRecord>>,
    validator: RwLock<Option<Arc<dyn FormulaValidator>>>,
    state: Mutex<EngineState>,
    events: Option<Sender<FormulaEvent>>,
}

impl fmt::Debug for ExpressionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpressionEngine")
            .field("owner", &*self.owner.read())
            .field("formulas", &*self.formulas.read())
            .field("validator", &self.validator.read().is_some())
            .field("state", &*self.state.lock())
            .finish()
    }
}

impl ExpressionEngine {
    pub fn new(owner: HolderRef) -> ExpressionEngine {
        ExpressionEngine {
            owner: RwLock::new(owner),
            formulas: RwLock::new(BTreeMap::new()),
            validator: RwLock::new(None),
            state: Mutex::new(EngineState::Idle),
            events: None,
        }
    }

    pub fn with_events(mut self, tx: Sender<FormulaEvent>) -> ExpressionEngine {
        self.events = Some(tx);
        self
    }

    pub fn with_validator(self, validator: Arc<dyn FormulaValidator>) -> ExpressionEngine {
        self.set_validator(Some(validator));
        self
    }

    pub fn set_validator(&self, validator: Option<Arc<dyn FormulaValidator>>) {
        *self.validator.write() = validator;
    }

    pub(crate) fn validator(&self) -> Option<Arc<dyn FormulaValidator>> {
        self.validator.read().clone()
    }

    pub fn owner(&self) -> HolderRef {
        self.owner.read().clone()
    }

    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    pub fn len(&self) -> usize {
        self.formulas.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.read().is_empty()
    }

    /// Snapshot of every stored record.
    pub fn records(&self) -> BTreeMap<PathIdentifier, FormulaRecord> {
        self.formulas.read().clone()
    }

    fn notify(&self, event: FormulaEvent) {
        if let Some(tx) = &self.events {
            if let Err(e) = tx.send(event) {
                tracing::warn!("[Engine] could not deliver event: {e}");
            }
        }
    }

    /// Replace the whole formula map inside one pair of change notifications.
    fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut BTreeMap<PathIdentifier, FormulaRecord>),
    {
        let owner = self.owner();
        self.notify(FormulaEvent::AboutToChange(owner.clone()));
        mutate(&mut self.formulas.write());
        self.notify(FormulaEvent::Changed(owner));
    }

    /// Canonical target path for `path`, which must address an attribute of the owner.
    pub fn canonical_target(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
    ) -> Result<PathIdentifier, PathflowError> {
        let owner = self.owner();
        let resolved = path.resolve(host, &owner)?;
        if resolved.holder != owner {
            return Err(PathflowError::OwnershipMismatch {
                path: path.to_string(),
                expected: owner.to_string(),
                found: resolved.holder.to_string(),
            });
        }
        path.canonical(host, &owner)
    }

    /// Key a stored formula would have for `path`.
    ///
    /// Falls back to the resolved, unaliased location when the attribute no longer exists, so
    /// formulas on removed attributes can still be found and cleared.
    fn lookup_key(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
    ) -> Result<PathIdentifier, PathflowError> {
        match self.canonical_target(host, path) {
            Ok(key) => Ok(key),
            Err(PathflowError::UnresolvedPath(_)) => {
                let owner = self.owner();
                let resolved = path.resolve(host, &owner)?;
                Ok(resolved
                    .holder
                    .path(resolved.sub_components(path).to_vec()))
            }
            Err(e) => Err(e),
        }
    }

    /// Store `formula` at `path` after validation.
    ///
    /// The addressed attribute is probe-read first, so an unreadable attribute fails with its
    /// own error. On any failure the store is left unchanged. Replacing a formula keeps the
    /// disabled flag of the previous record.
    #[tracing::instrument(skip(self, host, formula))]
    pub fn set_formula(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
        formula: Arc<dyn Formula>,
        comment: Option<String>,
    ) -> Result<(), PathflowError> {
        let target = self.canonical_target(host, path)?;
        let owner = self.owner();
        host.read_attribute(&owner, target.components())?;
        self.validate_target(host, target.clone(), &formula)?;

        tracing::debug!("[Engine] {owner}: '{target}' = {formula}");
        self.update(|formulas| {
            let disabled = formulas.get(&target).map(|r| r.disabled).unwrap_or(false);
            formulas.insert(
                target,
                FormulaRecord {
                    formula,
                    comment,
                    disabled,
                },
            );
        });
        Ok(())
    }

    /// Parse `path` and `formula` text and store the result through [`Self::set_formula`].
    pub fn set_formula_text(
        &self,
        host: &dyn AttributeHost,
        parser: &dyn FormulaParser,
        path: &str,
        formula: &str,
        comment: Option<String>,
    ) -> Result<(), PathflowError> {
        let path = path.parse::<PathIdentifier>()?;
        let formula = parser.parse(formula, &self.owner())?;
        self.set_formula(host, &path, formula, comment)
    }

    /// Remove the formula at `path`. Returns whether one was stored.
    pub fn clear_formula(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
    ) -> Result<bool, PathflowError> {
        let key = self.lookup_key(host, path)?;
        if !self.formulas.read().contains_key(&key) {
            return Ok(false);
        }
        self.update(|formulas| {
            formulas.remove(&key);
        });
        Ok(true)
    }

    pub fn clear_all(&self) {
        if !self.is_empty() {
            self.update(|formulas| formulas.clear());
        }
    }

    /// Toggle whether `execute` skips the formula at `path`.
    pub fn set_disabled(
        &self,
        host: &dyn AttributeHost,
        path: &PathIdentifier,
        disabled: bool,
    ) -> Result<(), PathflowError> {
        let key = self.lookup_key(host, path)?;
        if !self.formulas.read().contains_key(&key) {
            return Err(PathflowError::NotFound(format!("no formula at '{key}'")));
        }
        self.update(|formulas| {
            if let Some(record) = formulas.get_mut(&key) {
                record.disabled = disabled;
            }
        });
        Ok(())
    }

    /// Record stored for `path`, or `None` when there is none or `path` does not resolve.
    pub fn get_formula(&self, host: &dyn AttributeHost, path: &PathIdentifier) -> Option<FormulaRecord> {
        let key = self.lookup_key(host, path).ok()?;
        self.formulas.read().get(&key).cloned()
    }

    pub fn list_targets(&self) -> Vec<PathIdentifier> {
        self.formulas.read().keys().cloned().collect()
    }

    /// Current dependency graph of the stored formulas.
    pub fn dependency_graph(&self, host: &dyn AttributeHost) -> DependencyGraph {
        let formulas = self.records();
        DependencyGraph::build(
            host,
            &self.owner(),
            formulas.iter().map(|(path, record)| (path, &record.formula)),
        )
    }

    /// Targets in the order `execute` would evaluate them, disabled ones included.
    pub fn evaluation_order(
        &self,
        host: &dyn AttributeHost,
    ) -> Result<Vec<PathIdentifier>, PathflowError> {
        self.dependency_graph(host).evaluation_order()
    }

    /// Re-evaluate every enabled formula in dependency order and write the results back.
    ///
    /// Returns [`ExecutionOutcome::AlreadyRunning`] without doing anything when called while
    /// this engine is already executing. The first failure aborts the walk; values written
    /// before it are kept. The engine is `Idle` again when this returns, whatever the outcome.
    #[tracing::instrument(skip(self, host))]
    pub fn execute(&self, host: &dyn AttributeHost) -> Result<ExecutionOutcome, PathflowError> {
        let Some(_guard) = ExecutionGuard::enter(&self.state) else {
            tracing::debug!("[Engine] {} is already executing", self.owner());
            return Ok(ExecutionOutcome::AlreadyRunning);
        };

        let owner = self.owner();
        let formulas = self.records();
        let order = DependencyGraph::build(
            host,
            &owner,
            formulas.iter().map(|(path, record)| (path, &record.formula)),
        )
        .evaluation_order()?;

        let ctx = EvalContext::new(host, &owner);
        let mut applied = 0;
        for path in order {
            let Some(record) = formulas.get(&path) else {
                continue;
            };
            if record.disabled {
                tracing::debug!("[Engine] skipping disabled formula at '{path}'");
                continue;
            }
            let resolved = path.resolve(host, &owner)?;
            if resolved.holder != owner {
                return Err(PathflowError::OwnershipMismatch {
                    path: path.to_string(),
                    expected: owner.to_string(),
                    found: resolved.holder.to_string(),
                });
            }
            let value = record.formula.evaluate(&ctx)?;
            tracing::trace!("[Engine] '{path}' <- {value}");
            host.write_attribute(&owner, resolved.sub_components(&path), value)?;
            applied += 1;
        }

        self.notify(FormulaEvent::Executed(owner, applied));
        Ok(ExecutionOutcome::Completed { applied })
    }

    /// Move formulas whose target matches a key of `renames` to the corresponding value.
    ///
    /// Keys are canonicalized first; formulas not named by the map keep their target.
    pub fn rename_paths(
        &self,
        host: &dyn AttributeHost,
        renames: &BTreeMap<PathIdentifier, PathIdentifier>,
    ) -> Result<(), PathflowError> {
        let owner = self.owner();
        let mut canonical_renames = BTreeMap::new();
        for (from, to) in renames {
            let to = match to.resolve(host, &owner) {
                Ok(resolved) => resolved.holder.path(resolved.sub_components(to).to_vec()),
                Err(_) => to.clone(),
            };
            canonical_renames.insert(self.lookup_key(host, from)?, to);
        }
        self.update(|formulas| {
            *formulas = std::mem::take(formulas)
                .into_iter()
                .map(|(target, record)| match canonical_renames.get(&target) {
                    Some(renamed) => (renamed.clone(), record),
                    None => (target, record),
                })
                .collect();
        });
        Ok(())
    }

    /// Rewrite stored targets with `rename_target` and references inside formulas with
    /// `rename_reference`. The new map is computed from a snapshot, outside the lock.
    fn rewrite_all<T, R>(&self, rename_target: T, rename_reference: R) -> usize
    where
        T: Fn(&mut PathIdentifier) -> bool,
        R: Fn(&PathIdentifier) -> Option<PathIdentifier>,
    {
        let mut changed = 0;
        let rewritten = self
            .records()
            .into_iter()
            .map(|(mut target, mut record)| {
                if rename_target(&mut target) {
                    changed += 1;
                }
                if let Some(formula) = record
                    .formula
                    .rewrite_references(&mut |reference| rename_reference(reference))
                {
                    record.formula = formula;
                    changed += 1;
                }
                (target, record)
            })
            .collect::<BTreeMap<_, _>>();
        if changed > 0 {
            self.update(|formulas| *formulas = rewritten);
        }
        changed
    }

    /// Rewrite references spelling `holder` as `old` to `new`.
    ///
    /// Each reference is resolved against the current host first, so this must run before the
    /// host applies the change. References that only look like they name `holder` (an attribute
    /// of the owner with the same spelling, or an ambiguous label) are left alone.
    fn rewrite_holder_references(
        &self,
        host: &dyn AttributeHost,
        holder: &HolderRef,
        old: &str,
        new: &str,
        targets: bool,
    ) -> usize {
        let owner = self.owner();
        let rename_targets = targets && owner == *holder;
        self.rewrite_all(
            |target| rename_targets && target.rename_holder(old, new),
            |reference| {
                if !reference.names_holder(host, &owner, holder, old) {
                    return None;
                }
                let mut reference = reference.clone();
                reference.rename_holder(old, new).then_some(reference)
            },
        )
    }

    /// Follow a change of `holder`'s stable name to `new`.
    ///
    /// Call before the host renames the holder. Targets move if this engine belongs to `holder`,
    /// references that resolve to `holder` through its stable name are rewritten, and the owner
    /// moves along. Returns the number of targets and formulas that changed.
    pub fn rename_holder(&self, host: &dyn AttributeHost, holder: &HolderRef, new: &str) -> usize {
        let changed = self.rewrite_holder_references(host, holder, &holder.holder, new, true);
        let mut owner = self.owner.write();
        if *owner == *holder {
            let renamed = HolderRef::new(owner.container.clone(), new);
            let previous = std::mem::replace(&mut *owner, renamed.clone());
            drop(owner);
            self.notify(FormulaEvent::OwnerRenamed(previous, renamed));
        }
        changed
    }

    /// Follow a label change of `holder` from `old` to `new`. Only references are rewritten:
    /// targets always use stable names.
    ///
    /// Call before the host changes the label.
    pub fn rename_references(
        &self,
        host: &dyn AttributeHost,
        holder: &HolderRef,
        old: &str,
        new: &str,
    ) -> usize {
        self.rewrite_holder_references(host, holder, old, new, false)
    }

    /// Follow a container rename from `old` to `new`.
    pub fn rename_container(&self, old: &str, new: &str) -> usize {
        let changed = self.rewrite_all(
            |target| target.rename_container(old, new),
            |reference| {
                let mut reference = reference.clone();
                reference.rename_container(old, new).then_some(reference)
            },
        );
        let mut owner = self.owner.write();
        if owner.container == old {
            let renamed = HolderRef::new(new, owner.holder.clone());
            let previous = std::mem::replace(&mut *owner, renamed.clone());
            drop(owner);
            self.notify(FormulaEvent::OwnerRenamed(previous, renamed));
        }
        changed
    }

    /// Replace the formula set and validator with those of `other`.
    pub fn copy_from(&self, other: &ExpressionEngine) {
        let records = other.records();
        self.set_validator(other.validator());
        self.update(|formulas| *formulas = records);
    }

    /// Holders other than the owner that the stored formulas read from.
    pub fn external_dependencies(&self, host: &dyn AttributeHost) -> BTreeSet<HolderRef> {
        let owner = self.owner();
        self.records()
            .values()
            .flat_map(|record| extract_dependencies(record.formula.as_ref()))
            .filter_map(|dependency| dependency.holder_ref(host, &owner))
            .filter(|holder| *holder != owner)
            .collect()
    }

    /// True when any attribute read by a stored formula is out of date.
    pub fn any_dependency_stale(&self, host: &dyn AttributeHost) -> bool {
        let owner = self.owner();
        let dependencies = self
            .records()
            .values()
            .flat_map(|record| extract_dependencies(record.formula.as_ref()))
            .collect::<BTreeSet<_>>();
        dependencies.iter().any(|dependency| {
            dependency
                .resolve(host, &owner)
                .map(|resolved| {
                    host.is_out_of_date(&resolved.holder, resolved.attribute(dependency))
                })
                .unwrap_or(false)
        })
    }
}
