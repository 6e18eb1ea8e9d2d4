//! In-memory object model.
//!
//! A [`Workspace`] holds named containers of holders. Each holder has a stable name, a mutable
//! label, a table of attribute values, alias attributes and explicit links to holders it depends
//! on. Holders that carry formulas get an [`ExpressionEngine`] from the workspace registry, and
//! [`Workspace::recompute`] runs those engines in holder dependency order.

use parking_lot::RwLock;
use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    visit::{depth_first_search, Control, DfsEvent},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::{mpsc::Sender, Arc},
};

use crate::{
    engine::{ExecutionOutcome, ExpressionEngine},
    event::FormulaEvent,
    model::{AttributeHost, HolderEntry, HolderRef},
    paths::{parse_path, Component, PathIdentifier},
    value::Value,
    PathflowError,
};

#[derive(Debug, Clone, Default)]
struct HolderState {
    label: String,
    attributes: BTreeMap<String, Value>,
    aliases: BTreeMap<String, Vec<Component>>,
    links: BTreeSet<String>,
    touched: BTreeSet<String>,
}

type ContainerState = BTreeMap<String, HolderState>;

#[derive(Debug, Default)]
pub struct Workspace {
    containers: RwLock<BTreeMap<String, ContainerState>>,
    engines: RwLock<BTreeMap<HolderRef, Arc<ExpressionEngine>>>,
    events: Option<Sender<FormulaEvent>>,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace::default()
    }

    /// Engines created from now on report to `tx`.
    pub fn with_events(mut self, tx: Sender<FormulaEvent>) -> Workspace {
        self.events = Some(tx);
        self
    }

    pub fn add_container(&self, name: &str) -> Result<(), PathflowError> {
        let mut containers = self.containers.write();
        if containers.contains_key(name) {
            return Err(PathflowError::Duplicate(format!("container '{name}'")));
        }
        containers.insert(name.to_string(), ContainerState::new());
        Ok(())
    }

    /// Add a holder with stable `name`. Labels need not be unique.
    pub fn add_holder(
        &self,
        container: &str,
        name: &str,
        label: &str,
    ) -> Result<HolderRef, PathflowError> {
        let mut containers = self.containers.write();
        let holders = containers
            .get_mut(container)
            .ok_or_else(|| PathflowError::NotFound(format!("container '{container}'")))?;
        if holders.contains_key(name) {
            return Err(PathflowError::Duplicate(format!(
                "holder '{name}' in container '{container}'"
            )));
        }
        holders.insert(
            name.to_string(),
            HolderState {
                label: label.to_string(),
                ..Default::default()
            },
        );
        Ok(HolderRef::new(container, name))
    }

    fn with_holder<T, F>(&self, holder: &HolderRef, read: F) -> Result<T, PathflowError>
    where
        F: FnOnce(&HolderState) -> T,
    {
        let containers = self.containers.read();
        containers
            .get(&holder.container)
            .and_then(|holders| holders.get(&holder.holder))
            .map(read)
            .ok_or_else(|| PathflowError::NotFound(format!("holder {holder}")))
    }

    fn with_holder_mut<T, F>(&self, holder: &HolderRef, write: F) -> Result<T, PathflowError>
    where
        F: FnOnce(&mut HolderState) -> T,
    {
        let mut containers = self.containers.write();
        containers
            .get_mut(&holder.container)
            .and_then(|holders| holders.get_mut(&holder.holder))
            .map(write)
            .ok_or_else(|| PathflowError::NotFound(format!("holder {holder}")))
    }

    pub fn has_holder(&self, holder: &HolderRef) -> bool {
        self.with_holder(holder, |_| ()).is_ok()
    }

    pub fn label(&self, holder: &HolderRef) -> Result<String, PathflowError> {
        self.with_holder(holder, |state| state.label.clone())
    }

    /// Create or overwrite a top level attribute and mark it out of date.
    pub fn set_attribute(
        &self,
        holder: &HolderRef,
        attribute: &str,
        value: Value,
    ) -> Result<(), PathflowError> {
        self.with_holder_mut(holder, |state| {
            state.attributes.insert(attribute.to_string(), value);
            state.touched.insert(attribute.to_string());
        })
    }

    pub fn attribute(&self, holder: &HolderRef, attribute: &str) -> Option<Value> {
        self.with_holder(holder, |state| state.attributes.get(attribute).cloned())
            .ok()
            .flatten()
    }

    pub fn attributes(&self, holder: &HolderRef) -> BTreeMap<String, Value> {
        self.with_holder(holder, |state| state.attributes.clone())
            .unwrap_or_default()
    }

    /// Declare `alias` as an attribute of `holder` that redirects to `target`, a path relative
    /// to the holder such as `Placement.Base`.
    pub fn add_alias(
        &self,
        holder: &HolderRef,
        alias: &str,
        target: &str,
    ) -> Result<(), PathflowError> {
        let target_path = parse_path(target)?;
        if target_path.container().is_some() || target_path.holder().is_some() {
            return Err(PathflowError::Parse(format!(
                "alias target '{target}' must be relative to its holder"
            )));
        }
        self.with_holder_mut(holder, |state| {
            state
                .aliases
                .insert(alias.to_string(), target_path.components().to_vec());
        })
    }

    /// Alias name -> target path text.
    pub fn aliases(&self, holder: &HolderRef) -> BTreeMap<String, String> {
        self.with_holder(holder, |state| {
            state
                .aliases
                .iter()
                .map(|(alias, target)| (alias.clone(), PathIdentifier::new(target.clone()).to_string()))
                .collect()
        })
        .unwrap_or_default()
    }

    /// Record that `from` depends on `to` at the object level.
    pub fn link(&self, from: &HolderRef, to: &str) -> Result<(), PathflowError> {
        let target = HolderRef::new(from.container.clone(), to);
        if !self.has_holder(&target) {
            return Err(PathflowError::NotFound(format!("holder {target}")));
        }
        self.with_holder_mut(from, |state| {
            state.links.insert(to.to_string());
        })
    }

    pub fn links(&self, holder: &HolderRef) -> BTreeSet<String> {
        self.with_holder(holder, |state| state.links.clone())
            .unwrap_or_default()
    }

    pub fn touched(&self, holder: &HolderRef) -> BTreeSet<String> {
        self.with_holder(holder, |state| state.touched.clone())
            .unwrap_or_default()
    }

    pub fn clear_touched(&self) {
        for holders in self.containers.write().values_mut() {
            for state in holders.values_mut() {
                state.touched.clear();
            }
        }
    }

    /// Engine for `holder`, created on first use.
    pub fn engine(&self, holder: &HolderRef) -> Result<Arc<ExpressionEngine>, PathflowError> {
        if !self.has_holder(holder) {
            return Err(PathflowError::NotFound(format!("holder {holder}")));
        }
        let mut engines = self.engines.write();
        let engine = engines.entry(holder.clone()).or_insert_with(|| {
            let engine = ExpressionEngine::new(holder.clone());
            Arc::new(match &self.events {
                Some(tx) => engine.with_events(tx.clone()),
                None => engine,
            })
        });
        Ok(engine.clone())
    }

    /// Engine for `holder` if one was created.
    pub fn existing_engine(&self, holder: &HolderRef) -> Option<Arc<ExpressionEngine>> {
        self.engines.read().get(holder).cloned()
    }

    /// Registered engines, in holder order.
    pub fn engines(&self) -> Vec<Arc<ExpressionEngine>> {
        self.engines.read().values().cloned().collect()
    }

    /// Change a holder's label and rewrite formula references that reached it through the old
    /// label.
    pub fn relabel_holder(&self, holder: &HolderRef, label: &str) -> Result<(), PathflowError> {
        let old = self.label(holder)?;
        if old == label {
            return Ok(());
        }
        // References are matched against the current labels, so engines go first.
        for engine in self.engines() {
            engine.rename_references(self, holder, &old, label);
        }
        self.with_holder_mut(holder, |state| state.label = label.to_string())?;
        tracing::debug!("[Workspace] {holder} relabelled '{old}' -> '{label}'");
        Ok(())
    }

    /// Change a holder's stable name, following it through links, the engine registry and
    /// every formula that reaches it by name.
    pub fn rename_holder(&self, holder: &HolderRef, name: &str) -> Result<HolderRef, PathflowError> {
        let renamed = HolderRef::new(holder.container.clone(), name);
        if !self.has_holder(holder) {
            return Err(PathflowError::NotFound(format!("holder {holder}")));
        }
        if self.has_holder(&renamed) {
            return Err(PathflowError::Duplicate(format!("holder {renamed}")));
        }
        // References are matched against the current names, so engines go first.
        for engine in self.engines() {
            engine.rename_holder(self, holder, name);
        }
        {
            let mut containers = self.containers.write();
            let holders = containers
                .get_mut(&holder.container)
                .ok_or_else(|| PathflowError::NotFound(format!("holder {holder}")))?;
            let state = holders
                .remove(&holder.holder)
                .ok_or_else(|| PathflowError::NotFound(format!("holder {holder}")))?;
            holders.insert(name.to_string(), state);
            for state in holders.values_mut() {
                if state.links.remove(&holder.holder) {
                    state.links.insert(name.to_string());
                }
            }
        }
        {
            let mut engines = self.engines.write();
            if let Some(engine) = engines.remove(holder) {
                engines.insert(renamed.clone(), engine);
            }
        }
        tracing::debug!("[Workspace] renamed {holder} -> {renamed}");
        Ok(renamed)
    }

    pub fn rename_container(&self, old: &str, new: &str) -> Result<(), PathflowError> {
        {
            let mut containers = self.containers.write();
            if containers.contains_key(new) {
                return Err(PathflowError::Duplicate(format!("container '{new}'")));
            }
            let holders = containers
                .remove(old)
                .ok_or_else(|| PathflowError::NotFound(format!("container '{old}'")))?;
            containers.insert(new.to_string(), holders);
        }
        let engines = {
            let mut engines = self.engines.write();
            let moved = engines
                .keys()
                .filter(|holder| holder.container == old)
                .cloned()
                .collect::<Vec<_>>();
            for holder in moved {
                if let Some(engine) = engines.remove(&holder) {
                    engines.insert(HolderRef::new(new, holder.holder), engine);
                }
            }
            engines.values().cloned().collect::<Vec<_>>()
        };
        for engine in engines {
            engine.rename_container(old, new);
        }
        tracing::debug!("[Workspace] renamed container '{old}' -> '{new}'");
        Ok(())
    }

    /// Holder-level dependency graph: an edge from each holder to every holder it links to or
    /// reads through a formula.
    fn holder_graph(&self) -> (DiGraph<HolderRef, ()>, BTreeMap<HolderRef, NodeIndex>) {
        let mut graph = DiGraph::new();
        let mut index = BTreeMap::new();
        let mut edges = Vec::new();
        {
            let containers = self.containers.read();
            for (container, holders) in containers.iter() {
                for (name, state) in holders {
                    let holder = HolderRef::new(container.clone(), name.clone());
                    index.insert(holder.clone(), graph.add_node(holder.clone()));
                    for link in &state.links {
                        edges.push((holder.clone(), HolderRef::new(container.clone(), link.clone())));
                    }
                }
            }
        }
        for engine in self.engines() {
            let owner = engine.owner();
            for dependency in engine.external_dependencies(self) {
                edges.push((owner.clone(), dependency));
            }
        }
        for (from, to) in edges {
            if let (Some(from), Some(to)) = (index.get(&from), index.get(&to)) {
                graph.update_edge(*from, *to, ());
            }
        }
        (graph, index)
    }

    /// Run every engine, dependencies first, then clear the out-of-date marks.
    ///
    /// Returns the number of formulas applied. A cycle between holders fails before any engine
    /// runs.
    #[tracing::instrument(skip(self))]
    pub fn recompute(&self) -> Result<usize, PathflowError> {
        let (graph, _) = self.holder_graph();
        let order = toposort(&graph, None)
            .map_err(|cycle| PathflowError::cycle(&graph[cycle.node_id()]))?;
        let mut applied = 0;
        for idx in order.into_iter().rev() {
            let holder = &graph[idx];
            let Some(engine) = self.existing_engine(holder) else {
                continue;
            };
            match engine.execute(self)? {
                ExecutionOutcome::Completed { applied: n } => applied += n,
                ExecutionOutcome::AlreadyRunning => {
                    tracing::warn!("[Workspace] engine of {holder} was already running");
                }
            }
        }
        self.clear_touched();
        tracing::info!("[Workspace] recompute applied {applied} formulas");
        Ok(applied)
    }

    fn resolve_alias(state: &HolderState, components: Vec<Component>) -> Vec<Component> {
        match components.split_first() {
            Some((first, rest)) if first.is_simple() => match state.aliases.get(&first.name) {
                Some(target) => target.iter().chain(rest).cloned().collect(),
                None => components,
            },
            _ => components,
        }
    }
}

impl AttributeHost for Workspace {
    fn containers(&self) -> Vec<String> {
        self.containers.read().keys().cloned().collect()
    }

    fn has_container(&self, container: &str) -> bool {
        self.containers.read().contains_key(container)
    }

    fn holders(&self, container: &str) -> Vec<HolderEntry> {
        self.containers
            .read()
            .get(container)
            .map(|holders| {
                holders
                    .iter()
                    .map(|(name, state)| HolderEntry::new(name.clone(), state.label.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn attribute_names(&self, holder: &HolderRef) -> Vec<String> {
        self.with_holder(holder, |state| {
            state
                .attributes
                .keys()
                .chain(state.aliases.keys())
                .cloned()
                .collect()
        })
        .unwrap_or_default()
    }

    fn read_attribute(&self, holder: &HolderRef, path: &[Component]) -> Result<Value, PathflowError> {
        let unresolved = |why: String| {
            PathflowError::UnresolvedPath(format!(
                "{holder}: {} {why}",
                PathIdentifier::new(path.to_vec())
            ))
        };
        self.with_holder(holder, |state| {
            let path = Workspace::resolve_alias(state, path.to_vec());
            let first = path
                .first()
                .ok_or_else(|| unresolved("is empty".to_string()))?;
            let value = state
                .attributes
                .get(&first.name)
                .ok_or_else(|| unresolved("is not an attribute".to_string()))?;
            value
                .get_path(&path)
                .cloned()
                .ok_or_else(|| unresolved(format!("has no value inside a {}", value.type_name())))
        })?
    }

    fn write_attribute(
        &self,
        holder: &HolderRef,
        path: &[Component],
        value: Value,
    ) -> Result<(), PathflowError> {
        self.with_holder_mut(holder, |state| {
            let path = Workspace::resolve_alias(state, path.to_vec());
            let first = path.first().ok_or_else(|| {
                PathflowError::UnresolvedPath(format!("{holder}: empty attribute path"))
            })?;
            let name = first.name.clone();
            let current = state.attributes.get_mut(&name).ok_or_else(|| {
                PathflowError::UnresolvedPath(format!("{holder}: no attribute '{name}'"))
            })?;
            current.set_path(&path, value)?;
            state.touched.insert(name);
            Ok(())
        })?
    }

    fn is_out_of_date(&self, holder: &HolderRef, attribute: &str) -> bool {
        self.with_holder(holder, |state| {
            let attribute = match state.aliases.get(attribute).and_then(|t| t.first()) {
                Some(target) => target.name.as_str(),
                None => attribute,
            };
            state.touched.contains(attribute)
        })
        .unwrap_or(false)
    }

    fn dependency_closure(&self, container: &str, holders: &[String]) -> BTreeSet<String> {
        let (graph, index) = self.holder_graph();
        let starts = holders
            .iter()
            .filter_map(|name| index.get(&HolderRef::new(container, name.clone())).copied())
            .collect::<Vec<_>>();
        let mut reached = BTreeSet::new();
        depth_first_search(&graph, starts, |event| {
            if let DfsEvent::Discover(idx, _) = event {
                let holder = &graph[idx];
                if holder.container == container {
                    reached.insert(holder.holder.clone());
                }
            }
            Control::<()>::Continue
        });
        reached
    }

    fn canonicalize(&self, holder: &HolderRef, components: Vec<Component>) -> Vec<Component> {
        self.with_holder(holder, |state| {
            Workspace::resolve_alias(state, components.clone())
        })
        .unwrap_or(components)
    }

    fn attribute_paths(&self, holder: &HolderRef) -> Vec<PathIdentifier> {
        self.with_holder(holder, |state| {
            let mut paths = Vec::new();
            for (name, value) in &state.attributes {
                let root = vec![Component::simple(name.clone())];
                paths.push(holder.path(root.clone()));
                paths.extend(
                    value
                        .sub_paths(&root)
                        .into_iter()
                        .map(|components| holder.path(components)),
                );
            }
            paths.extend(state.aliases.keys().map(|alias| holder.attribute(alias)));
            paths
        })
        .unwrap_or_default()
    }
}
