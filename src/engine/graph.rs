//! Dependency graph over canonical paths, cycle detection and evaluation ordering.
//!
//! The graph is built fresh from a formula map on every validation or execution and dropped
//! afterwards. Nodes are dense petgraph indices assigned in first-seen order, with a side table
//! back to the [`PathIdentifier`] each index stands for.

use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
    visit::{depth_first_search, Control, DfsEvent},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    formula::{extract_dependencies, Formula},
    model::{AttributeHost, HolderRef},
    paths::PathIdentifier,
    PathflowError,
};

/// Target -> dependency graph for the formulas of one holder.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<PathIdentifier, ()>,
    index: BTreeMap<PathIdentifier, NodeIndex>,
    targets: BTreeSet<PathIdentifier>,
}

impl DependencyGraph {
    /// Build the graph for `formulas`, whose keys are canonical target paths.
    ///
    /// Dependencies are canonicalized relative to `owner`. A dependency that does not resolve to
    /// a live attribute contributes neither a node nor an edge.
    pub fn build<'a, I>(host: &dyn AttributeHost, owner: &HolderRef, formulas: I) -> DependencyGraph
    where
        I: IntoIterator<Item = (&'a PathIdentifier, &'a Arc<dyn Formula>)>,
    {
        let mut dep_graph = DependencyGraph::default();
        for (target, formula) in formulas {
            let target_idx = dep_graph.node(target);
            dep_graph.targets.insert(target.clone());
            for dependency in extract_dependencies(formula.as_ref()) {
                match dependency.canonical(host, owner) {
                    Ok(canonical) => {
                        let dep_idx = dep_graph.node(&canonical);
                        dep_graph.graph.update_edge(target_idx, dep_idx, ());
                    }
                    Err(e) => {
                        tracing::debug!(
                            "[DependencyGraph] '{dependency}' in formula for '{target}' \
                             does not resolve, no edge added: {e}"
                        );
                    }
                }
            }
        }
        dep_graph
    }

    fn node(&mut self, path: &PathIdentifier) -> NodeIndex {
        if let Some(idx) = self.index.get(path) {
            return *idx;
        }
        let idx = self.graph.add_node(path.clone());
        self.index.insert(path.clone(), idx);
        idx
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Canonical dependencies recorded for `target`.
    pub fn dependencies(&self, target: &PathIdentifier) -> BTreeSet<PathIdentifier> {
        self.index
            .get(target)
            .map(|idx| {
                self.graph
                    .neighbors(*idx)
                    .map(|dep| self.graph[dep].clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Fail with [`PathflowError::Cycle`] naming the source of the first back edge found.
    /// Self-loops are back edges.
    pub fn check_acyclic(&self) -> Result<(), PathflowError> {
        let back_edge = depth_first_search(&self.graph, self.graph.node_indices(), |event| {
            match event {
                DfsEvent::BackEdge(source, _) => Control::Break(source),
                _ => Control::Continue,
            }
        });
        match back_edge.break_value() {
            Some(source) => Err(PathflowError::cycle(&self.graph[source])),
            None => Ok(()),
        }
    }

    /// Targets ordered so that every dependency comes before the formulas reading it.
    ///
    /// Nodes that are only dependencies anchor the order but are not returned. Independent
    /// targets come out in an unspecified order.
    pub fn evaluation_order(&self) -> Result<Vec<PathIdentifier>, PathflowError> {
        let sorted = toposort(&self.graph, None)
            .map_err(|cycle| PathflowError::cycle(&self.graph[cycle.node_id()]))?;
        Ok(sorted
            .into_iter()
            .rev()
            .map(|idx| &self.graph[idx])
            .filter(|path| self.targets.contains(*path))
            .cloned()
            .collect())
    }
}
