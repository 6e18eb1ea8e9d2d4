//! Per-holder formula store and its evaluation machinery.
//!
//! # Module Organization
//!
//! - [`base`]: [`ExpressionEngine`], the store and orchestrator
//! - [`graph`]: dependency graph, cycle check and evaluation order
//! - [`guard`]: `Idle`/`Executing` state and its scoped guard
//! - [`validate`]: acceptance checks and the [`FormulaValidator`] hook
//! - [`persist`]: [`FormulaSet`], the serialized form of a formula store

pub mod base;
pub mod graph;
pub mod guard;
pub mod persist;
pub mod validate;


pub use base::{ExecutionOutcome, ExpressionEngine, FormulaRecord};
pub use graph::DependencyGraph;
pub use guard::EngineState;
pub use persist::{FormulaEntry, FormulaSet};
pub use validate::FormulaValidator;
