//! # pathflow-core
//!
//! A path-addressed reactive expression engine.
//!
//! ## Overview
//!
//! Any attribute of a holder (an object inside a container) can own a formula. Formulas refer to
//! other attributes, possibly on other holders or in other containers, through textual paths such
//! as `Length`, `Box.Placement.Base.x` or `<<Other Doc>>#<<Base plate>>.Width`. The engine keeps
//! those formulas in a dependency-consistent state:
//!
//! - formulas are only accepted when they keep the dependency graph acyclic, both among the
//!   attributes of one holder and across holders;
//! - on every execution the formulas of a holder are evaluated in topological order and the
//!   results written back to their attributes;
//! - holder and container renames are followed through every stored path.
//!
//! ## Architecture
//!
//! - **[`paths`]**: [`paths::PathIdentifier`], its quoting primitive, parsing and resolution
//! - **[`model`]**: the [`model::AttributeHost`] contract the engine relies on, and holder lookup
//! - **[`formula`]**: the formula language contract; **[`expr`]** is the bundled language
//! - **[`engine`]**: [`engine::ExpressionEngine`], its dependency graph, guard and persistence
//! - **[`workspace`]**: an in-memory [`model::AttributeHost`] with document-level recompute
//! - **[`config`]**: TOML workspace descriptions
//! - **[`completion`]**: path suggestions
//!
//! ## Quick Start
//!
//! ```rust
//! use pathflow_core::{expr::ExprParser, value::Value, workspace::Workspace};
//!
//! # fn main() -> Result<(), pathflow_core::PathflowError> {
//! let workspace = Workspace::new();
//! workspace.add_container("Doc")?;
//! let a = workspace.add_holder("Doc", "A", "A")?;
//! let b = workspace.add_holder("Doc", "B", "B")?;
//! workspace.set_attribute(&a, "x", Value::Number(3.0))?;
//! workspace.set_attribute(&b, "y", Value::Number(0.0))?;
//!
//! let engine = workspace.engine(&b)?;
//! engine.set_formula_text(&workspace, &ExprParser, "y", "A.x + 1", None)?;
//! workspace.recompute()?;
//! assert_eq!(workspace.attribute(&b, "y"), Some(Value::Number(4.0)));
//! # Ok(())
//! # }
//! ```

pub mod completion;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod expr;
pub mod formula;
pub mod model;
pub mod paths;
pub mod value;
pub mod workspace;

#[cfg(test)]
mod tests;

pub use error::*;
