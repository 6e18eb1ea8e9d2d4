//! Shared test utilities for engine and workspace tests

use std::sync::Arc;

use crate::{
    engine::ExpressionEngine,
    expr::ExprParser,
    formula::FormulaParser,
    model::HolderRef,
    value::Value,
    workspace::Workspace,
    PathflowError,
};

pub const DOC: &str = "Doc";

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn holder(name: &str) -> HolderRef {
    HolderRef::new(DOC, name)
}

/// Workspace with one container `Doc` holding `(name, label)` holders.
pub fn create_test_workspace(holders: &[(&str, &str)]) -> Workspace {
    init_logging();
    let workspace = Workspace::new();
    workspace.add_container(DOC).unwrap();
    for (name, label) in holders {
        workspace.add_holder(DOC, name, label).unwrap();
    }
    workspace
}

/// Holders `A` (x = 3), `B` (y = 0) and `C` (z = 0).
pub fn create_chain_workspace() -> Workspace {
    let workspace = create_test_workspace(&[("A", "A"), ("B", "B"), ("C", "C")]);
    workspace
        .set_attribute(&holder("A"), "x", Value::Number(3.0))
        .unwrap();
    workspace
        .set_attribute(&holder("B"), "y", Value::Number(0.0))
        .unwrap();
    workspace
        .set_attribute(&holder("C"), "z", Value::Number(0.0))
        .unwrap();
    workspace
}

pub fn set_formula(
    workspace: &Workspace,
    owner: &HolderRef,
    path: &str,
    formula: &str,
) -> Result<Arc<ExpressionEngine>, PathflowError> {
    let engine = workspace.engine(owner)?;
    engine.set_formula_text(workspace, &ExprParser, path, formula, None)?;
    Ok(engine)
}

pub fn parse_formula(formula: &str) -> Arc<dyn crate::formula::Formula> {
    ExprParser.parse(formula, &holder("A")).unwrap()
}

pub fn number(workspace: &Workspace, owner: &HolderRef, attribute: &str) -> f64 {
    workspace
        .attribute(owner, attribute)
        .and_then(|v| v.as_number().ok())
        .unwrap_or(f64::NAN)
}
