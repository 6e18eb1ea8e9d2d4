//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use pathflow_core::{model::HolderRef, value::Value, workspace::Workspace};

pub const DOC: &str = "Doc";

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn holder(name: &str) -> HolderRef {
    HolderRef::new(DOC, name)
}

/// Workspace with container `Doc` and holders `A` (x = 3), `B` (y = 0) and `C` (z = 0).
#[allow(dead_code)]
pub fn create_chain_workspace() -> Workspace {
    init_logging();
    let workspace = Workspace::new();
    workspace.add_container(DOC).unwrap();
    for (name, attribute) in [("A", "x"), ("B", "y"), ("C", "z")] {
        let holder = workspace.add_holder(DOC, name, name).unwrap();
        let value = if name == "A" { 3.0 } else { 0.0 };
        workspace
            .set_attribute(&holder, attribute, Value::Number(value))
            .unwrap();
    }
    workspace
}

#[allow(dead_code)]
pub fn number(workspace: &Workspace, holder: &HolderRef, attribute: &str) -> f64 {
    workspace
        .attribute(holder, attribute)
        .and_then(|v| v.as_number().ok())
        .unwrap_or(f64::NAN)
}
