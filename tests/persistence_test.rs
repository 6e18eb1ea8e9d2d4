//! Saving and restoring formula sets and workspace files.

mod common;

use common::{create_chain_workspace, holder, number};
use pathflow_core::{
    config::{TomlWorkspaceProvider, WorkspaceFile, WorkspaceProvider},
    engine::{FormulaEntry, FormulaSet},
    expr::ExprParser,
    PathflowError,
};
use tempfile::TempDir;

fn chain_formulas(workspace: &pathflow_core::workspace::Workspace) {
    workspace
        .engine(&holder("B"))
        .unwrap()
        .set_formula_text(
            workspace,
            &ExprParser,
            "y",
            "A.x + 1",
            Some("one more than A".to_string()),
        )
        .unwrap();
    workspace
        .engine(&holder("C"))
        .unwrap()
        .set_formula_text(workspace, &ExprParser, "z", "B.y * 2", None)
        .unwrap();
}

#[test]
fn test_formula_set_moves_between_workspaces() {
    let source = create_chain_workspace();
    chain_formulas(&source);
    let saved = source.engine(&holder("B")).unwrap().save();
    assert_eq!(saved.count, 1);
    assert_eq!(
        saved.formulas[0],
        FormulaEntry {
            path: "Doc#B.y".to_string(),
            formula: "A.x + 1".to_string(),
            comment: Some("one more than A".to_string()),
            disabled: false,
        }
    );

    let toml = saved.to_toml().unwrap();
    let json = saved.to_json().unwrap();
    assert_eq!(FormulaSet::from_toml(&toml).unwrap(), saved);
    assert_eq!(FormulaSet::from_json(&json).unwrap(), saved);

    let target = create_chain_workspace();
    let engine = target.engine(&holder("B")).unwrap();
    engine
        .restore(&target, &ExprParser, &FormulaSet::from_toml(&toml).unwrap())
        .unwrap();
    target.recompute().unwrap();
    assert_eq!(number(&target, &holder("B"), "y"), 4.0);
}

#[test]
fn test_disabled_flag_survives_restore() {
    let workspace = create_chain_workspace();
    chain_formulas(&workspace);
    let b = workspace.engine(&holder("B")).unwrap();
    b.set_disabled(&workspace, &"y".parse().unwrap(), true)
        .unwrap();

    let restored = create_chain_workspace();
    let engine = restored.engine(&holder("B")).unwrap();
    engine.restore(&restored, &ExprParser, &b.save()).unwrap();
    let record = engine
        .get_formula(&restored, &"y".parse().unwrap())
        .unwrap();
    assert!(record.disabled);

    restored.recompute().unwrap();
    assert_eq!(number(&restored, &holder("B"), "y"), 0.0);
}

#[test]
fn test_restore_rejects_unknown_attribute() {
    let workspace = create_chain_workspace();
    let set = FormulaSet::new(vec![FormulaEntry {
        path: "missing".to_string(),
        formula: "1".to_string(),
        ..Default::default()
    }]);
    let engine = workspace.engine(&holder("B")).unwrap();
    let err = engine.restore(&workspace, &ExprParser, &set).unwrap_err();
    assert!(matches!(err, PathflowError::UnresolvedPath(_)), "{err:?}");
}

#[test]
fn test_workspace_file_round_trip_through_provider() {
    let dir = TempDir::new().unwrap();
    let provider = TomlWorkspaceProvider::new(dir.path().join("workspace.toml"));

    let workspace = create_chain_workspace();
    chain_formulas(&workspace);
    workspace.recompute().unwrap();
    provider.save(&WorkspaceFile::capture(&workspace)).unwrap();

    let loaded = provider.load().unwrap();
    let rebuilt = loaded.build(&ExprParser).unwrap();
    assert_eq!(number(&rebuilt, &holder("C"), "z"), 8.0);
    assert_eq!(rebuilt.engine(&holder("C")).unwrap().len(), 1);
    assert_eq!(WorkspaceFile::capture(&rebuilt), loaded);
}

#[test]
fn test_large_literals_survive_restore() {
    let workspace = create_chain_workspace();
    let b = workspace.engine(&holder("B")).unwrap();
    let err = b
        .set_formula_text(&workspace, &ExprParser, "y", "1e999", None)
        .unwrap_err();
    assert!(matches!(err, PathflowError::Parse(_)), "{err:?}");
    assert!(b.is_empty());

    b.set_formula_text(&workspace, &ExprParser, "y", "1e300 * 1e-300 + 1.5e-7", None)
        .unwrap();
    let saved = b.save();

    let restored = create_chain_workspace();
    let engine = restored.engine(&holder("B")).unwrap();
    let text = saved.to_toml().unwrap();
    engine
        .restore(&restored, &ExprParser, &FormulaSet::from_toml(&text).unwrap())
        .unwrap();
    assert_eq!(engine.save(), saved);

    workspace.recompute().unwrap();
    restored.recompute().unwrap();
    assert_eq!(
        number(&restored, &holder("B"), "y"),
        number(&workspace, &holder("B"), "y")
    );
}
