//! Object model behavior of the in-memory workspace

use super::helpers::*;
use crate::{
    model::AttributeHost,
    paths::{Component, PathIdentifier},
    value::Value,
    PathflowError,
};
use std::collections::{BTreeMap, BTreeSet};
use test_log::test;

#[test]
fn test_duplicate_names_are_rejected() {
    let ws = create_test_workspace(&[("A", "A")]);
    assert!(matches!(
        ws.add_container(DOC),
        Err(PathflowError::Duplicate(_))
    ));
    assert!(matches!(
        ws.add_holder(DOC, "A", "Another"),
        Err(PathflowError::Duplicate(_))
    ));
    assert!(matches!(
        ws.add_holder("Nowhere", "B", "B"),
        Err(PathflowError::NotFound(_))
    ));
    // Labels may repeat.
    ws.add_holder(DOC, "B", "A").unwrap();
}

#[test]
fn test_alias_reads_and_writes_through() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    let owner = holder("Box");
    let mut base = BTreeMap::new();
    base.insert("x".to_string(), Value::Number(1.0));
    let mut placement = BTreeMap::new();
    placement.insert("Base".to_string(), Value::Map(base));
    ws.set_attribute(&owner, "Placement", Value::Map(placement))
        .unwrap();
    ws.add_alias(&owner, "Origin", "Placement.Base").unwrap();
    ws.clear_touched();

    let x = vec![Component::simple("Origin"), Component::simple("x")];
    assert_eq!(ws.read_attribute(&owner, &x).unwrap(), Value::Number(1.0));
    ws.write_attribute(&owner, &x, Value::Number(5.0)).unwrap();
    assert_eq!(
        ws.read_attribute(
            &owner,
            &[
                Component::simple("Placement"),
                Component::simple("Base"),
                Component::simple("x")
            ]
        )
        .unwrap(),
        Value::Number(5.0)
    );
    assert!(ws.is_out_of_date(&owner, "Origin"));
    assert!(ws.is_out_of_date(&owner, "Placement"));
    assert_eq!(
        ws.aliases(&owner).get("Origin").map(String::as_str),
        Some("Placement.Base")
    );
}

#[test]
fn test_alias_target_must_be_relative() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    assert!(matches!(
        ws.add_alias(&holder("Box"), "Other", "Doc#Box.Length"),
        Err(PathflowError::Parse(_))
    ));
}

#[test]
fn test_write_to_missing_attribute_fails() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    let err = ws
        .write_attribute(&holder("Box"), &[Component::simple("Nope")], Value::Bool(true))
        .unwrap_err();
    assert!(matches!(err, PathflowError::UnresolvedPath(_)), "{err:?}");
}

#[test]
fn test_dependency_closure_follows_links_and_formulas() {
    let ws = create_chain_workspace();
    ws.add_holder(DOC, "D", "D").unwrap();
    ws.link(&holder("D"), "C").unwrap();
    set_formula(&ws, &holder("C"), "z", "B.y").unwrap();
    set_formula(&ws, &holder("B"), "y", "A.x").unwrap();

    let closure = ws.dependency_closure(DOC, &["D".to_string()]);
    let expected = ["A", "B", "C", "D"]
        .into_iter()
        .map(String::from)
        .collect::<BTreeSet<_>>();
    assert_eq!(closure, expected);
    assert_eq!(
        ws.dependency_closure(DOC, &["A".to_string()]),
        BTreeSet::from(["A".to_string()])
    );
}

#[test]
fn test_link_cycle_blocks_recompute() {
    let ws = create_chain_workspace();
    ws.link(&holder("A"), "B").unwrap();
    ws.link(&holder("B"), "A").unwrap();
    set_formula(&ws, &holder("C"), "z", "1").unwrap();
    assert!(matches!(ws.recompute(), Err(PathflowError::Cycle { .. })));
    assert_eq!(number(&ws, &holder("C"), "z"), 0.0);
}

#[test]
fn test_recompute_clears_touched() {
    let ws = create_chain_workspace();
    set_formula(&ws, &holder("B"), "y", "A.x * 2").unwrap();
    assert!(ws.is_out_of_date(&holder("A"), "x"));
    assert_eq!(ws.recompute().unwrap(), 1);
    assert!(ws.touched(&holder("A")).is_empty());
    assert!(ws.touched(&holder("B")).is_empty());
    assert_eq!(number(&ws, &holder("B"), "y"), 6.0);
}

#[test]
fn test_rename_holder_moves_state_and_engine() {
    let ws = create_chain_workspace();
    ws.link(&holder("C"), "A").unwrap();
    let engine = set_formula(&ws, &holder("A"), "x", "7").unwrap();
    set_formula(&ws, &holder("B"), "y", "A.x + 1").unwrap();

    let renamed = ws.rename_holder(&holder("A"), "Alpha").unwrap();
    assert!(!ws.has_holder(&holder("A")));
    assert_eq!(ws.attribute(&renamed, "x"), Some(Value::Number(3.0)));
    assert_eq!(ws.links(&holder("C")), BTreeSet::from(["Alpha".to_string()]));
    assert_eq!(engine.owner(), renamed);
    assert_eq!(
        engine.list_targets(),
        vec!["Doc#Alpha.x".parse::<PathIdentifier>().unwrap()]
    );

    ws.recompute().unwrap();
    assert_eq!(number(&ws, &holder("B"), "y"), 8.0);
    assert!(matches!(
        ws.rename_holder(&holder("B"), "C"),
        Err(PathflowError::Duplicate(_))
    ));
}

#[test]
fn test_attribute_paths_include_aliases() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    let owner = holder("Box");
    ws.set_attribute(&owner, "Points", Value::List(vec![Value::Number(1.0)]))
        .unwrap();
    ws.add_alias(&owner, "First", "Points[0]").unwrap();
    let paths = ws
        .attribute_paths(&owner)
        .into_iter()
        .map(|path| path.sub_path_string(0))
        .collect::<Vec<_>>();
    assert!(paths.contains(&"Points".to_string()));
    assert!(paths.contains(&"Points[0]".to_string()));
    assert!(paths.contains(&"First".to_string()));
}
