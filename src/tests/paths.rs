//! Resolution and canonicalization of paths against a live workspace

use super::helpers::*;
use crate::{
    model::{AttributeHost, HolderLookup},
    paths::PathIdentifier,
    value::Value,
    PathflowError,
};
use std::collections::BTreeMap;
use test_log::test;

fn parse(text: &str) -> PathIdentifier {
    text.parse().unwrap()
}

fn placement() -> Value {
    let mut base = BTreeMap::new();
    base.insert("x".to_string(), Value::Number(1.0));
    base.insert("y".to_string(), Value::Number(2.0));
    let mut root = BTreeMap::new();
    root.insert("Base".to_string(), Value::Map(base));
    Value::Map(root)
}

#[test]
fn test_single_component_is_owner_attribute() {
    let ws = create_test_workspace(&[("Box", "Box"), ("Length", "Length")]);
    let owner = holder("Box");
    // Even though a holder is called `Length`, a lone component is the owner's attribute.
    let resolved = parse("Length").resolve(&ws, &owner).unwrap();
    assert_eq!(resolved.holder, owner);
    assert_eq!(resolved.property_index, 0);
}

#[test]
fn test_leading_component_as_holder() {
    let ws = create_test_workspace(&[("Box", "Base plate"), ("Cylinder", "Cylinder")]);
    ws.set_attribute(&holder("Box"), "Length", Value::Number(10.0))
        .unwrap();
    let owner = holder("Cylinder");

    let by_name = parse("Box.Length").resolve(&ws, &owner).unwrap();
    assert_eq!(by_name.holder, holder("Box"));
    assert_eq!(by_name.property_index, 1);

    let by_label = parse("<<Base plate>>.Length").resolve(&ws, &owner).unwrap();
    assert_eq!(by_label.holder, holder("Box"));
    assert_eq!(by_label.property_index, 0);
}

#[test]
fn test_leading_component_falls_back_to_owner() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    ws.set_attribute(&holder("Box"), "Placement", placement())
        .unwrap();
    let owner = holder("Box");
    let path = parse("Placement.Base.x");
    let resolved = path.resolve(&ws, &owner).unwrap();
    assert_eq!(resolved.holder, owner);
    assert_eq!(resolved.property_index, 0);
    assert_eq!(resolved.attribute(&path), "Placement");

    let canonical = path.canonical(&ws, &owner).unwrap();
    assert_eq!(canonical.to_string(), "Doc#Box.Placement.Base.x");
}

#[test]
fn test_canonical_strips_holder_segment() {
    let ws = create_test_workspace(&[("Box", "Base plate"), ("Cylinder", "Cylinder")]);
    ws.set_attribute(&holder("Box"), "Length", Value::Number(10.0))
        .unwrap();
    let owner = holder("Cylinder");
    for text in ["Box.Length", "<<Base plate>>.Length", "Doc#Box.Length"] {
        let canonical = parse(text).canonical(&ws, &owner).unwrap();
        assert_eq!(canonical.to_string(), "Doc#Box.Length", "canonical of '{text}'");
        assert_eq!(canonical.components().len(), 1);
    }
}

#[test]
fn test_missing_attribute_is_unresolved() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    let result = parse("Width").canonical(&ws, &holder("Box"));
    assert!(matches!(result, Err(PathflowError::UnresolvedPath(_))));
}

#[test]
fn test_unknown_container_falls_back_to_owner_container() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    ws.set_attribute(&holder("Box"), "Length", Value::Number(1.0))
        .unwrap();
    let resolved = parse("Elsewhere#Box.Length")
        .resolve(&ws, &holder("Box"))
        .unwrap();
    assert_eq!(resolved.holder, holder("Box"));
}

#[test]
fn test_stated_holder_must_resolve() {
    let ws = create_test_workspace(&[("Box", "Part"), ("Box001", "Part")]);
    let owner = holder("Box");
    assert!(matches!(
        parse("<<Ghost>>.x").resolve(&ws, &owner),
        Err(PathflowError::UnresolvedPath(_))
    ));
    assert!(matches!(
        parse("<<Part>>.x").resolve(&ws, &owner),
        Err(PathflowError::UnresolvedPath(_))
    ));
    assert_eq!(ws.resolve_holder("Doc", "Part"), HolderLookup::Ambiguous);
}

#[test]
fn test_ambiguous_leading_component_falls_back() {
    // Swapped names and labels: `A` matches holder A by name and holder B by label.
    let ws = create_test_workspace(&[("A", "B"), ("B", "A")]);
    ws.set_attribute(&holder("A"), "A", placement()).unwrap();
    let resolved = parse("A.Base").resolve(&ws, &holder("A")).unwrap();
    assert_eq!(resolved.holder, holder("A"));
    assert_eq!(resolved.property_index, 0);
}

#[test]
fn test_alias_canonicalizes_to_target() {
    let ws = create_test_workspace(&[("Box", "Box")]);
    let owner = holder("Box");
    ws.set_attribute(&owner, "Placement", placement()).unwrap();
    ws.add_alias(&owner, "Origin", "Placement.Base").unwrap();

    let canonical = parse("Origin.y").canonical(&ws, &owner).unwrap();
    assert_eq!(canonical.to_string(), "Doc#Box.Placement.Base.y");
    assert_eq!(
        ws.read_attribute(&owner, canonical.components()).unwrap(),
        Value::Number(2.0)
    );
}

#[test]
fn test_resolution_is_repeatable() {
    let ws = create_test_workspace(&[("Box", "Box"), ("Cylinder", "Cylinder")]);
    ws.set_attribute(&holder("Box"), "Length", Value::Number(1.0))
        .unwrap();
    let path = parse("Box.Length");
    let first = path.resolve(&ws, &holder("Cylinder")).unwrap();
    let second = path.resolve(&ws, &holder("Cylinder")).unwrap();
    assert_eq!(first, second);
    assert_eq!(path.to_string(), "Box.Length");
}
