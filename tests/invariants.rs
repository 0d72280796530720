//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::collections::BTreeMap;

use tokengraph_core::{
    auto_layout_variables, export_collection, export_collections, has_circular_dependency,
    validate_alias_relationship, variable_export_id, AliasPath, CollectionNode, Layer, Variable,
    VariableKey, VariableValue,
    color::Rgba,
    export::{AliasKind, AliasReference, ExportValue},
};

fn collection(id: &str, layer: Option<Layer>) -> CollectionNode {
    CollectionNode::new(id, format!("{} collection", id), layer).with_mode("m", "Default")
}

/// Primitive -> Semantic -> Theme chain plus a second, branching theme variable
fn design_system() -> Vec<CollectionNode> {
    vec![
        collection("theme", Some(Layer::Theme))
            .with_variable(Variable::new("t-bg", "Background").with_value("m", VariableValue::alias("sem", "s-surface")))
            .with_variable(
                Variable::new("t-fg", "Foreground")
                    .with_value("m", VariableValue::alias("sem", "s-text"))
                    .with_value("m2", VariableValue::alias("sem", "s-surface")),
            ),
        collection("sem", Some(Layer::Semantic))
            .with_variable(Variable::new("s-surface", "Surface").with_value("m", VariableValue::alias("prim", "white")))
            .with_variable(Variable::new("s-text", "Text").with_value("m", VariableValue::alias("prim", "gray-900"))),
        collection("prim", Some(Layer::Primitive))
            .with_variable(Variable::new("white", "White").with_value("m", VariableValue::color("#FFFFFF")))
            .with_variable(Variable::new("gray-900", "Gray/900").with_value("m", VariableValue::color("#111111")))
            .with_variable(Variable::new("unused", "Unused").with_value("m", VariableValue::color("#ABCDEF"))),
    ]
}

#[test]
fn invariant_alias_direction_matters() {
    let semantic = collection("a", Some(Layer::Semantic));
    let theme = collection("b", Some(Layer::Theme));

    assert!(validate_alias_relationship(&theme, &semantic).is_valid);
    assert!(!validate_alias_relationship(&semantic, &theme).is_valid);
}

#[test]
fn invariant_self_alias_invalid_for_every_layer() {
    for layer in [Layer::Primitive, Layer::Semantic, Layer::Theme] {
        let x = collection("x", Some(layer));
        let result = validate_alias_relationship(&x, &x);
        assert!(!result.is_valid, "{:?} self-alias should be invalid", layer);
        assert!(result.error.is_some());
    }
}

#[test]
fn invariant_cross_collection_cycle_detected() {
    let collections = vec![
        collection("c1", None).with_variable(Variable::new("v1", "V1").with_value("m", VariableValue::alias("c2", "v2"))),
        collection("c2", None).with_variable(Variable::new("v2", "V2").with_value("m", VariableValue::alias("c1", "v1"))),
    ];

    assert!(has_circular_dependency(
        &VariableKey::new("c1", "v1"),
        &VariableKey::new("c2", "v2"),
        &collections,
        AliasPath::new(),
    ));
}

#[test]
fn invariant_layout_deterministic() {
    let collections = design_system();
    let first = auto_layout_variables(&collections);
    let second = auto_layout_variables(&collections);

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
}

#[test]
fn invariant_layout_independent_of_input_order() {
    let collections = design_system();
    let mut reversed = collections.clone();
    reversed.reverse();

    let a = auto_layout_variables(&collections);
    let b = auto_layout_variables(&reversed);
    assert_eq!(a.variables, b.variables);
    assert_eq!(a.column_count, b.column_count);
}

#[test]
fn invariant_layout_columns_monotonic() {
    let collections = design_system();
    let result = auto_layout_variables(&collections);
    assert!(result.cycles.is_empty());
    assert_eq!(result.column_count, 3);

    let columns: BTreeMap<VariableKey, usize> = result
        .variables
        .iter()
        .map(|p| (p.key.clone(), p.column))
        .collect();

    for c in &collections {
        for v in &c.variables {
            let key = c.key_for(v);
            for (_, value) in v.aliases() {
                let target = value.alias_target(&c.id).unwrap();
                assert!(
                    columns[&key] > columns[&target],
                    "{} must sit right of {}",
                    key,
                    target
                );
            }
        }
    }
}

#[test]
fn invariant_layout_rows_do_not_overlap() {
    let result = auto_layout_variables(&design_system());
    let mut seen = std::collections::BTreeSet::new();
    for p in &result.variables {
        let slot = (p.position.x as i64, p.position.y as i64);
        assert!(seen.insert(slot), "two variables share {:?}", slot);
    }
}

#[test]
fn invariant_layout_empty_input() {
    let result = auto_layout_variables(&[]);
    assert!(result.variables.is_empty());
    assert_eq!(result.column_count, 0);
}

#[test]
fn invariant_export_identifier_stable() {
    let key = VariableKey::new("prim", "white");
    let first = export_collection(&design_system()[2]);
    let second = export_collections(&design_system());

    let id_alone = &first.documents[0].variables[0].id;
    let id_together = &second.documents[2].variables[0].id;
    assert_eq!(id_alone, id_together);
    assert_eq!(id_alone, &variable_export_id(&key));
}

#[test]
fn invariant_export_simple_color() {
    let c = CollectionNode::new("c", "Colors", None)
        .with_mode("default", "Default")
        .with_variable(Variable::new("red", "Red").with_value("default", VariableValue::color("#FF0000")));

    let report = export_collection(&c);
    let red = &report.documents[0].variables[0];
    let expected = Rgba { r: 1.0, g: 0.0, b: 0.0, a: 1.0 };

    assert_eq!(red.values_by_mode["default"], ExportValue::Color(expected));
    assert_eq!(red.resolved_values_by_mode["default"].resolved_value, expected);
    assert!(report.diagnostics.is_empty());
}

#[test]
fn invariant_export_cross_collection_alias() {
    let c1 = CollectionNode::new("c1", "Base Colors", None)
        .with_mode("M", "Mode")
        .with_variable(Variable::new("base", "Base").with_value("M", VariableValue::color("#112233")));
    let c2 = CollectionNode::new("c2", "References", None)
        .with_mode("M", "Mode")
        .with_variable(Variable::new("ref", "Ref").with_value("M", VariableValue::alias("c1", "base")));

    let report = export_collections(&[c1, c2]);
    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.documents[0].name, "Base Colors");

    let base_id = report.documents[0].variables[0].id.clone();
    let reference = &report.documents[1].variables[0];

    assert_eq!(
        reference.values_by_mode["M"],
        ExportValue::Alias(AliasReference { kind: AliasKind::VariableAlias, id: base_id })
    );
    assert_eq!(
        reference.resolved_values_by_mode["M"].resolved_value,
        Rgba::from_hex("#112233").unwrap()
    );
}

#[test]
fn invariant_export_never_aborts() {
    let broken = collection("broken", Some(Layer::Semantic))
        .with_variable(Variable::new("a", "A").with_value("m", VariableValue::alias("missing", "x")))
        .with_variable(Variable::new("b", "B").with_value("m", VariableValue::color("#zzz")));
    let mut all = design_system();
    all.push(broken);

    let report = export_collections(&all);
    assert_eq!(report.documents.len(), all.len());
    assert_eq!(report.diagnostics.len(), 2);
    assert!(report.diagnostics.iter().all(|d| d.collection_id == "broken"));
}
