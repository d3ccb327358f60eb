use super::*;
use crate::{
    catalog::{Catalog, FieldModel, TypeModel},
    test_fixtures::fixture_catalog,
    value::ScalarKind,
};
use proptest::prelude::*;

#[test]
fn entity_item_matches_the_layout() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Customer", 0).unwrap();

    let MappedValue::EntityRef { ty, key, fields, .. } = &item else {
        panic!("expected entity item");
    };
    assert_eq!(ty, "test::Customer");
    assert_eq!(key.decompose(&catalog).unwrap().len(), 1);

    let names: Vec<&str> = fields.iter().map(|(name, _)| name.as_str()).collect();
    assert_eq!(names, vec!["name", "address", "orders"]);

    // The embedded structure occupies the two trailing columns.
    let (_, address) = &fields[1];
    let slots = address.decompose(&catalog).unwrap();
    assert_eq!(
        slots.iter().map(|slot| slot.offset).collect::<Vec<_>>(),
        vec![2, 3]
    );
}

#[test]
fn entity_decomposes_to_its_key_only() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Customer", 0).unwrap();
    let slots = item.decompose(&catalog).unwrap();
    assert_eq!(slots.len(), catalog.key_width("test::Customer").unwrap());
}

#[test]
fn collections_refuse_decomposition() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Customer", 0).unwrap();
    let MappedValue::EntityRef { fields, .. } = &item else {
        panic!("expected entity item");
    };
    let (_, orders) = fields.iter().find(|(name, _)| name == "orders").unwrap();
    let err = orders.decompose(&catalog).unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn shift_moves_every_offset() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Order", 0).unwrap();
    let shifted = item.shift(7);

    let before = item.decompose(&catalog).unwrap();
    let after = shifted.decompose(&catalog).unwrap();
    for (a, b) in before.iter().zip(&after) {
        assert_eq!(a.offset + 7, b.offset);
        assert_eq!(a.kind, b.kind);
    }
}

#[test]
fn remap_rejects_unmapped_columns() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Record", 0).unwrap();

    // Identity table over the four record columns works.
    let table: Vec<Option<usize>> = (0..4).map(Some).collect();
    assert!(item.remap(&table).is_ok());

    // Dropping a mapped position is a translator defect.
    let mut broken = table;
    broken[1] = None;
    let err = item.remap(&broken).unwrap_err();
    assert!(err.is_invariant());
}

#[test]
fn markers_are_transparent() {
    let inner = MappedValue::column(3, ScalarKind::Int, false);
    let marked = MappedValue::Marker {
        kind: MarkerKind::First,
        inner: Box::new(MappedValue::Marker {
            kind: MarkerKind::Default,
            inner: Box::new(inner),
        }),
    };
    assert_eq!(marked.as_column(), Some((3, ScalarKind::Int, false)));
}

// --- decomposition symmetry over arbitrary structure shapes ---

#[derive(Clone, Debug)]
enum FieldTree {
    Scalar,
    Nested(Vec<FieldTree>),
}

fn field_tree() -> impl Strategy<Value = FieldTree> {
    let leaf = Just(FieldTree::Scalar);
    leaf.prop_recursive(3, 12, 4, |inner| {
        prop::collection::vec(inner, 1..4).prop_map(FieldTree::Nested)
    })
}

fn register_tree(catalog: &mut Catalog, tree: &[FieldTree], path: &str, next_id: &mut u32) -> Vec<FieldModel> {
    let mut fields = Vec::new();
    for (idx, node) in tree.iter().enumerate() {
        let name = format!("f{idx}");
        match node {
            FieldTree::Scalar => fields.push(FieldModel::scalar(&name, ScalarKind::Int)),
            FieldTree::Nested(children) => {
                let child_path = format!("{path}_{idx}");
                let child_fields = register_tree(catalog, children, &child_path, next_id);
                *next_id += 1;
                catalog.register(TypeModel::structure(&child_path, *next_id, child_fields));
                fields.push(FieldModel::structure(&name, &child_path));
            }
        }
    }
    fields
}

proptest! {
    /// Decomposing any structure yields exactly its declared
    /// primitive-field count, at consecutive offsets.
    #[test]
    fn structure_decomposition_is_width_exact(tree in prop::collection::vec(field_tree(), 1..4)) {
        let mut catalog = Catalog::new();
        let mut next_id = 100;
        let fields = register_tree(&mut catalog, &tree, "gen::Root", &mut next_id);
        catalog.register(TypeModel::structure("gen::Root", 99, fields));

        let declared = catalog.structure_layout("gen::Root").unwrap().len();
        let mut cursor = 5;
        let item = structure_item(&catalog, "gen::Root", &mut cursor).unwrap();
        let slots = item.decompose(&catalog).unwrap();

        prop_assert_eq!(slots.len(), declared);
        for (idx, slot) in slots.iter().enumerate() {
            prop_assert_eq!(slot.offset, 5 + idx);
        }
    }
}
