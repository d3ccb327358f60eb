use super::*;
use crate::{
    mapped::{MappedValue, MarkerKind, entity_item},
    test_fixtures::{fixture_catalog, order_rows},
    value::Value,
};

#[test]
fn entities_materialize_with_identity_handles() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Order", 0).unwrap();
    let materializer = Materializer::compile(&item).unwrap();
    let mut identity = SequentialIdentity::new();

    let rows = order_rows();
    let Materialized::Entity { ty, handle, key, fields } =
        materializer.materialize(&rows[0], &mut identity).unwrap()
    else {
        panic!("expected an entity");
    };
    assert_eq!(ty, "test::Order");
    assert_eq!(key, vec![Value::Int(10)]);

    // Same row again resolves to the same handle.
    let Materialized::Entity { handle: again, .. } =
        materializer.materialize(&rows[0], &mut identity).unwrap()
    else {
        panic!("expected an entity");
    };
    assert_eq!(handle, again);

    // The customer reference is a nested entity with its own identity.
    let (_, customer) = fields.iter().find(|(name, _)| name == "customer").unwrap();
    let Materialized::Entity { ty, .. } = customer else {
        panic!("expected a customer reference");
    };
    assert_eq!(ty, "test::Customer");
}

#[test]
fn null_keyed_references_materialize_as_null() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Order", 0).unwrap();
    let materializer = Materializer::compile(&item).unwrap();
    let mut identity = SequentialIdentity::new();

    // Order 50 has no customer.
    let rows = order_rows();
    let Materialized::Entity { fields, .. } =
        materializer.materialize(&rows[4], &mut identity).unwrap()
    else {
        panic!("expected an entity");
    };
    let (_, customer) = fields.iter().find(|(name, _)| name == "customer").unwrap();
    assert!(matches!(customer, Materialized::Null));
}

#[test]
fn shared_identities_resolve_to_one_handle() {
    let mut identity = SequentialIdentity::new();
    let a = identity.resolve("test::Customer", &[Value::Int(1)]);
    let b = identity.resolve("test::Customer", &[Value::Int(1)]);
    let c = identity.resolve("test::Customer", &[Value::Int(2)]);
    let d = identity.resolve("test::Order", &[Value::Int(1)]);
    assert_eq!(a, b);
    assert_ne!(a, c);
    assert_ne!(a, d);
}

#[test]
fn markers_do_not_change_the_shape() {
    let item = MappedValue::Marker {
        kind: MarkerKind::Default,
        inner: Box::new(MappedValue::column(2, crate::value::ScalarKind::Float, true)),
    };
    let materializer = Materializer::compile(&item).unwrap();
    let mut identity = SequentialIdentity::new();

    let rows = order_rows();
    let out = materializer.materialize(&rows[0], &mut identity).unwrap();
    assert_eq!(out.as_scalar(), Some(&Value::Float(5.0)));
}

#[test]
fn untranslated_collections_are_rejected_at_compile_time() {
    let catalog = fixture_catalog();
    let item = entity_item(&catalog, "test::Customer", 0).unwrap();
    let MappedValue::EntityRef { fields, .. } = &item else {
        panic!("expected entity item");
    };
    let (_, orders) = fields.iter().find(|(name, _)| name == "orders").unwrap();
    let err = Materializer::compile(orders).unwrap_err();
    assert!(err.is_invariant());
}
