//! Shared fixture catalog and row sets for translation tests.

use crate::{
    catalog::{Catalog, FieldModel, TypeModel},
    value::{ScalarKind, Value},
};

/// Fixture catalog: a flat record type, a customer/order association
/// with an embedded structure, a three-member hierarchy, and two
/// deliberately malformed structures.
pub(crate) fn fixture_catalog() -> Catalog {
    let mut catalog = Catalog::new();

    catalog.register(TypeModel::entity(
        "test::Record",
        1,
        &["key"],
        vec![
            FieldModel::scalar("key", ScalarKind::Int),
            FieldModel::scalar("flag", ScalarKind::Bool),
            FieldModel::nullable_scalar("score", ScalarKind::Float),
            FieldModel::scalar("name", ScalarKind::Text),
        ],
    ));

    catalog.register(TypeModel::structure(
        "test::Address",
        20,
        vec![
            FieldModel::scalar("city", ScalarKind::Text),
            FieldModel::scalar("zip", ScalarKind::Int),
        ],
    ));

    catalog.register(TypeModel::entity(
        "test::Customer",
        2,
        &["id"],
        vec![
            FieldModel::scalar("id", ScalarKind::Int),
            FieldModel::scalar("name", ScalarKind::Text),
            FieldModel::structure("address", "test::Address"),
            FieldModel::collection("orders", "test::Order", "customer"),
        ],
    ));

    catalog.register(TypeModel::entity(
        "test::Order",
        3,
        &["id"],
        vec![
            FieldModel::scalar("id", ScalarKind::Int),
            FieldModel::reference("customer", "test::Customer"),
            FieldModel::scalar("total", ScalarKind::Float),
        ],
    ));

    catalog.register(TypeModel::entity(
        "test::Animal",
        10,
        &["id"],
        vec![
            FieldModel::scalar("id", ScalarKind::Int),
            FieldModel::scalar("name", ScalarKind::Text),
        ],
    ));
    catalog.register(TypeModel::subtype(
        "test::Cat",
        "test::Animal",
        11,
        &["id"],
        vec![
            FieldModel::scalar("id", ScalarKind::Int),
            FieldModel::nullable_scalar("color", ScalarKind::Text),
        ],
    ));
    catalog.register(TypeModel::subtype(
        "test::Dog",
        "test::Animal",
        12,
        &["id"],
        vec![
            FieldModel::scalar("id", ScalarKind::Int),
            FieldModel::nullable_scalar("breed", ScalarKind::Text),
        ],
    ));

    // Malformed on purpose: a structure that contains itself, and one
    // with no fields at all.
    catalog.register(TypeModel::structure(
        "test::Looped",
        21,
        vec![FieldModel::structure("inner", "test::Looped")],
    ));
    catalog.register(TypeModel::structure("test::Empty", 22, Vec::new()));

    catalog
}

/// Ten records with integer keys 0..9; flag is true for even keys.
/// Layout: [key, flag, score, name]; key 3 has a null score.
pub(crate) fn record_rows() -> Vec<Vec<Value>> {
    (0..10)
        .map(|key: i64| {
            let score = if key == 3 {
                Value::Null
            } else {
                #[allow(clippy::cast_precision_loss)]
                Value::Float(key as f64 * 1.5)
            };
            vec![
                Value::Int(key),
                Value::Bool(key % 2 == 0),
                score,
                Value::Text(format!("r{key}")),
            ]
        })
        .collect()
}

/// Layout: [id, name, address.city, address.zip].
pub(crate) fn customer_rows() -> Vec<Vec<Value>> {
    vec![
        vec![
            Value::Int(1),
            Value::Text("ada".into()),
            Value::Text("york".into()),
            Value::Int(1000),
        ],
        vec![
            Value::Int(2),
            Value::Text("bo".into()),
            Value::Text("kent".into()),
            Value::Int(2000),
        ],
        vec![
            Value::Int(3),
            Value::Text("cy".into()),
            Value::Text("york".into()),
            Value::Int(3000),
        ],
    ]
}

/// Layout: [id, customer.id, total]. Order 50 has no customer.
pub(crate) fn order_rows() -> Vec<Vec<Value>> {
    vec![
        vec![Value::Int(10), Value::Int(1), Value::Float(5.0)],
        vec![Value::Int(20), Value::Int(1), Value::Float(7.5)],
        vec![Value::Int(30), Value::Int(2), Value::Float(1.0)],
        vec![Value::Int(40), Value::Int(3), Value::Float(9.0)],
        vec![Value::Int(50), Value::Null, Value::Float(2.5)],
    ]
}

/// Layout: [id, $type, name, color, breed] (the Animal-chain view).
pub(crate) fn animal_rows() -> Vec<Vec<Value>> {
    vec![
        vec![
            Value::Int(1),
            Value::Uint(10),
            Value::Text("generic".into()),
            Value::Null,
            Value::Null,
        ],
        vec![
            Value::Int(2),
            Value::Uint(11),
            Value::Text("tom".into()),
            Value::Text("grey".into()),
            Value::Null,
        ],
        vec![
            Value::Int(3),
            Value::Uint(12),
            Value::Text("rex".into()),
            Value::Null,
            Value::Text("husky".into()),
        ],
    ]
}
