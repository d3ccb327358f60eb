//! Adapter turning captured in-memory sequences into in-plan sources.
//!
//! The adapter runs once at translation time and produces two things: a
//! column layout for the synthetic source node, and a [`LocalShape`]
//! recipe the executor replays per element when the sequence is
//! resolved from the parameter context.

use crate::{
    catalog::{Catalog, ColumnInfo},
    error::{ErrorOrigin, TranslateError},
    graph::ElementShape,
    plan::LocalShape,
    value::{Captured, Value},
};

/// Column layout and decomposition recipe for one element shape.
pub fn adapt(
    catalog: &Catalog,
    element: &ElementShape,
) -> Result<(Vec<ColumnInfo>, LocalShape), TranslateError> {
    let (layout, shape) = adapt_inner(catalog, element, "value")?;
    if layout.is_empty() {
        return Err(TranslateError::model(
            ErrorOrigin::Local,
            "local sequence element decomposes to no columns",
        ));
    }
    debug_assert_eq!(layout.len(), shape.width());
    Ok((layout, shape))
}

fn adapt_inner(
    catalog: &Catalog,
    element: &ElementShape,
    name: &str,
) -> Result<(Vec<ColumnInfo>, LocalShape), TranslateError> {
    match element {
        ElementShape::Scalar(kind) => Ok((
            vec![ColumnInfo {
                name: name.to_string(),
                kind: *kind,
                nullable: true,
            }],
            LocalShape::Scalar,
        )),

        ElementShape::Entity(ty) => {
            let layout = catalog.key_layout(ty)?;
            let width = layout.len();
            Ok((
                layout,
                LocalShape::Key {
                    ty: ty.clone(),
                    width,
                },
            ))
        }

        ElementShape::Structure(ty) => {
            // Cycle-checked by the catalog; captured structures arrive
            // pre-flattened, so the recipe is one scalar per column.
            let layout = catalog.structure_layout(ty)?;
            let fields = layout
                .iter()
                .map(|col| (col.name.clone(), LocalShape::Scalar))
                .collect();
            Ok((layout, LocalShape::Fields(fields)))
        }

        ElementShape::Fields(fields) => {
            let mut layout = Vec::new();
            let mut shapes = Vec::new();
            for (field_name, field_shape) in fields {
                let (cols, shape) = adapt_inner(catalog, field_shape, field_name)?;
                layout.extend(cols);
                shapes.push((field_name.clone(), shape));
            }
            Ok((layout, LocalShape::Fields(shapes)))
        }
    }
}

/// Replay the recipe over one captured element, producing its row.
pub fn decompose_element(
    element: &Captured,
    shape: &LocalShape,
) -> Result<Vec<Value>, TranslateError> {
    match (shape, element) {
        (LocalShape::Scalar, Captured::Scalar(value)) => Ok(vec![value.clone()]),

        (LocalShape::Key { ty, width }, Captured::Entity { ty: got, key }) => {
            if got != ty {
                return Err(shape_error(format!(
                    "expected an element of '{ty}', got '{got}'"
                )));
            }
            if key.len() != *width {
                return Err(TranslateError::invariant(
                    ErrorOrigin::Local,
                    format!("key of '{ty}' has {} parts, layout expects {width}", key.len()),
                ));
            }
            Ok(key.clone())
        }

        (LocalShape::Fields(fields), Captured::Seq(members)) => {
            if members.len() != fields.len() {
                return Err(shape_error(format!(
                    "element has {} members, layout expects {}",
                    members.len(),
                    fields.len()
                )));
            }
            let mut row = Vec::with_capacity(shape.width());
            for ((_, field_shape), member) in fields.iter().zip(members) {
                row.extend(decompose_element(member, field_shape)?);
            }
            Ok(row)
        }

        // Captured structures are already flat; widths must agree.
        (LocalShape::Fields(_), Captured::Structure { ty, values }) => {
            if values.len() != shape.width() {
                return Err(TranslateError::invariant(
                    ErrorOrigin::Local,
                    format!(
                        "structure '{ty}' carries {} values, layout expects {}",
                        values.len(),
                        shape.width()
                    ),
                ));
            }
            Ok(values.clone())
        }

        (_, element) => Err(shape_error(format!(
            "element {element:?} does not match the declared shape"
        ))),
    }
}

fn shape_error(message: String) -> TranslateError {
    TranslateError::model(ErrorOrigin::Local, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{test_fixtures::fixture_catalog, value::ScalarKind};

    #[test]
    fn scalar_elements_get_one_column() {
        let catalog = fixture_catalog();
        let (layout, shape) = adapt(&catalog, &ElementShape::Scalar(ScalarKind::Int)).unwrap();
        assert_eq!(layout.len(), 1);
        assert_eq!(shape, LocalShape::Scalar);

        let row = decompose_element(&Captured::Scalar(Value::Int(9)), &shape).unwrap();
        assert_eq!(row, vec![Value::Int(9)]);
    }

    #[test]
    fn entity_elements_decompose_to_their_keys() {
        let catalog = fixture_catalog();
        let (layout, shape) =
            adapt(&catalog, &ElementShape::Entity("test::Customer".into())).unwrap();
        assert_eq!(layout.len(), 1);

        let element = Captured::Entity {
            ty: "test::Customer".to_string(),
            key: vec![Value::Int(2)],
        };
        assert_eq!(decompose_element(&element, &shape).unwrap(), vec![Value::Int(2)]);

        // Wrong key width is a translator-side defect, not bad input.
        let wide = Captured::Entity {
            ty: "test::Customer".to_string(),
            key: vec![Value::Int(2), Value::Int(3)],
        };
        assert!(decompose_element(&wide, &shape).unwrap_err().is_invariant());
    }

    #[test]
    fn structure_elements_flatten_via_the_catalog() {
        let catalog = fixture_catalog();
        let (layout, shape) =
            adapt(&catalog, &ElementShape::Structure("test::Address".into())).unwrap();
        assert_eq!(layout.len(), 2);

        let element = Captured::Structure {
            ty: "test::Address".to_string(),
            values: vec![Value::Text("york".into()), Value::Int(1000)],
        };
        assert_eq!(
            decompose_element(&element, &shape).unwrap(),
            vec![Value::Text("york".into()), Value::Int(1000)]
        );
    }

    #[test]
    fn empty_shapes_are_rejected() {
        let catalog = fixture_catalog();
        let err = adapt(&catalog, &ElementShape::Fields(Vec::new())).unwrap_err();
        assert!(err.message.contains("no columns"));

        let err = adapt(&catalog, &ElementShape::Structure("test::Empty".into())).unwrap_err();
        assert!(err.message.contains("no columns"));
    }

    #[test]
    fn mismatched_elements_are_model_errors() {
        let catalog = fixture_catalog();
        let (_, shape) = adapt(&catalog, &ElementShape::Scalar(ScalarKind::Int)).unwrap();
        let err = decompose_element(&Captured::Seq(Vec::new()), &shape).unwrap_err();
        assert!(err.message.contains("does not match"));
    }
}
