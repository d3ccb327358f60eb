//! Item construction from catalog layouts.
//!
//! The offset walk here must mirror `Catalog::layout` exactly: key
//! columns, the discriminant when present, then non-key fields in
//! declaration order.

use super::value::MappedValue;
use crate::{
    catalog::{Catalog, FieldKind},
    error::TranslateError,
};

/// Build the item mapping for a whole entity row starting at `base`.
///
/// Named fields cover the inheritance chain; columns contributed by
/// other hierarchy members stay positional only.
pub fn entity_item(
    catalog: &Catalog,
    ty: &str,
    base: usize,
) -> Result<MappedValue, TranslateError> {
    let model = catalog.ty(ty)?;
    let mut cursor = base;

    let mut key_columns = Vec::new();
    for key_col in catalog.key_layout(ty)? {
        key_columns.push(MappedValue::column(cursor, key_col.kind, false));
        cursor += 1;
    }
    let key = MappedValue::Key {
        ty: ty.to_string(),
        columns: key_columns,
    };

    if catalog.has_discriminant(ty)? {
        // Positional only; never exposed as a named field.
        cursor += 1;
    }

    let mut emitted: Vec<String> = model.key_fields.clone();
    let mut fields = Vec::new();
    let chain: Vec<String> = catalog
        .hierarchy_chain(ty)?
        .iter()
        .map(|member| member.path.clone())
        .collect();
    for member_path in &chain {
        let member = catalog.ty(member_path)?;
        for field in &member.fields {
            if emitted.contains(&field.name) || member.key_fields.contains(&field.name) {
                continue;
            }
            let mapped = field_item(catalog, &field.kind, field.nullable, &key, &mut cursor)?;
            fields.push((field.name.clone(), mapped));
            emitted.push(field.name.clone());
        }
    }
    // Columns contributed by hierarchy members outside the chain sit
    // past the cursor and stay positional only.

    Ok(MappedValue::EntityRef {
        ty: ty.to_string(),
        key: Box::new(key),
        fields,
        nullable: false,
    })
}

/// Build the item mapping for a structure whose columns start at `cursor`.
pub fn structure_item(
    catalog: &Catalog,
    ty: &str,
    cursor: &mut usize,
) -> Result<MappedValue, TranslateError> {
    let model = catalog.ty(ty)?;
    let mut fields = Vec::new();
    for field in &model.fields {
        if matches!(field.kind, FieldKind::Collection { .. }) {
            return Err(crate::error::TranslateError::model(
                crate::error::ErrorOrigin::Graph,
                format!("structure '{ty}' cannot own collection field '{}'", field.name),
            ));
        }
        let owner = MappedValue::Structure {
            ty: ty.to_string(),
            fields: Vec::new(),
        };
        let mapped = field_item(catalog, &field.kind, field.nullable, &owner, cursor)?;
        fields.push((field.name.clone(), mapped));
    }
    Ok(MappedValue::Structure {
        ty: ty.to_string(),
        fields,
    })
}

fn field_item(
    catalog: &Catalog,
    kind: &FieldKind,
    nullable: bool,
    owner_key: &MappedValue,
    cursor: &mut usize,
) -> Result<MappedValue, TranslateError> {
    match kind {
        FieldKind::Scalar(kind) => {
            let mapped = MappedValue::column(*cursor, *kind, nullable);
            *cursor += 1;
            Ok(mapped)
        }
        FieldKind::Ref { target } => {
            let mut key_columns = Vec::new();
            for key_col in catalog.key_layout(target)? {
                key_columns.push(MappedValue::column(*cursor, key_col.kind, true));
                *cursor += 1;
            }
            Ok(MappedValue::EntityRef {
                ty: target.clone(),
                key: Box::new(MappedValue::Key {
                    ty: target.clone(),
                    columns: key_columns,
                }),
                fields: Vec::new(),
                nullable: true,
            })
        }
        FieldKind::Structure { target } => structure_item(catalog, target, cursor),
        FieldKind::Collection { target, via } => Ok(MappedValue::CollectionRef {
            element: target.clone(),
            via: via.clone(),
            owner_key: Box::new(owner_key.clone()),
        }),
    }
}
