use crate::{
    error::{ErrorOrigin, TranslateError},
    value::ScalarKind,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Synthetic discriminant column name for multi-member hierarchies.
pub const TYPE_DISCRIMINANT: &str = "$type";

///
/// Catalog
///
/// Read-only persistent-type catalog supplied by the surrounding mapper.
/// The translator only reads it; it never fabricates or mutates type
/// metadata. Shared-read-only for the duration of a translation.
///

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Catalog {
    types: BTreeMap<String, TypeModel>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a type model, keyed by its path.
    pub fn register(&mut self, model: TypeModel) {
        self.types.insert(model.path.clone(), model);
    }

    /// Resolve a type model or fail with a model-consistency error.
    pub fn ty(&self, path: &str) -> Result<&TypeModel, TranslateError> {
        self.types.get(path).ok_or_else(|| TranslateError::unknown_type(path))
    }

    /// Resolve a field on a type, searching the inheritance chain, or
    /// fail with a model-consistency error.
    pub fn field<'a>(&'a self, ty: &str, name: &str) -> Result<&'a FieldModel, TranslateError> {
        let mut current = self.ty(ty)?;
        loop {
            if let Some(field) = current.fields.iter().find(|field| field.name == name) {
                return Ok(field);
            }
            match &current.parent {
                Some(parent) => current = self.ty(parent)?,
                None => return Err(TranslateError::unknown_field(ty, name)),
            }
        }
    }

    /// Inheritance chain of a type, hierarchy root first.
    pub fn hierarchy_chain<'a>(&'a self, ty: &str) -> Result<Vec<&'a TypeModel>, TranslateError> {
        let mut chain = vec![self.ty(ty)?];
        while let Some(parent) = &chain.last().expect("non-empty").parent {
            chain.push(self.ty(parent)?);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Every entity type sharing this type's hierarchy root, sorted by
    /// path for deterministic column order.
    pub fn hierarchy_members<'a>(&'a self, ty: &str) -> Result<Vec<&'a TypeModel>, TranslateError> {
        let root = self.hierarchy_root(ty)?.path.clone();
        let mut members = Vec::new();
        for candidate in self.types.keys() {
            if self.types[candidate].is_entity() && self.is_descendant_or_self(candidate, &root)? {
                members.push(&self.types[candidate]);
            }
        }
        Ok(members)
    }

    /// Walk parent links up to the hierarchy root.
    pub fn hierarchy_root<'a>(&'a self, path: &str) -> Result<&'a TypeModel, TranslateError> {
        let mut current = self.ty(path)?;
        while let Some(parent) = &current.parent {
            current = self.ty(parent)?;
        }
        Ok(current)
    }

    /// True when both types share one hierarchy root.
    pub fn same_hierarchy(&self, left: &str, right: &str) -> Result<bool, TranslateError> {
        Ok(self.hierarchy_root(left)?.path == self.hierarchy_root(right)?.path)
    }

    /// True when `sub` is `ty` or a transitive subtype of it.
    pub fn is_descendant_or_self(&self, sub: &str, ty: &str) -> Result<bool, TranslateError> {
        let mut current = self.ty(sub)?;
        loop {
            if current.path == ty {
                return Ok(true);
            }
            match &current.parent {
                Some(parent) => current = self.ty(parent)?,
                None => return Ok(false),
            }
        }
    }

    /// Type ids of `ty` and every transitive subtype, sorted.
    pub fn descendant_ids(&self, ty: &str) -> Result<Vec<u32>, TranslateError> {
        self.ty(ty)?;
        let mut ids = Vec::new();
        for candidate in self.types.keys() {
            if self.is_descendant_or_self(candidate, ty)? {
                ids.push(self.types[candidate].type_id);
            }
        }
        ids.sort_unstable();
        Ok(ids)
    }

    /// True when the type's hierarchy has more than one member and thus
    /// carries a discriminant column.
    pub fn has_discriminant(&self, ty: &str) -> Result<bool, TranslateError> {
        Ok(self.hierarchy_members(ty)?.len() > 1)
    }

    /// Flattened row layout for an entity type.
    ///
    /// Hierarchy members share one column space: key columns, the
    /// discriminant (when the hierarchy has subtypes), the inheritance
    /// chain's fields root-first, then the remaining hierarchy members'
    /// fields in path order. Querying any member therefore sees the same
    /// column set, with its own declared fields frontmost. Collections
    /// contribute no columns; they are never materialized eagerly.
    pub fn layout(&self, ty: &str) -> Result<Vec<ColumnInfo>, TranslateError> {
        let model = self.ty(ty)?;
        if !model.is_entity() {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                format!("type '{ty}' is a structure, not a persistent entity"),
            ));
        }

        let mut columns = self.key_layout(ty)?;
        if self.has_discriminant(ty)? {
            columns.push(ColumnInfo {
                name: TYPE_DISCRIMINANT.to_string(),
                kind: ScalarKind::Uint,
                nullable: false,
            });
        }

        let mut emitted: Vec<String> = model.key_fields.clone();
        for member in self.hierarchy_chain(ty)? {
            self.emit_member_fields(member, &mut emitted, &mut columns)?;
        }
        for member in self.hierarchy_members(ty)? {
            self.emit_member_fields(member, &mut emitted, &mut columns)?;
        }
        Ok(columns)
    }

    fn emit_member_fields(
        &self,
        member: &TypeModel,
        emitted: &mut Vec<String>,
        columns: &mut Vec<ColumnInfo>,
    ) -> Result<(), TranslateError> {
        for field in &member.fields {
            if emitted.contains(&field.name) || member.key_fields.contains(&field.name) {
                continue;
            }
            // Subtype fields outside the chain stay nullable: a row of a
            // sibling type has no value for them.
            self.flatten_field(field, &field.name, columns, &mut vec![member.path.clone()])?;
            emitted.push(field.name.clone());
        }
        Ok(())
    }

    /// Primitive width of one field.
    pub fn field_width(&self, kind: &FieldKind) -> Result<usize, TranslateError> {
        Ok(match kind {
            FieldKind::Scalar(_) => 1,
            FieldKind::Ref { target } => self.key_width(target)?,
            FieldKind::Structure { target } => self.structure_layout(target)?.len(),
            FieldKind::Collection { .. } => 0,
        })
    }

    /// Primitive columns of an entity's key, in declaration order.
    pub fn key_layout(&self, ty: &str) -> Result<Vec<ColumnInfo>, TranslateError> {
        let model = self.ty(ty)?;
        let mut columns = Vec::with_capacity(model.key_fields.len());
        for key_field in &model.key_fields {
            let field = self.field(ty, key_field)?;
            let FieldKind::Scalar(kind) = field.kind else {
                return Err(TranslateError::model(
                    ErrorOrigin::Graph,
                    format!("key field '{key_field}' on '{ty}' must be scalar"),
                ));
            };
            columns.push(ColumnInfo {
                name: key_field.clone(),
                kind,
                nullable: false,
            });
        }
        if columns.is_empty() {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                format!("entity type '{ty}' declares no key fields"),
            ));
        }
        Ok(columns)
    }

    /// Number of primitive columns an entity key occupies.
    pub fn key_width(&self, ty: &str) -> Result<usize, TranslateError> {
        Ok(self.key_layout(ty)?.len())
    }

    /// Flattened column layout of a structure type.
    pub fn structure_layout(&self, ty: &str) -> Result<Vec<ColumnInfo>, TranslateError> {
        let model = self.ty(ty)?;
        if model.is_entity() {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                format!("type '{ty}' is an entity, not a structure"),
            ));
        }
        let mut columns = Vec::new();
        for field in &model.fields {
            self.flatten_field(field, &field.name, &mut columns, &mut vec![ty.to_string()])?;
        }
        Ok(columns)
    }

    fn flatten_field(
        &self,
        field: &FieldModel,
        prefix: &str,
        out: &mut Vec<ColumnInfo>,
        visiting: &mut Vec<String>,
    ) -> Result<(), TranslateError> {
        match &field.kind {
            FieldKind::Scalar(kind) => out.push(ColumnInfo {
                name: prefix.to_string(),
                kind: *kind,
                nullable: field.nullable,
            }),
            FieldKind::Ref { target } => {
                // Reference fields store the target key inline; the column
                // is nullable because the association may be unset.
                for key_col in self.key_layout(target)? {
                    out.push(ColumnInfo {
                        name: format!("{prefix}.{}", key_col.name),
                        kind: key_col.kind,
                        nullable: true,
                    });
                }
            }
            FieldKind::Structure { target } => {
                if visiting.iter().any(|seen| seen == target) {
                    return Err(TranslateError::model(
                        ErrorOrigin::Graph,
                        format!("structure type '{target}' recursively contains itself"),
                    ));
                }
                visiting.push(target.clone());
                let model = self.ty(target)?;
                for child in &model.fields {
                    let name = format!("{prefix}.{}", child.name);
                    self.flatten_field(child, &name, out, visiting)?;
                }
                visiting.pop();
            }
            FieldKind::Collection { .. } => {}
        }
        Ok(())
    }
}

///
/// TypeModel
///
/// One persistent entity or embedded structure. Entities declare key
/// fields and belong to a hierarchy (their own, unless `parent` is set);
/// structures declare neither key nor hierarchy.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct TypeModel {
    pub path: String,
    pub parent: Option<String>,
    /// Stable discriminant id within the catalog.
    pub type_id: u32,
    /// Empty for structures.
    pub key_fields: Vec<String>,
    pub fields: Vec<FieldModel>,
}

impl TypeModel {
    #[must_use]
    pub fn entity(path: &str, type_id: u32, key_fields: &[&str], fields: Vec<FieldModel>) -> Self {
        Self {
            path: path.to_string(),
            parent: None,
            type_id,
            key_fields: key_fields.iter().map(ToString::to_string).collect(),
            fields,
        }
    }

    #[must_use]
    pub fn subtype(
        path: &str,
        parent: &str,
        type_id: u32,
        key_fields: &[&str],
        fields: Vec<FieldModel>,
    ) -> Self {
        Self {
            path: path.to_string(),
            parent: Some(parent.to_string()),
            type_id,
            key_fields: key_fields.iter().map(ToString::to_string).collect(),
            fields,
        }
    }

    #[must_use]
    pub fn structure(path: &str, type_id: u32, fields: Vec<FieldModel>) -> Self {
        Self {
            path: path.to_string(),
            parent: None,
            type_id,
            key_fields: Vec::new(),
            fields,
        }
    }

    #[must_use]
    pub const fn is_entity(&self) -> bool {
        !self.key_fields.is_empty()
    }
}

///
/// FieldModel
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct FieldModel {
    pub name: String,
    pub kind: FieldKind,
    pub nullable: bool,
}

impl FieldModel {
    #[must_use]
    pub fn scalar(name: &str, kind: ScalarKind) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar(kind),
            nullable: false,
        }
    }

    #[must_use]
    pub fn nullable_scalar(name: &str, kind: ScalarKind) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Scalar(kind),
            nullable: true,
        }
    }

    #[must_use]
    pub fn reference(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Ref {
                target: target.to_string(),
            },
            nullable: true,
        }
    }

    #[must_use]
    pub fn structure(name: &str, target: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Structure {
                target: target.to_string(),
            },
            nullable: false,
        }
    }

    #[must_use]
    pub fn collection(name: &str, target: &str, via: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Collection {
                target: target.to_string(),
                via: via.to_string(),
            },
            nullable: false,
        }
    }
}

///
/// FieldKind
///
/// Minimal type surface needed by translation. This is a lossy
/// projection of the mapper's full schema layer.
///

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum FieldKind {
    Scalar(ScalarKind),
    /// Association to another entity; stored as the target key inline.
    Ref { target: String },
    /// Embedded value structure, flattened into the owner's row.
    Structure { target: String },
    /// Dependent collection reachable through `via` on the target.
    Collection { target: String, via: String },
}

///
/// ColumnInfo
/// One primitive column of a flattened row layout.
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub kind: ScalarKind,
    pub nullable: bool,
}
