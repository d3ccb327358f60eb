use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::ConstructTarget,
    plan::ApplyCellId,
    translate::Projection,
    value::ScalarKind,
};

///
/// MappedValue
///
/// Closed tagged union describing how one logical value is read back
/// out of plan rows. Composites carry nested mappings; decomposing any
/// composite must yield exactly its declared primitive-field count.
///

#[derive(Clone, Debug)]
pub enum MappedValue {
    /// One primitive value at a row offset.
    Column {
        offset: usize,
        kind: ScalarKind,
        nullable: bool,
    },

    /// Ordered primitive columns identifying a persistent object.
    Key { ty: String, columns: Vec<MappedValue> },

    /// A key plus any joined-in scalar fields of the referenced object.
    EntityRef {
        ty: String,
        key: Box<MappedValue>,
        fields: Vec<(String, MappedValue)>,
        nullable: bool,
    },

    /// Named set of child mappings; value type, no identity.
    Structure {
        ty: String,
        fields: Vec<(String, MappedValue)>,
    },

    /// Navigation to a dependent collection. Never materialized eagerly;
    /// translated into a correlated sub-plan on demand.
    CollectionRef {
        element: String,
        via: String,
        owner_key: Box<MappedValue>,
    },

    /// A group key plus the correlated sub-projection of its elements.
    Grouping {
        key: Box<MappedValue>,
        elements: Box<Projection>,
        cell: ApplyCellId,
    },

    /// A correlated sub-projection depending on the enclosing row.
    Subquery {
        projection: Box<Projection>,
        cell: ApplyCellId,
    },

    /// Constructor invocation with by-name member bindings.
    Constructor {
        target: ConstructTarget,
        members: Vec<(String, MappedValue)>,
    },

    /// Wrapper tagging first/single/default semantics without altering
    /// shape; stripped before structural comparisons.
    Marker {
        kind: MarkerKind,
        inner: Box<MappedValue>,
    },
}

impl MappedValue {
    #[must_use]
    pub fn column(offset: usize, kind: ScalarKind, nullable: bool) -> Self {
        Self::Column {
            offset,
            kind,
            nullable,
        }
    }

    /// Strip marker wrappers down to the underlying mapping.
    #[must_use]
    pub fn strip_markers(&self) -> &Self {
        let mut current = self;
        while let Self::Marker { inner, .. } = current {
            current = inner;
        }
        current
    }

    /// Primitive column view, if this maps exactly one column.
    #[must_use]
    pub fn as_column(&self) -> Option<(usize, ScalarKind, bool)> {
        match self.strip_markers() {
            Self::Column {
                offset,
                kind,
                nullable,
            } => Some((*offset, *kind, *nullable)),
            _ => None,
        }
    }

    /// Short tag used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self.strip_markers() {
            Self::Column { offset, .. } => format!("column(#{offset})"),
            Self::Key { ty, .. } => format!("key<{ty}>"),
            Self::EntityRef { ty, .. } => format!("entity<{ty}>"),
            Self::Structure { ty, .. } => format!("structure<{ty}>"),
            Self::CollectionRef { element, .. } => format!("collection<{element}>"),
            Self::Grouping { .. } => "grouping".to_string(),
            Self::Subquery { .. } => "subquery".to_string(),
            Self::Constructor { .. } => "composite".to_string(),
            Self::Marker { .. } => unreachable!("markers are stripped above"),
        }
    }

    /// Shift every column offset by `delta`. Correlated sub-projections
    /// live in their own row space and are left untouched.
    #[must_use]
    pub fn shift(&self, delta: usize) -> Self {
        self.map_offsets(&|offset| offset + delta)
    }

    fn map_offsets(&self, map: &dyn Fn(usize) -> usize) -> Self {
        match self {
            Self::Column {
                offset,
                kind,
                nullable,
            } => Self::Column {
                offset: map(*offset),
                kind: *kind,
                nullable: *nullable,
            },
            Self::Key { ty, columns } => Self::Key {
                ty: ty.clone(),
                columns: columns.iter().map(|col| col.map_offsets(map)).collect(),
            },
            Self::EntityRef {
                ty,
                key,
                fields,
                nullable,
            } => Self::EntityRef {
                ty: ty.clone(),
                key: Box::new(key.map_offsets(map)),
                fields: fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.map_offsets(map)))
                    .collect(),
                nullable: *nullable,
            },
            Self::Structure { ty, fields } => Self::Structure {
                ty: ty.clone(),
                fields: fields
                    .iter()
                    .map(|(name, field)| (name.clone(), field.map_offsets(map)))
                    .collect(),
            },
            Self::CollectionRef {
                element,
                via,
                owner_key,
            } => Self::CollectionRef {
                element: element.clone(),
                via: via.clone(),
                owner_key: Box::new(owner_key.map_offsets(map)),
            },
            Self::Grouping {
                key,
                elements,
                cell,
            } => Self::Grouping {
                key: Box::new(key.map_offsets(map)),
                elements: elements.clone(),
                cell: *cell,
            },
            Self::Subquery { projection, cell } => Self::Subquery {
                projection: projection.clone(),
                cell: *cell,
            },
            Self::Constructor { target, members } => Self::Constructor {
                target: target.clone(),
                members: members
                    .iter()
                    .map(|(name, member)| (name.clone(), member.map_offsets(map)))
                    .collect(),
            },
            Self::Marker { kind, inner } => Self::Marker {
                kind: *kind,
                inner: Box::new(inner.map_offsets(map)),
            },
        }
    }

    /// Remap column offsets through a permutation table built for a
    /// hierarchy cast. Every referenced offset must be mapped.
    pub fn remap(&self, table: &[Option<usize>]) -> Result<Self, TranslateError> {
        // map_offsets is infallible, so record the first unmapped offset
        // on the side and reject afterwards.
        let missing = std::cell::Cell::new(None);
        let checked = self.map_offsets(&|offset| {
            table.get(offset).copied().flatten().unwrap_or_else(|| {
                missing.set(Some(offset));
                offset
            })
        });
        if let Some(offset) = missing.get() {
            return Err(TranslateError::invariant(
                ErrorOrigin::Translate,
                format!("cast remap has no target position for column #{offset}"),
            ));
        }
        Ok(checked)
    }
}

///
/// MarkerKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarkerKind {
    First,
    Single,
    Default,
}
