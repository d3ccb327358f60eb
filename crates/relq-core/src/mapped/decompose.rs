//! Composite decomposition into primitive column lists.
//!
//! Decomposition is how the translator lowers composite comparisons to
//! the primitive-only plan layer. A length mismatch against the
//! catalog's declared primitive-field count is a translator defect and
//! fails loudly.

use super::value::MappedValue;
use crate::{
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    value::ScalarKind,
};

///
/// ColumnSlot
/// One primitive column produced by decomposition.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnSlot {
    pub offset: usize,
    pub kind: ScalarKind,
    pub nullable: bool,
}

impl MappedValue {
    /// Decompose into primitive columns, width-checked against the
    /// catalog's declared counts.
    pub fn decompose(&self, catalog: &Catalog) -> Result<Vec<ColumnSlot>, TranslateError> {
        let mut out = Vec::new();
        self.decompose_into(catalog, &mut out)?;
        if out.is_empty() {
            return Err(TranslateError::invariant(
                ErrorOrigin::Translate,
                format!("decomposition of {} produced no columns", self.describe()),
            ));
        }
        Ok(out)
    }

    fn decompose_into(
        &self,
        catalog: &Catalog,
        out: &mut Vec<ColumnSlot>,
    ) -> Result<(), TranslateError> {
        match self.strip_markers() {
            Self::Column {
                offset,
                kind,
                nullable,
            } => {
                out.push(ColumnSlot {
                    offset: *offset,
                    kind: *kind,
                    nullable: *nullable,
                });
                Ok(())
            }
            Self::Key { ty, columns } => {
                let before = out.len();
                for column in columns {
                    column.decompose_into(catalog, out)?;
                }
                check_width(catalog.key_width(ty)?, out.len() - before, "key", ty)
            }
            // Entity identity is its key; joined-in fields do not take
            // part in comparisons.
            Self::EntityRef { ty, key, .. } => {
                let before = out.len();
                key.decompose_into(catalog, out)?;
                check_width(catalog.key_width(ty)?, out.len() - before, "entity", ty)
            }
            Self::Structure { ty, fields } => {
                let before = out.len();
                for (_, field) in fields {
                    field.decompose_into(catalog, out)?;
                }
                check_width(
                    catalog.structure_layout(ty)?.len(),
                    out.len() - before,
                    "structure",
                    ty,
                )
            }
            Self::Constructor { members, .. } => {
                for (_, member) in members {
                    member.decompose_into(catalog, out)?;
                }
                Ok(())
            }
            other @ (Self::CollectionRef { .. } | Self::Grouping { .. } | Self::Subquery { .. }) => {
                Err(TranslateError::unsupported(
                    ErrorOrigin::Translate,
                    format!("{} cannot be decomposed into primitive columns", other.describe()),
                ))
            }
            Self::Marker { .. } => unreachable!("markers are stripped above"),
        }
    }

    /// Total primitive width of this mapping.
    pub fn width(&self, catalog: &Catalog) -> Result<usize, TranslateError> {
        Ok(self.decompose(catalog)?.len())
    }
}

fn check_width(declared: usize, found: usize, what: &str, ty: &str) -> Result<(), TranslateError> {
    if declared == found {
        Ok(())
    } else {
        Err(TranslateError::invariant(
            ErrorOrigin::Translate,
            format!(
                "{what} decomposition for '{ty}' yielded {found} columns, declared width is {declared}"
            ),
        ))
    }
}
