//! Hierarchy casts. Members of one hierarchy share a single column
//! space, so a cast is a name-keyed permutation of the item's offsets;
//! narrowing additionally filters on the discriminant column.

use super::{Projection, Translator, TranslatorState, expression::key_column_offsets_of};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::ExprId,
    mapped::MappedValue,
    plan::{RelNode, ScalarExpr},
    value::Value,
};

impl Translator<'_> {
    /// Reinterpret every element as `ty`. Widening is a pure remap;
    /// narrowing keeps only rows of the target subtree, since a
    /// relational plan has no per-row failure channel.
    pub(crate) fn op_cast(
        &mut self,
        source: ExprId,
        ty: &str,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let (src, base) = entity_base(&projection.item)?;

        if !self.catalog.same_hierarchy(&src, ty)? {
            return Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!("cast from '{src}' to '{ty}' crosses hierarchies"),
            ));
        }
        let narrowing = self.catalog.is_descendant_or_self(ty, &src)?;
        let widening = self.catalog.is_descendant_or_self(&src, ty)?;
        if !narrowing && !widening {
            return Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("cast between sibling types '{src}' and '{ty}'"),
            ));
        }

        let item = self.permuted_item(&src, ty, base)?;
        let root = if narrowing && src != ty {
            self.discriminant_filter(projection.root, &src, ty, base)?
        } else {
            projection.root
        };
        Ok(Projection::sequence(root, item))
    }

    /// Keep only elements of `ty` or a subtype, reinterpreted as `ty`.
    pub(crate) fn op_of_type(
        &mut self,
        source: ExprId,
        ty: &str,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let (src, base) = entity_base(&projection.item)?;

        if !self.catalog.same_hierarchy(&src, ty)? {
            return Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!("type filter from '{src}' to '{ty}' crosses hierarchies"),
            ));
        }

        let item = self.permuted_item(&src, ty, base)?;
        // Rows already within the target subtree need no filter.
        let root = if self.catalog.is_descendant_or_self(&src, ty)? {
            projection.root
        } else {
            self.discriminant_filter(projection.root, &src, ty, base)?
        };
        Ok(Projection::sequence(root, item))
    }

    /// Item of `dst` over a row laid out for `src`, matched column by
    /// column on names.
    fn permuted_item(
        &self,
        src: &str,
        dst: &str,
        base: usize,
    ) -> Result<MappedValue, TranslateError> {
        let src_layout = self.catalog.layout(src)?;
        let dst_layout = self.catalog.layout(dst)?;
        let raw = crate::mapped::entity_item(self.catalog, dst, 0)?;

        let mut table = vec![None; dst_layout.len()];
        for (position, column) in dst_layout.iter().enumerate() {
            let found = src_layout
                .iter()
                .position(|candidate| candidate.name == column.name)
                .ok_or_else(|| {
                    TranslateError::invariant(
                        ErrorOrigin::Translate,
                        format!(
                            "hierarchy layouts of '{src}' and '{dst}' diverge at column '{}'",
                            column.name
                        ),
                    )
                })?;
            table[position] = Some(base + found);
        }
        raw.remap(&table)
    }

    fn discriminant_filter(
        &mut self,
        input: crate::plan::NodeId,
        src: &str,
        dst: &str,
        base: usize,
    ) -> Result<crate::plan::NodeId, TranslateError> {
        if !self.catalog.has_discriminant(src)? {
            return Ok(input);
        }
        // The discriminant sits right after the key columns.
        let offset = base + self.catalog.key_width(src)?;
        let predicate = ScalarExpr::or_all(
            self.catalog
                .descendant_ids(dst)?
                .into_iter()
                .map(|id| {
                    ScalarExpr::eq(
                        ScalarExpr::Column(offset),
                        ScalarExpr::Literal(Value::Uint(u64::from(id))),
                    )
                })
                .collect(),
        );
        Ok(self.arena.alloc(RelNode::Filter { input, predicate }))
    }
}

/// Entity type and base offset of a sequence item.
fn entity_base(item: &MappedValue) -> Result<(String, usize), TranslateError> {
    let MappedValue::EntityRef { ty, key, .. } = item.strip_markers() else {
        return Err(TranslateError::unsupported(
            ErrorOrigin::Translate,
            format!("type cast over {} elements", item.describe()),
        ));
    };
    let offsets = key_column_offsets_of(key)?;
    Ok((ty.clone(), offsets[0]))
}
