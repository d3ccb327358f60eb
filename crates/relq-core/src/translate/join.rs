//! Pairing operators: key joins, correlated flattening, and lazy
//! group joins.

use super::{
    Frame, Projection, Translator, TranslatorState,
    operators::arg,
};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::ExprId,
    mapped::MappedValue,
    plan::{ApplyKind, JoinKind, RelNode, ScalarExpr},
};

impl Translator<'_> {
    /// Equi-join on decomposed keys. Composite keys pair part by part;
    /// a width or identity mismatch is rejected before any plan node is
    /// allocated for the join itself.
    pub(crate) fn op_join(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let outer = self.translate_node(source, state)?;
        let inner = self.translate_node(arg(args, 0)?, state)?;

        let (outer_parts, outer_tag, left_root) =
            self.key_parts(arg(args, 1)?, &outer, state)?;
        let (inner_parts, inner_tag, right_root) =
            self.key_parts(arg(args, 2)?, &inner, state)?;
        self.check_tags(outer_tag.as_ref(), inner_tag.as_ref())?;
        if outer_parts.len() != inner_parts.len() {
            return Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!(
                    "join keys differ in width: {} and {}",
                    outer_parts.len(),
                    inner_parts.len()
                ),
            ));
        }

        let left_width = self.arena.width(left_root);
        let condition = ScalarExpr::and_all(
            outer_parts
                .into_iter()
                .zip(inner_parts)
                .map(|(left, right)| ScalarExpr::eq(left, right.shift_columns(left_width)))
                .collect(),
        );
        let join = self.arena.alloc(RelNode::Join {
            left: left_root,
            right: right_root,
            kind: JoinKind::Inner,
            condition,
        });

        let (params, body) = self.lambda_parts(arg(args, 3)?, 2)?;
        let mut frame = Frame { root: join };
        let outer_element = Projection::sequence(join, outer.item.clone());
        let inner_element = Projection::sequence(join, inner.item.shift(left_width));
        let item = self.with_pair(params, outer_element, inner_element, |this| {
            let spaced = this.visit_value(body, &mut frame, state.nested())?;
            this.into_current(spaced, &mut frame)
        })?;
        Ok(Projection::sequence(frame.root, item))
    }

    /// Flatten a per-element sequence with a correlated apply. The
    /// nested plan reads the enclosing row through the apply cell.
    pub(crate) fn op_select_many(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let outer = self.translate_node(source, state)?;
        let (params, body) = self.lambda_parts(arg(args, 0)?, 1)?;
        let param = params[0];

        let (inner, left_root) = self.with_binding(param, outer.clone(), |this| {
            let inner = this.translate_node(body, state.nested())?;
            // Implicit joins inside the collection lambda may have moved
            // the outer root; the apply must sit on where it is now.
            let left_root = this.registry.get(param)?.root;
            Ok((inner, left_root))
        })?;

        let cell = self.cells.cell_for(left_root);
        let apply = self.arena.alloc(RelNode::Apply {
            left: left_root,
            right: inner.root,
            cell,
            kind: ApplyKind::Cross,
        });
        let left_width = self.arena.width(left_root);
        let inner_item = inner.item.shift(left_width);

        let Some(selector) = args.get(1).copied() else {
            return Ok(Projection::sequence(apply, inner_item));
        };
        let (params, body) = self.lambda_parts(selector, 2)?;
        let mut frame = Frame { root: apply };
        let outer_element = Projection::sequence(apply, outer.item.clone());
        let inner_element = Projection::sequence(apply, inner_item);
        let item = self.with_pair(params, outer_element, inner_element, |this| {
            let spaced = this.visit_value(body, &mut frame, state.nested())?;
            this.into_current(spaced, &mut frame)
        })?;
        Ok(Projection::sequence(frame.root, item))
    }

    /// Group join: each outer element is paired with the lazy sequence
    /// of matching inner elements. No plan nodes combine the sides; the
    /// match lives in a correlated sub-plan consumed on demand.
    pub(crate) fn op_group_join(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let outer = self.translate_node(source, state)?;
        let (outer_parts, outer_tag, left_root) =
            self.key_parts(arg(args, 1)?, &outer, state)?;

        // The outer key must be addressable from the inner side, so
        // every part is pinned to a column and read through the cell.
        let mut outer_offsets = Vec::with_capacity(outer_parts.len());
        let mut frame = Frame { root: left_root };
        for part in outer_parts {
            let column = self.ensure_column(&mut frame, "key", part)?;
            let (offset, _, _) = column.as_column().ok_or_else(|| {
                TranslateError::invariant(ErrorOrigin::Translate, "key column pinning failed")
            })?;
            outer_offsets.push(offset);
        }
        let left_root = frame.root;
        let cell = self.cells.cell_for(left_root);

        let inner = self.translate_node(arg(args, 0)?, state)?;
        let (inner_parts, inner_tag, inner_root) =
            self.key_parts(arg(args, 2)?, &inner, state)?;
        self.check_tags(outer_tag.as_ref(), inner_tag.as_ref())?;
        if outer_offsets.len() != inner_parts.len() {
            return Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!(
                    "join keys differ in width: {} and {}",
                    outer_offsets.len(),
                    inner_parts.len()
                ),
            ));
        }

        let predicate = ScalarExpr::and_all(
            inner_parts
                .into_iter()
                .zip(&outer_offsets)
                .map(|(part, offset)| {
                    ScalarExpr::eq(
                        part,
                        ScalarExpr::Outer {
                            cell,
                            column: *offset,
                        },
                    )
                })
                .collect(),
        );
        let filter = self.arena.alloc(RelNode::Filter {
            input: inner_root,
            predicate,
        });
        let matches = MappedValue::Subquery {
            projection: Box::new(Projection::sequence(filter, inner.item)),
            cell,
        };

        let (params, body) = self.lambda_parts(arg(args, 3)?, 2)?;
        let mut frame = Frame { root: left_root };
        let outer_element = Projection::sequence(left_root, outer.item.clone());
        let match_sequence = Projection::sequence(left_root, matches);
        let item = self.with_pair(params, outer_element, match_sequence, |this| {
            let spaced = this.visit_value(body, &mut frame, state.nested())?;
            this.into_current(spaced, &mut frame)
        })?;
        Ok(Projection::sequence(frame.root, item))
    }

    /// Evaluate a key-selector lambda against one side, returning its
    /// flattened parts in that side's (possibly widened) row space.
    fn key_parts(
        &mut self,
        lambda: ExprId,
        side: &Projection,
        state: TranslatorState,
    ) -> Result<
        (
            Vec<ScalarExpr>,
            Option<super::comparison::Tag>,
            crate::plan::NodeId,
        ),
        TranslateError,
    > {
        let (params, body) = self.lambda_parts(lambda, 1)?;
        let param = params[0];
        let mut frame = Frame { root: side.root };
        let operand = self.with_binding(param, side.clone(), |this| {
            this.build_operand(body, &mut frame, state.nested())
        })?;
        let tag = operand.tag().cloned();
        Ok((operand.into_parts(), tag, frame.root))
    }

    /// Bind two parameters over a combined row inside one scope.
    fn with_pair<T>(
        &mut self,
        params: Vec<ExprId>,
        first: Projection,
        second: Projection,
        f: impl FnOnce(&mut Self) -> Result<T, TranslateError>,
    ) -> Result<T, TranslateError> {
        self.registry.enter();
        let out = (|| {
            let declared = self.param_type(params[0]);
            self.registry
                .add(self.catalog, params[0], declared.as_ref(), first)?;
            let declared = self.param_type(params[1]);
            self.registry
                .add(self.catalog, params[1], declared.as_ref(), second)?;
            f(self)
        })();
        self.registry.exit();
        out
    }
}
