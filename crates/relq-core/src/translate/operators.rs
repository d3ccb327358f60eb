//! Row-shaping operators: filtering, projection, ordering, paging,
//! distinct, and set operations.

use super::{Frame, Projection, ResultAccess, Translator, TranslatorState};
use crate::{
    error::{ErrorOrigin, TranslateError},
    fold::{Classified, ParamKind, classify},
    graph::{ExprId, QueryOp},
    mapped::MappedValue,
    plan::{RelNode, ScalarExpr, SetOpKind},
    query::BindingShape,
    value::{SortDirection, Value},
};

impl Translator<'_> {
    pub(crate) fn op_where(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let (params, body) = self.lambda_parts(arg(args, 0)?, 1)?;
        let mut frame = Frame {
            root: projection.root,
        };
        let predicate = self.with_binding(params[0], projection.clone(), |this| {
            this.visit_scalar(body, &mut frame, state.nested())
        })?;
        let root = self.arena.alloc(RelNode::Filter {
            input: frame.root,
            predicate,
        });
        Ok(projection.with_root(root))
    }

    pub(crate) fn op_select(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let (params, body) = self.lambda_parts(arg(args, 0)?, 1)?;
        let mut frame = Frame {
            root: projection.root,
        };
        let item = self.with_binding(params[0], projection.clone(), |this| {
            let spaced = this.visit_value(body, &mut frame, state.nested())?;
            this.into_current(spaced, &mut frame)
        })?;
        Ok(projection.with_root(frame.root).with_item(item))
    }

    pub(crate) fn op_order_by(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        direction: SortDirection,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let mut frame = Frame {
            root: projection.root,
        };
        let keys = self.sort_keys(arg(args, 0)?, direction, projection.clone(), &mut frame, state)?;
        let root = self.arena.alloc(RelNode::Sort {
            input: frame.root,
            keys,
        });
        Ok(projection.with_root(root))
    }

    /// A secondary sort key merges into the ordering it continues; the
    /// sort is rebuilt instead of stacked.
    pub(crate) fn op_then_by(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        direction: SortDirection,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let RelNode::Sort { input, keys } = self.arena.node(projection.root).clone() else {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                "ordering continuation without a preceding ordering",
            ));
        };
        let mut frame = Frame { root: input };
        let element = projection.clone().with_root(input);
        let mut merged = keys;
        merged.extend(self.sort_keys(arg(args, 0)?, direction, element, &mut frame, state)?);
        let root = self.arena.alloc(RelNode::Sort {
            input: frame.root,
            keys: merged,
        });
        Ok(projection.with_root(root))
    }

    fn sort_keys(
        &mut self,
        lambda: ExprId,
        direction: SortDirection,
        element: Projection,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<Vec<(usize, SortDirection)>, TranslateError> {
        let (params, body) = self.lambda_parts(lambda, 1)?;
        let key = self.with_binding(params[0], element, |this| {
            let expr = this.visit_scalar(body, frame, state.nested())?;
            this.ensure_column(frame, "sort", expr)
        })?;
        let Some((offset, _, _)) = key.as_column() else {
            return Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                "ordering key is not a primitive value",
            ));
        };
        Ok(vec![(offset, direction)])
    }

    pub(crate) fn op_distinct(
        &mut self,
        source: ExprId,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let narrowed = self.narrow_to_item(projection)?;
        let root = self.arena.alloc(RelNode::Distinct {
            input: narrowed.root,
        });
        Ok(narrowed.with_root(root))
    }

    pub(crate) fn op_skip(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let count = self.paging_count(arg(args, 0)?)?;
        let root = self.arena.alloc(RelNode::Skip {
            input: projection.root,
            count,
        });
        Ok(projection.with_root(root))
    }

    pub(crate) fn op_take(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let count = self.paging_count(arg(args, 0)?)?;
        let root = self.arena.alloc(RelNode::Take {
            input: projection.root,
            count,
        });
        Ok(projection.with_root(root))
    }

    pub(crate) fn op_element_at(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        or_default: bool,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let count = self.paging_count(arg(args, 0)?)?;
        let skip = self.arena.alloc(RelNode::Skip {
            input: projection.root,
            count,
        });
        let root = self.arena.alloc(RelNode::Take {
            input: skip,
            count: ScalarExpr::Literal(Value::Int(1)),
        });
        let access = if or_default {
            ResultAccess::FirstOrDefault
        } else {
            ResultAccess::First
        };
        Ok(projection.with_root(root).with_access(access))
    }

    pub(crate) fn op_set(
        &mut self,
        op: &QueryOp,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let left = self.translate_node(source, state)?;
        let left = self.narrow_to_item(left)?;
        let right = self.translate_node(arg(args, 0)?, state)?;
        let right = self.narrow_to_item(right)?;

        let left_width = self.arena.width(left.root);
        let right_width = self.arena.width(right.root);
        if left_width != right_width {
            return Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!("set operands differ in width: {left_width} and {right_width}"),
            ));
        }

        let kind = match op {
            QueryOp::Union => SetOpKind::Union,
            QueryOp::Intersect => SetOpKind::Intersect,
            QueryOp::Except => SetOpKind::Except,
            QueryOp::Concat => SetOpKind::Concat,
            _ => unreachable!("dispatched as a set operator"),
        };
        let root = self.arena.alloc(RelNode::SetOp {
            kind,
            left: left.root,
            right: right.root,
        });
        Ok(left.with_root(root))
    }

    // --- shared helpers ---

    /// Fix a visited value into the current row space; enclosing-row
    /// scalars are copied in through a computed column.
    pub(crate) fn into_current(
        &mut self,
        spaced: super::Spaced,
        frame: &mut Frame,
    ) -> Result<MappedValue, TranslateError> {
        match spaced.cell {
            None => Ok(spaced.value),
            Some(_) => {
                let expr = spaced.as_scalar().ok_or_else(|| {
                    TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        format!("enclosing-row {} in projected item", spaced.value.describe()),
                    )
                })?;
                self.ensure_column(frame, "value", expr)
            }
        }
    }

    /// Project the row down to exactly the item's columns, remapping the
    /// item onto positions `0..n`. Row identity then coincides with item
    /// identity, which distinct and set operations require.
    pub(crate) fn narrow_to_item(
        &mut self,
        projection: Projection,
    ) -> Result<Projection, TranslateError> {
        let offsets = item_offsets(&projection.item)?;
        let columns = offsets.iter().map(|offset| ScalarExpr::Column(*offset)).collect();
        let root = self.arena.alloc(RelNode::Project {
            input: projection.root,
            columns,
        });

        let width = self.arena.width(projection.root);
        let mut table = vec![None; width];
        for (position, offset) in offsets.iter().enumerate() {
            table[*offset] = Some(position);
        }
        let item = projection.item.remap(&table)?;
        Ok(projection.with_root(root).with_item(item))
    }

    /// Paging counts must be data-independent; literals are rejected in
    /// cached translations because the baked value would silently apply
    /// to every replay.
    fn paging_count(&mut self, id: ExprId) -> Result<ScalarExpr, TranslateError> {
        if !self.folds.contains(id) {
            return Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                "paging count depends on row data",
            ));
        }
        match classify(self.graph, self.catalog, id)? {
            Classified::Constant(value @ (Value::Int(_) | Value::Uint(_))) => {
                if self.cached {
                    Err(TranslateError::cached_query(
                        "literal paging value in a cached plan; capture it instead",
                    ))
                } else {
                    Ok(ScalarExpr::Literal(value))
                }
            }
            Classified::Constant(other) => Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!("paging count evaluated to {other:?}, expected an integer"),
            )),
            Classified::Parameter(ParamKind::Capture) => {
                let binding = self.captures.allocate(id, BindingShape::Scalar);
                Ok(ScalarExpr::Param(binding))
            }
            Classified::Parameter(kind) => Err(TranslateError::model(
                ErrorOrigin::Translate,
                format!("paging count captured a {kind:?} value"),
            )),
        }
    }
}

pub(crate) fn arg(args: &[ExprId], index: usize) -> Result<ExprId, TranslateError> {
    args.get(index).copied().ok_or_else(|| {
        TranslateError::model(
            ErrorOrigin::Graph,
            format!("operator is missing argument #{index}"),
        )
    })
}

/// Column offsets backing an item, in mapping order, deduplicated.
/// Collection references contribute nothing of their own; their owner
/// key already appears in the entity's key columns.
pub(crate) fn item_offsets(item: &MappedValue) -> Result<Vec<usize>, TranslateError> {
    fn walk(value: &MappedValue, out: &mut Vec<usize>) -> Result<(), TranslateError> {
        match value.strip_markers() {
            MappedValue::Column { offset, .. } => {
                if !out.contains(offset) {
                    out.push(*offset);
                }
                Ok(())
            }
            MappedValue::Key { columns, .. } => {
                for column in columns {
                    walk(column, out)?;
                }
                Ok(())
            }
            MappedValue::EntityRef { key, fields, .. } => {
                walk(key, out)?;
                for (_, field) in fields {
                    walk(field, out)?;
                }
                Ok(())
            }
            MappedValue::Structure { fields, .. } => {
                for (_, field) in fields {
                    walk(field, out)?;
                }
                Ok(())
            }
            MappedValue::Constructor { members, .. } => {
                for (_, member) in members {
                    walk(member, out)?;
                }
                Ok(())
            }
            MappedValue::CollectionRef { .. } => Ok(()),
            other @ (MappedValue::Grouping { .. } | MappedValue::Subquery { .. }) => {
                Err(TranslateError::unsupported(
                    ErrorOrigin::Translate,
                    format!("{} cannot be narrowed to plan columns", other.describe()),
                ))
            }
            MappedValue::Marker { .. } => unreachable!("markers are stripped above"),
        }
    }

    let mut out = Vec::new();
    walk(item, &mut out)?;
    Ok(out)
}
