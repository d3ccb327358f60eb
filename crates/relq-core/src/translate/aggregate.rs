//! Aggregates. At the root an aggregate is one global aggregate node.
//! Applied to a grouping it folds into the grouping's aggregate node
//! when the plan still permits; otherwise it is grafted as a correlated
//! apply over a one-row sub-aggregate.

use super::{Frame, Projection, ResultAccess, Translator, TranslatorState};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::{ExprId, ExprNode, QueryOp},
    mapped::MappedValue,
    obs::{self, TraceEvent},
    plan::{
        AggregateColumn, AggregateFunc, ApplyCellId, ApplyKind, NodeId, RelNode, ScalarExpr,
    },
    value::ScalarKind,
};

impl Translator<'_> {
    pub(crate) fn op_aggregate(
        &mut self,
        op: &QueryOp,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let (func, _) = func_of(op);
        let projection = self.translate_node(source, state)?;
        let mut frame = Frame {
            root: projection.root,
        };
        let column = self.aggregate_column(func, &projection.item, args, &mut frame, state)?;
        let input = frame.root;
        let root = self.arena.alloc(RelNode::Aggregate {
            input,
            group: Vec::new(),
            aggregates: vec![AggregateColumn { func, column }],
        });
        let (kind, nullable) = self.aggregate_kind(func, input, column);
        let item = MappedValue::column(0, kind, nullable);
        // A global aggregate yields exactly one row.
        Ok(Projection {
            root,
            item,
            access: ResultAccess::First,
        })
    }

    /// Aggregate in scalar position inside a lambda body.
    pub(crate) fn nested_aggregate(
        &mut self,
        op: &QueryOp,
        source: ExprId,
        args: &[ExprId],
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<ScalarExpr, TranslateError> {
        let (func, name) = func_of(op);

        if let Some(cell) = self.foldable_grouping(source, frame) {
            // A filtered count cannot share the group's aggregate node.
            let filtered_count = func == AggregateFunc::Count && !args.is_empty();
            if !filtered_count {
                return self.fold_into_group(func, name, cell, args, frame, state);
            }
        }

        obs::record(TraceEvent::AggregateApplyFallback { func: name });
        let sub = self.translate_node(source, state.nested())?;
        let mut inner = Frame { root: sub.root };
        let column = self.aggregate_column(func, &sub.item, args, &mut inner, state)?;
        let aggregate = self.arena.alloc(RelNode::Aggregate {
            input: inner.root,
            group: Vec::new(),
            aggregates: vec![AggregateColumn { func, column }],
        });

        let left_width = self.arena.width(frame.root);
        let cell = self.cells.cell_for(frame.root);
        let apply = self.arena.alloc(RelNode::Apply {
            left: frame.root,
            right: aggregate,
            cell,
            kind: ApplyKind::Cross,
        });
        self.registry
            .replace_root(frame.root, apply, &mut self.cells)?;
        frame.root = apply;
        Ok(ScalarExpr::Column(left_width))
    }

    /// The grouping cell, when `source` is a group parameter whose
    /// aggregate node is still the current frame root.
    fn foldable_grouping(&self, source: ExprId, frame: &Frame) -> Option<ApplyCellId> {
        if !matches!(self.graph.node(source), ExprNode::Param { .. }) {
            return None;
        }
        let projection = self.registry.get(source).ok()?;
        let MappedValue::Grouping { cell, .. } = projection.item.strip_markers() else {
            return None;
        };
        let cell = *cell;
        if self.cells.get(frame.root) == Some(cell) && self.grouped.contains(cell) {
            Some(cell)
        } else {
            None
        }
    }

    fn fold_into_group(
        &mut self,
        func: AggregateFunc,
        name: &'static str,
        cell: ApplyCellId,
        args: &[ExprId],
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<ScalarExpr, TranslateError> {
        let (input, group, mut aggregates, item) = {
            let info = self.grouped.get_mut(cell).ok_or_else(|| {
                TranslateError::invariant(ErrorOrigin::Translate, "grouping cell has no plan entry")
            })?;
            (
                info.input,
                info.group.clone(),
                info.aggregates.clone(),
                info.item.clone(),
            )
        };

        let mut inner = Frame { root: input };
        let column = self.aggregate_column(func, &item, args, &mut inner, state)?;
        aggregates.push(AggregateColumn { func, column });

        let rebuilt = self.arena.alloc(RelNode::Aggregate {
            input: inner.root,
            group: group.clone(),
            aggregates: aggregates.clone(),
        });
        self.registry
            .replace_root(frame.root, rebuilt, &mut self.cells)?;
        frame.root = rebuilt;

        let info = self.grouped.get_mut(cell).ok_or_else(|| {
            TranslateError::invariant(ErrorOrigin::Translate, "grouping cell has no plan entry")
        })?;
        info.input = inner.root;
        info.aggregates = aggregates;
        let offset = group.len() + info.aggregates.len() - 1;

        obs::record(TraceEvent::AggregateFolded { func: name });
        Ok(ScalarExpr::Column(offset))
    }

    /// Resolve the aggregate's operand column over an element item.
    /// Count takes an optional predicate and aggregates rows; the rest
    /// take an optional selector and aggregate one primitive column.
    fn aggregate_column(
        &mut self,
        func: AggregateFunc,
        item: &MappedValue,
        args: &[ExprId],
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<Option<usize>, TranslateError> {
        if func == AggregateFunc::Count {
            if let Some(lambda) = args.first().copied() {
                let (params, body) = self.lambda_parts(lambda, 1)?;
                let element = Projection::sequence(frame.root, item.clone());
                let predicate = self.with_binding(params[0], element, |this| {
                    this.visit_scalar(body, frame, state.nested())
                })?;
                let filter = self.arena.alloc(RelNode::Filter {
                    input: frame.root,
                    predicate,
                });
                frame.root = filter;
            }
            return Ok(None);
        }

        let value = match args.first().copied() {
            Some(lambda) => {
                let (params, body) = self.lambda_parts(lambda, 1)?;
                let element = Projection::sequence(frame.root, item.clone());
                let expr = self.with_binding(params[0], element, |this| {
                    this.visit_scalar(body, frame, state.nested())
                })?;
                self.ensure_column(frame, "agg", expr)?
            }
            None => item.clone(),
        };
        let (offset, _, _) = value.as_column().ok_or_else(|| {
            TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("aggregate over {} needs a primitive operand", value.describe()),
            )
        })?;
        Ok(Some(offset))
    }

    fn aggregate_kind(
        &self,
        func: AggregateFunc,
        input: NodeId,
        column: Option<usize>,
    ) -> (ScalarKind, bool) {
        match func {
            AggregateFunc::Count => (ScalarKind::Int, false),
            AggregateFunc::Avg => (ScalarKind::Float, true),
            AggregateFunc::Sum | AggregateFunc::Min | AggregateFunc::Max => column
                .map_or((ScalarKind::Int, true), |offset| {
                    let (kind, _) = self.column_kind(input, offset);
                    (kind, true)
                }),
        }
    }
}

pub(crate) fn func_of(op: &QueryOp) -> (AggregateFunc, &'static str) {
    match op {
        QueryOp::Count => (AggregateFunc::Count, "count"),
        QueryOp::Sum => (AggregateFunc::Sum, "sum"),
        QueryOp::Min => (AggregateFunc::Min, "min"),
        QueryOp::Max => (AggregateFunc::Max, "max"),
        QueryOp::Average => (AggregateFunc::Avg, "avg"),
        other => unreachable!("{other:?} dispatched as an aggregate"),
    }
}
