//! Element access and quantifiers. At the root these shape the access
//! contract; nested they become correlated applies or counted
//! sub-plans.

use super::{
    Frame, Projection, ResultAccess, Spaced, Translator, TranslatorState,
    comparison::operand_of,
    operators::arg,
};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::{ExprId, QueryOp},
    mapped::{MappedValue, MarkerKind},
    plan::{
        AggregateColumn, AggregateFunc, ApplyCellId, ApplyKind, NodeId, RelNode, ScalarExpr,
        ScalarOp,
    },
    value::{ScalarKind, Value},
};

impl Translator<'_> {
    pub(crate) fn op_first(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        or_default: bool,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.element_input(source, args, state)?;
        let root = self.arena.alloc(RelNode::Take {
            input: projection.root,
            count: ScalarExpr::Literal(Value::Int(1)),
        });
        let access = if or_default {
            ResultAccess::FirstOrDefault
        } else {
            ResultAccess::First
        };
        Ok(projection.with_root(root).with_access(access))
    }

    pub(crate) fn op_single(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        or_default: bool,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        // Two rows are enough to prove plurality.
        let projection = self.element_input(source, args, state)?;
        let root = self.arena.alloc(RelNode::Take {
            input: projection.root,
            count: ScalarExpr::Literal(Value::Int(2)),
        });
        let access = if or_default {
            ResultAccess::SingleOrDefault
        } else {
            ResultAccess::Single
        };
        Ok(projection.with_root(root).with_access(access))
    }

    /// Source with the optional element predicate applied.
    fn element_input(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let mut frame = Frame {
            root: projection.root,
        };
        if let Some(lambda) = args.first().copied() {
            self.predicate_filter(lambda, &projection, &mut frame, false, state)?;
        }
        Ok(projection.with_root(frame.root))
    }

    pub(crate) fn op_any(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let mut frame = Frame {
            root: projection.root,
        };
        if let Some(lambda) = args.first().copied() {
            self.predicate_filter(lambda, &projection, &mut frame, false, state)?;
        }
        self.counted_test(frame.root, ScalarOp::Gt)
    }

    /// All is the absence of a counterexample.
    pub(crate) fn op_all(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        let mut frame = Frame {
            root: projection.root,
        };
        self.predicate_filter(arg(args, 0)?, &projection, &mut frame, true, state)?;
        self.counted_test(frame.root, ScalarOp::Eq)
    }

    pub(crate) fn op_contains(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let projection = self.translate_node(source, state)?;
        // At the root there is no enclosing row; the argument must be
        // data-independent.
        let mut frame = Frame {
            root: projection.root,
        };
        let operand = self.build_operand(arg(args, 0)?, &mut frame, state)?;
        let item_operand = operand_of(&Spaced::current(projection.item.clone()))?;
        self.check_tags(item_operand.tag(), operand.tag())?;
        let predicate = membership_test(item_operand.into_parts(), operand.into_parts())?;
        let filter = self.arena.alloc(RelNode::Filter {
            input: frame.root,
            predicate,
        });
        self.counted_test(filter, ScalarOp::Gt)
    }

    /// Project `count <op> 0` over a global row count.
    fn counted_test(
        &mut self,
        input: NodeId,
        op: ScalarOp,
    ) -> Result<Projection, TranslateError> {
        let aggregate = self.arena.alloc(RelNode::Aggregate {
            input,
            group: Vec::new(),
            aggregates: vec![AggregateColumn {
                func: AggregateFunc::Count,
                column: None,
            }],
        });
        let root = self.arena.alloc(RelNode::Project {
            input: aggregate,
            columns: vec![ScalarExpr::binary(
                op,
                ScalarExpr::Column(0),
                ScalarExpr::Literal(Value::Int(0)),
            )],
        });
        Ok(Projection {
            root,
            item: MappedValue::column(0, ScalarKind::Bool, false),
            access: ResultAccess::First,
        })
    }

    /// First/single element in value position: a left apply carrying at
    /// most one inner row per outer row, tagged for the materializer.
    pub(crate) fn nested_element(
        &mut self,
        source: ExprId,
        args: &[ExprId],
        or_default: bool,
        single: bool,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<Spaced, TranslateError> {
        let sub = self.translate_node(source, state.nested())?;
        let mut inner = Frame { root: sub.root };
        if let Some(lambda) = args.first().copied() {
            self.predicate_filter(lambda, &sub, &mut inner, false, state)?;
        }
        let take = self.arena.alloc(RelNode::Take {
            input: inner.root,
            count: ScalarExpr::Literal(Value::Int(1)),
        });

        let left_width = self.arena.width(frame.root);
        let cell = self.cells.cell_for(frame.root);
        let apply = self.arena.alloc(RelNode::Apply {
            left: frame.root,
            right: take,
            cell,
            kind: ApplyKind::Left,
        });
        self.registry
            .replace_root(frame.root, apply, &mut self.cells)?;
        frame.root = apply;

        let kind = if single {
            MarkerKind::Single
        } else {
            MarkerKind::First
        };
        let mut item = MappedValue::Marker {
            kind,
            inner: Box::new(sub.item.shift(left_width)),
        };
        if or_default {
            item = MappedValue::Marker {
                kind: MarkerKind::Default,
                inner: Box::new(item),
            };
        }
        Ok(Spaced::current(item))
    }

    /// Quantifier in scalar position inside a lambda body.
    pub(crate) fn nested_predicate(
        &mut self,
        op: &QueryOp,
        source: ExprId,
        args: &[ExprId],
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<ScalarExpr, TranslateError> {
        match op {
            QueryOp::Any => {
                let sub = self.translate_node(source, state.nested())?;
                let mut inner = Frame { root: sub.root };
                if let Some(lambda) = args.first().copied() {
                    self.predicate_filter(lambda, &sub, &mut inner, false, state)?;
                }
                let count = self.graft_count(inner.root, frame)?;
                Ok(ScalarExpr::binary(
                    ScalarOp::Gt,
                    count,
                    ScalarExpr::Literal(Value::Int(0)),
                ))
            }
            QueryOp::All => {
                let sub = self.translate_node(source, state.nested())?;
                let mut inner = Frame { root: sub.root };
                self.predicate_filter(arg(args, 0)?, &sub, &mut inner, true, state)?;
                let count = self.graft_count(inner.root, frame)?;
                Ok(ScalarExpr::binary(
                    ScalarOp::Eq,
                    count,
                    ScalarExpr::Literal(Value::Int(0)),
                ))
            }
            QueryOp::Contains => {
                // The sought value lives in the enclosing row space; its
                // column reads cross into the sub-plan through the cell.
                let operand = self.build_operand(arg(args, 0)?, frame, state)?;
                let cell = self.cells.cell_for(frame.root);
                let outer_parts = operand
                    .into_parts()
                    .into_iter()
                    .map(|part| to_outer(&part, cell))
                    .collect::<Vec<_>>();

                let sub = self.translate_node(source, state.nested())?;
                let item_operand = operand_of(&Spaced::current(sub.item.clone()))?;
                let predicate = membership_test(item_operand.into_parts(), outer_parts)?;
                let filter = self.arena.alloc(RelNode::Filter {
                    input: sub.root,
                    predicate,
                });
                let count = self.graft_count(filter, frame)?;
                Ok(ScalarExpr::binary(
                    ScalarOp::Gt,
                    count,
                    ScalarExpr::Literal(Value::Int(0)),
                ))
            }
            other => unreachable!("{other:?} dispatched as a quantifier"),
        }
    }

    /// Bind a one-parameter predicate and narrow the frame to matching
    /// rows.
    pub(crate) fn predicate_filter(
        &mut self,
        lambda: ExprId,
        element: &Projection,
        frame: &mut Frame,
        negate: bool,
        state: TranslatorState,
    ) -> Result<(), TranslateError> {
        let (params, body) = self.lambda_parts(lambda, 1)?;
        let bound = element.clone().with_root(frame.root);
        let mut predicate = self.with_binding(params[0], bound, |this| {
            this.visit_scalar(body, frame, state.nested())
        })?;
        if negate {
            predicate = ScalarExpr::negate(predicate);
        }
        let filter = self.arena.alloc(RelNode::Filter {
            input: frame.root,
            predicate,
        });
        frame.root = filter;
        Ok(())
    }

    /// Graft a one-row count of `input` beside the current row.
    fn graft_count(
        &mut self,
        input: NodeId,
        frame: &mut Frame,
    ) -> Result<ScalarExpr, TranslateError> {
        let aggregate = self.arena.alloc(RelNode::Aggregate {
            input,
            group: Vec::new(),
            aggregates: vec![AggregateColumn {
                func: AggregateFunc::Count,
                column: None,
            }],
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
}

/// Pairwise equality between an element's parts and the sought value's
/// parts.
fn membership_test(
    item: Vec<ScalarExpr>,
    sought: Vec<ScalarExpr>,
) -> Result<ScalarExpr, TranslateError> {
    if item.len() != sought.len() {
        return Err(TranslateError::model(
            ErrorOrigin::Translate,
            format!(
                "membership test pairs {} parts with {}",
                item.len(),
                sought.len()
            ),
        ));
    }
    Ok(ScalarExpr::and_all(
        item.into_iter()
            .zip(sought)
            .map(|(left, right)| ScalarExpr::eq(left, right))
            .collect(),
    ))
}

/// Rewrite current-row column reads into outer reads through `cell`.
fn to_outer(expr: &ScalarExpr, cell: ApplyCellId) -> ScalarExpr {
    match expr {
        ScalarExpr::Column(offset) => ScalarExpr::Outer {
            cell,
            column: *offset,
        },
        ScalarExpr::Literal(_) | ScalarExpr::Param(_) | ScalarExpr::Outer { .. } => expr.clone(),
        ScalarExpr::IsNull(inner) => ScalarExpr::IsNull(Box::new(to_outer(inner, cell))),
        ScalarExpr::Not(inner) => ScalarExpr::Not(Box::new(to_outer(inner, cell))),
        ScalarExpr::Neg(inner) => ScalarExpr::Neg(Box::new(to_outer(inner, cell))),
        ScalarExpr::Binary { op, left, right } => ScalarExpr::Binary {
            op: *op,
            left: Box::new(to_outer(left, cell)),
            right: Box::new(to_outer(right, cell)),
        },
        ScalarExpr::Cond {
            test,
            then,
            otherwise,
        } => ScalarExpr::Cond {
            test: Box::new(to_outer(test, cell)),
            then: Box::new(to_outer(then, cell)),
            otherwise: Box::new(to_outer(otherwise, cell)),
        },
    }
}
