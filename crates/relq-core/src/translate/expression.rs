//! Scalar and value visitors over lambda bodies: member navigation,
//! implicit joins, and nested-query grafting.

use super::{Translator, TranslatorState, projection::Projection};
use crate::{
    error::{ErrorOrigin, TranslateError},
    fold::{Classified, ParamKind, classify},
    graph::{BinaryOp, ConstructTarget, ExprId, ExprNode, UnaryOp},
    mapped::MappedValue,
    plan::{ApplyCellId, JoinKind, LocalShape, NodeId, RelNode, ScalarExpr, ScalarOp},
    query::BindingShape,
    value::ScalarKind,
};

///
/// Frame
///
/// The plan node whose row space column reads currently address.
/// Implicit joins rewrite it as they widen the row.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct Frame {
    pub root: NodeId,
}

///
/// Spaced
///
/// A mapped value together with the row space its offsets address:
/// the current frame, or an enclosing row reached through a cell.
///

#[derive(Clone, Debug)]
pub(crate) struct Spaced {
    pub value: MappedValue,
    pub cell: Option<ApplyCellId>,
}

impl Spaced {
    pub(crate) fn current(value: MappedValue) -> Self {
        Self { value, cell: None }
    }

    /// Column read expression for an offset in this value's space.
    pub(crate) fn read(&self, offset: usize) -> ScalarExpr {
        match self.cell {
            None => ScalarExpr::Column(offset),
            Some(cell) => ScalarExpr::Outer {
                cell,
                column: offset,
            },
        }
    }

    /// Scalar expression, if the value maps exactly one column.
    pub(crate) fn as_scalar(&self) -> Option<ScalarExpr> {
        self.value.as_column().map(|(offset, _, _)| self.read(offset))
    }

    fn with_value(&self, value: MappedValue) -> Self {
        Self {
            value,
            cell: self.cell,
        }
    }
}

impl Translator<'_> {
    /// Visit a scalar-valued expression in the frame's row space.
    pub(crate) fn visit_scalar(
        &mut self,
        id: ExprId,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<ScalarExpr, TranslateError> {
        if self.folds.contains(id) {
            return self.fold_scalar(id);
        }

        match self.graph.node(id) {
            ExprNode::Param { .. }
            | ExprNode::Member { .. }
            | ExprNode::ValueOf { .. }
            | ExprNode::Construct { .. } => {
                let spaced = self.visit_value(id, frame, state)?;
                spaced.as_scalar().ok_or_else(|| {
                    TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        format!("{} used in scalar position", spaced.value.describe()),
                    )
                })
            }

            ExprNode::Unary { op, expr } => {
                let inner = self.visit_scalar(*expr, frame, state)?;
                Ok(match op {
                    UnaryOp::Not => ScalarExpr::negate(inner),
                    UnaryOp::Neg => ScalarExpr::Neg(Box::new(inner)),
                })
            }

            ExprNode::Binary { op, left, right } => {
                let (op, left, right) = (*op, *left, *right);
                if matches!(op, BinaryOp::Eq | BinaryOp::Ne) {
                    return self.compare_equality(op, left, right, frame, state);
                }
                let left = self.visit_scalar(left, frame, state)?;
                let right = self.visit_scalar(right, frame, state)?;
                Ok(ScalarExpr::binary(scalar_op(op), left, right))
            }

            ExprNode::Cond {
                test,
                then,
                otherwise,
            } => {
                let (test, then, otherwise) = (*test, *then, *otherwise);
                let test = self.visit_scalar(test, frame, state)?;
                let then = self.visit_scalar(then, frame, state)?;
                let otherwise = self.visit_scalar(otherwise, frame, state)?;
                Ok(ScalarExpr::Cond {
                    test: Box::new(test),
                    then: Box::new(then),
                    otherwise: Box::new(otherwise),
                })
            }

            ExprNode::Apply { op, source, args } => {
                let (op, source, args) = (op.clone(), *source, args.clone());
                if op.is_aggregate() {
                    return self.nested_aggregate(&op, source, &args, frame, state);
                }
                if op.is_predicate_fold() {
                    return self.nested_predicate(&op, source, &args, frame, state);
                }
                let spaced = self.visit_value(id, frame, state)?;
                spaced.as_scalar().ok_or_else(|| {
                    TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        "sequence-valued operator in scalar position",
                    )
                })
            }

            _ => Err(self.fail_at(
                id,
                TranslateError::unsupported(
                    ErrorOrigin::Translate,
                    "expression has no scalar translation",
                ),
            )),
        }
    }

    /// Fold or defer a data-independent scalar subtree.
    pub(crate) fn fold_scalar(&mut self, id: ExprId) -> Result<ScalarExpr, TranslateError> {
        match classify(self.graph, self.catalog, id)? {
            Classified::Constant(value) => Ok(ScalarExpr::Literal(value)),
            Classified::Parameter(ParamKind::Capture) => {
                let binding = self.captures.allocate(id, BindingShape::Scalar);
                Ok(ScalarExpr::Param(binding))
            }
            Classified::Parameter(kind) => Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("captured {kind:?} value used in scalar position"),
            )),
        }
    }

    /// Visit a value-shaped expression in the frame's row space.
    pub(crate) fn visit_value(
        &mut self,
        id: ExprId,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<Spaced, TranslateError> {
        match self.graph.node(id) {
            ExprNode::Param { .. } => {
                let projection = self.registry.get(id)?.clone();
                if projection.root == frame.root {
                    Ok(Spaced::current(projection.item))
                } else {
                    let cell = self.cells.cell_for(projection.root);
                    Ok(Spaced {
                        value: projection.item,
                        cell: Some(cell),
                    })
                }
            }

            ExprNode::Member { base, member } => {
                let (base, member) = (*base, member.clone());
                let spaced = self.visit_value(base, frame, state)?;
                self.member_on(spaced, &member, frame)
            }

            // Null unwrap keeps the mapping; nullability stays on the
            // column and the plan decides row fate.
            ExprNode::ValueOf { base } => self.visit_value(*base, frame, state),

            ExprNode::Construct { target, bindings } => {
                let (target, bindings) = (target.clone(), bindings.clone());
                let mut members = Vec::with_capacity(bindings.len());
                for (name, expr) in bindings {
                    let member = self.visit_member_value(expr, &name, frame, state)?;
                    members.push((name, member));
                }
                Ok(Spaced::current(MappedValue::Constructor { target, members }))
            }

            ExprNode::Apply { op, source, args } => {
                let (op, source, args) = (op.clone(), *source, args.clone());
                match op {
                    op if op.is_aggregate() => {
                        let expr = self.nested_aggregate(&op, source, &args, frame, state)?;
                        let value = self.ensure_column(frame, "agg", expr)?;
                        Ok(Spaced::current(value))
                    }
                    op if op.is_predicate_fold() => {
                        let expr = self.nested_predicate(&op, source, &args, frame, state)?;
                        let value = self.ensure_column(frame, "cond", expr)?;
                        Ok(Spaced::current(value))
                    }
                    crate::graph::QueryOp::First { or_default } => {
                        self.nested_element(source, &args, or_default, false, frame, state)
                    }
                    crate::graph::QueryOp::Single { or_default } => {
                        self.nested_element(source, &args, or_default, true, frame, state)
                    }
                    _ => {
                        // Whole nested sequence: stays lazy behind a cell.
                        let cell = self.cells.cell_for(frame.root);
                        let projection = self.translate_node(id, state.nested())?;
                        Ok(Spaced::current(MappedValue::Subquery {
                            projection: Box::new(projection),
                            cell,
                        }))
                    }
                }
            }

            // Anything data-independent lands in a computed column.
            _ => {
                let expr = self.visit_scalar(id, frame, state)?;
                let value = self.ensure_column(frame, "value", expr)?;
                Ok(Spaced::current(value))
            }
        }
    }

    /// Visit one constructor member; scalar expressions become computed
    /// columns so the result is always a mapping.
    fn visit_member_value(
        &mut self,
        id: ExprId,
        name: &str,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<MappedValue, TranslateError> {
        let spaced = self.visit_value(id, frame, state)?;
        match spaced.cell {
            None => Ok(spaced.value),
            // An enclosing-row value inside an item must be copied into
            // this row space; only scalars can be.
            Some(_) => {
                let expr = spaced.as_scalar().ok_or_else(|| {
                    TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        format!("enclosing-row {} in projected item", spaced.value.describe()),
                    )
                })?;
                Ok(self.ensure_column(frame, name, expr)?)
            }
        }
    }

    /// Resolve one member read on a mapped value.
    pub(crate) fn member_on(
        &mut self,
        spaced: Spaced,
        member: &str,
        frame: &mut Frame,
    ) -> Result<Spaced, TranslateError> {
        let value = spaced.value.strip_markers().clone();
        match value {
            MappedValue::Structure { ty, fields } => {
                if let Some((_, field)) = fields.iter().find(|(name, _)| name == member) {
                    return Ok(spaced.with_value(field.clone()));
                }
                self.compiled_member(&spaced, &ty, member, frame)
            }

            MappedValue::Constructor { members, .. } => members
                .iter()
                .find(|(name, _)| name == member)
                .map(|(_, value)| spaced.with_value(value.clone()))
                .ok_or_else(|| {
                    TranslateError::model(
                        ErrorOrigin::Graph,
                        format!("composite has no member '{member}'"),
                    )
                }),

            MappedValue::Key { ref ty, ref columns } => {
                let index = self.key_index(ty, member)?;
                Ok(spaced.with_value(columns[index].clone()))
            }

            MappedValue::EntityRef {
                ref ty,
                ref key,
                ref fields,
                ..
            } => {
                if let Some((_, field)) = fields.iter().find(|(name, _)| name == member) {
                    return Ok(spaced.with_value(field.clone()));
                }
                if let Ok(index) = self.key_index(ty, member)
                    && let MappedValue::Key { columns, .. } = key.strip_markers()
                {
                    return Ok(spaced.with_value(columns[index].clone()));
                }
                if self.catalog.field(ty, member).is_ok() {
                    // Stored on the referenced row: pull it in with an
                    // implicit join and retry against the full item.
                    if spaced.cell.is_some() {
                        return Err(TranslateError::unsupported(
                            ErrorOrigin::Translate,
                            format!(
                                "navigation through reference '{member}' of an enclosing row"
                            ),
                        ));
                    }
                    let joined = self.auto_join(&spaced.value, frame)?;
                    return self.member_on(Spaced::current(joined), member, frame);
                }
                self.compiled_member(&spaced, ty, member, frame)
            }

            MappedValue::Grouping { ref key, .. } => {
                if member == "key" {
                    Ok(spaced.with_value((**key).clone()))
                } else {
                    Err(TranslateError::model(
                        ErrorOrigin::Graph,
                        format!("group has no member '{member}'; only 'key'"),
                    ))
                }
            }

            MappedValue::Column { .. } => Err(TranslateError::model(
                ErrorOrigin::Graph,
                format!("member '{member}' read on a scalar column"),
            )),

            MappedValue::CollectionRef { element, .. } => Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("member '{member}' read on a collection of '{element}'"),
            )),

            MappedValue::Subquery { .. } => Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("member '{member}' read on a subquery"),
            )),

            MappedValue::Marker { .. } => unreachable!("markers are stripped above"),
        }
    }

    fn compiled_member(
        &mut self,
        spaced: &Spaced,
        ty: &str,
        member: &str,
        frame: &mut Frame,
    ) -> Result<Spaced, TranslateError> {
        let Some(compiler) = self.compilers.lookup(ty, member) else {
            return Err(TranslateError::unknown_field(ty, member));
        };
        if spaced.cell.is_some() {
            return Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                format!("computed member '{member}' over an enclosing row"),
            ));
        }
        let expr = compiler(&spaced.value)?;
        let value = self.ensure_column(frame, member, expr)?;
        Ok(Spaced::current(value))
    }

    /// Join the referenced entity's row into the current frame and
    /// return its full item mapping.
    fn auto_join(
        &mut self,
        reference: &MappedValue,
        frame: &mut Frame,
    ) -> Result<MappedValue, TranslateError> {
        let MappedValue::EntityRef { ty, key, .. } = reference.strip_markers() else {
            return Err(TranslateError::invariant(
                ErrorOrigin::Translate,
                format!("implicit join over {}", reference.describe()),
            ));
        };
        let ty = ty.clone();
        let left_width = self.arena.width(frame.root);

        let columns = self.catalog.layout(&ty)?;
        let right = self.arena.alloc(RelNode::Source {
            ty: ty.clone(),
            columns,
        });

        // Target key columns lead its layout; pair them with the inline
        // reference key.
        let ref_offsets = key_column_offsets(key)?;
        let key_width = self.catalog.key_width(&ty)?;
        if ref_offsets.len() != key_width {
            return Err(TranslateError::invariant(
                ErrorOrigin::Translate,
                format!(
                    "reference to '{ty}' carries {} key parts, expected {key_width}",
                    ref_offsets.len()
                ),
            ));
        }
        let condition = ScalarExpr::and_all(
            ref_offsets
                .iter()
                .enumerate()
                .map(|(i, offset)| {
                    ScalarExpr::eq(
                        ScalarExpr::Column(*offset),
                        ScalarExpr::Column(left_width + i),
                    )
                })
                .collect(),
        );

        // References may be unset, so the joined row must survive null.
        let join = self.arena.alloc(RelNode::Join {
            left: frame.root,
            right,
            kind: JoinKind::LeftOuter,
            condition,
        });
        self.registry.replace_root(frame.root, join, &mut self.cells)?;
        frame.root = join;

        crate::mapped::entity_item(self.catalog, &ty, left_width)
    }

    /// Sequence-position member read: navigation to a dependent
    /// collection, translated into a correlated sub-plan.
    pub(crate) fn translate_navigation(
        &mut self,
        id: ExprId,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let anchor = self.anchor_root(id)?;
        let mut frame = Frame { root: anchor };
        let spaced = self.visit_value(id, &mut frame, state)?;

        let MappedValue::CollectionRef {
            element,
            via,
            owner_key,
        } = spaced.value.strip_markers().clone()
        else {
            return Err(self.fail_at(
                id,
                TranslateError::unsupported(
                    ErrorOrigin::Translate,
                    format!("{} is not a queryable sequence", spaced.value.describe()),
                ),
            ));
        };

        let cell = self.cells.cell_for(frame.root);
        let columns = self.catalog.layout(&element)?;
        let source = self.arena.alloc(RelNode::Source {
            ty: element.clone(),
            columns,
        });
        let item = crate::mapped::entity_item(self.catalog, &element, 0)?;

        // The element's back-reference equals the owner's key.
        let via_value = self.member_on(Spaced::current(item.clone()), &via, &mut Frame { root: source })?;
        let via_offsets = key_column_offsets_of(&via_value.value)?;
        let owner_offsets = key_column_offsets_of(&owner_key)?;
        if via_offsets.len() != owner_offsets.len() {
            return Err(TranslateError::invariant(
                ErrorOrigin::Translate,
                format!(
                    "collection '{via}' pairs {} key parts with {}",
                    via_offsets.len(),
                    owner_offsets.len()
                ),
            ));
        }
        let predicate = ScalarExpr::and_all(
            via_offsets
                .iter()
                .zip(&owner_offsets)
                .map(|(inner, outer)| {
                    ScalarExpr::eq(
                        ScalarExpr::Column(*inner),
                        ScalarExpr::Outer {
                            cell,
                            column: *outer,
                        },
                    )
                })
                .collect(),
        );
        let filter = self.arena.alloc(RelNode::Filter {
            input: source,
            predicate,
        });

        Ok(Projection::sequence(filter, item))
    }

    /// Plan root anchoring a value expression: the binding of the first
    /// parameter underneath it.
    fn anchor_root(&self, id: ExprId) -> Result<NodeId, TranslateError> {
        let mut current = id;
        loop {
            match self.graph.node(current) {
                ExprNode::Param { .. } => return Ok(self.registry.get(current)?.root),
                ExprNode::Member { base, .. } | ExprNode::ValueOf { base } => current = *base,
                _ => {
                    return Err(TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        "navigation is not anchored on a lambda parameter",
                    ));
                }
            }
        }
    }

    /// Append a computed column for `expr` and return its mapping.
    pub(crate) fn ensure_column(
        &mut self,
        frame: &mut Frame,
        name: &str,
        expr: ScalarExpr,
    ) -> Result<MappedValue, TranslateError> {
        if let ScalarExpr::Column(offset) = expr {
            let (kind, nullable) = self.column_kind(frame.root, offset);
            return Ok(MappedValue::column(offset, kind, nullable));
        }
        let offset = self.arena.width(frame.root);
        let kind = infer_kind(&expr);
        let calc = self.arena.alloc(RelNode::Calc {
            input: frame.root,
            columns: vec![(name.to_string(), expr)],
        });
        self.registry.replace_root(frame.root, calc, &mut self.cells)?;
        frame.root = calc;
        Ok(MappedValue::column(offset, kind, true))
    }

    /// Best-effort scalar kind for a plan column.
    pub(crate) fn column_kind(&self, node: NodeId, offset: usize) -> (ScalarKind, bool) {
        match self.arena.node(node) {
            RelNode::Source { columns, .. } => columns
                .get(offset)
                .map_or((ScalarKind::Int, true), |col| (col.kind, col.nullable)),
            RelNode::Local { layout, .. } => layout
                .get(offset)
                .map_or((ScalarKind::Int, true), |col| (col.kind, col.nullable)),
            RelNode::Filter { input, .. }
            | RelNode::Sort { input, .. }
            | RelNode::Take { input, .. }
            | RelNode::Skip { input, .. }
            | RelNode::Distinct { input } => self.column_kind(*input, offset),
            RelNode::Calc { input, columns } => {
                let width = self.arena.width(*input);
                if offset < width {
                    self.column_kind(*input, offset)
                } else {
                    columns
                        .get(offset - width)
                        .map_or((ScalarKind::Int, true), |(_, expr)| (infer_kind(expr), true))
                }
            }
            RelNode::Project { input, columns } => match columns.get(offset) {
                Some(ScalarExpr::Column(inner)) => self.column_kind(*input, *inner),
                Some(expr) => (infer_kind(expr), true),
                None => (ScalarKind::Int, true),
            },
            RelNode::Join { left, right, .. } | RelNode::Apply { left, right, .. } => {
                let width = self.arena.width(*left);
                if offset < width {
                    self.column_kind(*left, offset)
                } else {
                    // Right-side rows may be padded with nulls.
                    let (kind, _) = self.column_kind(*right, offset - width);
                    (kind, true)
                }
            }
            RelNode::Aggregate { input, group, .. } => group
                .get(offset)
                .map_or((ScalarKind::Int, true), |col| self.column_kind(*input, *col)),
            RelNode::SetOp { left, .. } => self.column_kind(*left, offset),
        }
    }

    fn key_index(&self, ty: &str, member: &str) -> Result<usize, TranslateError> {
        self.catalog
            .ty(ty)?
            .key_fields
            .iter()
            .position(|field| field == member)
            .ok_or_else(|| TranslateError::unknown_field(ty, member))
    }

    /// Item mapping for a local-source row.
    pub(crate) fn local_item(
        &self,
        layout: &[crate::catalog::ColumnInfo],
        shape: &LocalShape,
    ) -> Result<MappedValue, TranslateError> {
        fn build(
            layout: &[crate::catalog::ColumnInfo],
            shape: &LocalShape,
            cursor: &mut usize,
        ) -> MappedValue {
            match shape {
                LocalShape::Scalar => {
                    let col = &layout[*cursor];
                    let value = MappedValue::column(*cursor, col.kind, col.nullable);
                    *cursor += 1;
                    value
                }
                LocalShape::Key { ty, width } => {
                    let columns = (0..*width)
                        .map(|i| {
                            let col = &layout[*cursor + i];
                            MappedValue::column(*cursor + i, col.kind, col.nullable)
                        })
                        .collect();
                    *cursor += width;
                    MappedValue::Key {
                        ty: ty.clone(),
                        columns,
                    }
                }
                LocalShape::Fields(fields) => {
                    let members = fields
                        .iter()
                        .map(|(name, field)| (name.clone(), build(layout, field, cursor)))
                        .collect();
                    MappedValue::Constructor {
                        target: ConstructTarget::Anonymous,
                        members,
                    }
                }
            }
        }

        if layout.len() != shape.width() {
            return Err(TranslateError::invariant(
                ErrorOrigin::Local,
                "local layout width disagrees with its shape",
            ));
        }
        let mut cursor = 0;
        Ok(build(layout, shape, &mut cursor))
    }
}

/// Offsets of a key mapping's columns.
pub(crate) fn key_column_offsets(key: &MappedValue) -> Result<Vec<usize>, TranslateError> {
    key_column_offsets_of(key)
}

pub(crate) fn key_column_offsets_of(value: &MappedValue) -> Result<Vec<usize>, TranslateError> {
    match value.strip_markers() {
        MappedValue::Column { offset, .. } => Ok(vec![*offset]),
        MappedValue::Key { columns, .. } => columns
            .iter()
            .map(|col| {
                col.as_column().map(|(offset, _, _)| offset).ok_or_else(|| {
                    TranslateError::invariant(
                        ErrorOrigin::Translate,
                        format!("key part mapped as {}", col.describe()),
                    )
                })
            })
            .collect(),
        MappedValue::EntityRef { key, .. } => key_column_offsets_of(key),
        other => Err(TranslateError::invariant(
            ErrorOrigin::Translate,
            format!("expected a key mapping, found {}", other.describe()),
        )),
    }
}

pub(crate) const fn scalar_op(op: BinaryOp) -> ScalarOp {
    match op {
        BinaryOp::Add => ScalarOp::Add,
        BinaryOp::Sub => ScalarOp::Sub,
        BinaryOp::Mul => ScalarOp::Mul,
        BinaryOp::Div => ScalarOp::Div,
        BinaryOp::Rem => ScalarOp::Rem,
        BinaryOp::And => ScalarOp::And,
        BinaryOp::Or => ScalarOp::Or,
        BinaryOp::Eq => ScalarOp::Eq,
        BinaryOp::Ne => ScalarOp::Ne,
        BinaryOp::Lt => ScalarOp::Lt,
        BinaryOp::Le => ScalarOp::Le,
        BinaryOp::Gt => ScalarOp::Gt,
        BinaryOp::Ge => ScalarOp::Ge,
    }
}

/// Rough static kind of a computed column; used only for mapping
/// metadata, never for plan semantics.
pub(crate) fn infer_kind(expr: &ScalarExpr) -> ScalarKind {
    match expr {
        ScalarExpr::Literal(value) => value.kind().unwrap_or(ScalarKind::Int),
        ScalarExpr::IsNull(_) | ScalarExpr::Not(_) => ScalarKind::Bool,
        ScalarExpr::Neg(inner) => infer_kind(inner),
        ScalarExpr::Binary { op, left, .. } => match op {
            ScalarOp::And
            | ScalarOp::Or
            | ScalarOp::Eq
            | ScalarOp::Ne
            | ScalarOp::Lt
            | ScalarOp::Le
            | ScalarOp::Gt
            | ScalarOp::Ge => ScalarKind::Bool,
            _ => infer_kind(left),
        },
        ScalarExpr::Cond { then, .. } => infer_kind(then),
        ScalarExpr::Column(_) | ScalarExpr::Param(_) | ScalarExpr::Outer { .. } => ScalarKind::Int,
    }
}
