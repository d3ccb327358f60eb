use crate::{
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    plan::{
        AggregateColumn, AggregateFunc, ApplyCellId, ApplyKind, JoinKind, NodeId, RelNode,
        ScalarExpr, ScalarOp, SetOpKind,
    },
    query::{ParamContext, TranslatedQuery},
    value::{Captured, SortDirection, Value},
};
use std::collections::BTreeMap;

///
/// Dataset
/// Named tables of raw rows, keyed by entity type path.
///

#[derive(Debug, Default)]
pub(crate) struct Dataset {
    tables: BTreeMap<String, Vec<Vec<Value>>>,
}

impl Dataset {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_table(mut self, ty: &str, rows: Vec<Vec<Value>>) -> Self {
        self.tables.insert(ty.to_string(), rows);
        self
    }
}

///
/// Executor
/// Evaluates one translated plan against a dataset and an environment.
///

pub(crate) struct Executor<'a> {
    catalog: &'a Catalog,
    dataset: &'a Dataset,
    query: &'a TranslatedQuery,
    env: &'a [Captured],
}

type Cells = BTreeMap<ApplyCellId, Vec<Value>>;

impl<'a> Executor<'a> {
    pub(crate) fn new(
        catalog: &'a Catalog,
        dataset: &'a Dataset,
        query: &'a TranslatedQuery,
        env: &'a [Captured],
    ) -> Self {
        Self {
            catalog,
            dataset,
            query,
            env,
        }
    }

    /// Rows of the plan root, access limits not applied.
    pub(crate) fn rows(&self) -> Result<Vec<Vec<Value>>, TranslateError> {
        self.eval(self.query.root, &Cells::new())
    }

    pub(crate) fn eval(
        &self,
        node: NodeId,
        cells: &Cells,
    ) -> Result<Vec<Vec<Value>>, TranslateError> {
        match self.query.arena.node(node) {
            RelNode::Source { ty, .. } => {
                Ok(self.dataset.tables.get(ty).cloned().unwrap_or_default())
            }

            RelNode::Local { binding, .. } => {
                let ctx = ParamContext::new(self.env);
                self.query.eval_sequence(self.catalog, *binding, &ctx)
            }

            RelNode::Filter { input, predicate } => {
                let mut out = Vec::new();
                for row in self.eval(*input, cells)? {
                    if self.scalar(predicate, &row, cells)? == Value::Bool(true) {
                        out.push(row);
                    }
                }
                Ok(out)
            }

            RelNode::Calc { input, columns } => {
                let mut out = Vec::new();
                for mut row in self.eval(*input, cells)? {
                    for (_, expr) in columns {
                        let value = self.scalar(expr, &row, cells)?;
                        row.push(value);
                    }
                    out.push(row);
                }
                Ok(out)
            }

            RelNode::Project { input, columns } => {
                let mut out = Vec::new();
                for row in self.eval(*input, cells)? {
                    let mut projected = Vec::with_capacity(columns.len());
                    for expr in columns {
                        projected.push(self.scalar(expr, &row, cells)?);
                    }
                    out.push(projected);
                }
                Ok(out)
            }

            RelNode::Join {
                left,
                right,
                kind,
                condition,
            } => {
                let left_rows = self.eval(*left, cells)?;
                let right_rows = self.eval(*right, cells)?;
                let right_width = self.query.arena.width(*right);
                let mut out = Vec::new();
                for l in &left_rows {
                    let mut matched = false;
                    for r in &right_rows {
                        let mut combined = l.clone();
                        combined.extend(r.iter().cloned());
                        if self.scalar(condition, &combined, cells)? == Value::Bool(true) {
                            matched = true;
                            out.push(combined);
                        }
                    }
                    if !matched && *kind == JoinKind::LeftOuter {
                        let mut combined = l.clone();
                        combined.extend(std::iter::repeat_n(Value::Null, right_width));
                        out.push(combined);
                    }
                }
                Ok(out)
            }

            RelNode::Apply {
                left,
                right,
                cell,
                kind,
            } => {
                let left_rows = self.eval(*left, cells)?;
                let right_width = self.query.arena.width(*right);
                let mut out = Vec::new();
                for l in left_rows {
                    let mut bound = cells.clone();
                    bound.insert(*cell, l.clone());
                    let inner = self.eval(*right, &bound)?;
                    if inner.is_empty() && *kind == ApplyKind::Left {
                        let mut combined = l.clone();
                        combined.extend(std::iter::repeat_n(Value::Null, right_width));
                        out.push(combined);
                        continue;
                    }
                    for r in inner {
                        let mut combined = l.clone();
                        combined.extend(r);
                        out.push(combined);
                    }
                }
                Ok(out)
            }

            RelNode::Aggregate {
                input,
                group,
                aggregates,
            } => {
                let rows = self.eval(*input, cells)?;
                Ok(aggregate_rows(&rows, group, aggregates))
            }

            RelNode::Sort { input, keys } => {
                let mut rows = self.eval(*input, cells)?;
                rows.sort_by(|a, b| {
                    for (offset, direction) in keys {
                        let ord = a[*offset].order_cmp(&b[*offset]);
                        let ord = match direction {
                            SortDirection::Asc => ord,
                            SortDirection::Desc => ord.reverse(),
                        };
                        if ord != std::cmp::Ordering::Equal {
                            return ord;
                        }
                    }
                    std::cmp::Ordering::Equal
                });
                Ok(rows)
            }

            RelNode::Take { input, count } => {
                let n = self.count_of(count, cells)?;
                let mut rows = self.eval(*input, cells)?;
                rows.truncate(n);
                Ok(rows)
            }

            RelNode::Skip { input, count } => {
                let n = self.count_of(count, cells)?;
                let rows = self.eval(*input, cells)?;
                Ok(rows.into_iter().skip(n).collect())
            }

            RelNode::Distinct { input } => {
                let mut out: Vec<Vec<Value>> = Vec::new();
                for row in self.eval(*input, cells)? {
                    if !out.iter().any(|seen| row_eq(seen, &row)) {
                        out.push(row);
                    }
                }
                Ok(out)
            }

            RelNode::SetOp { kind, left, right } => {
                let left_rows = self.eval(*left, cells)?;
                let right_rows = self.eval(*right, cells)?;
                Ok(match kind {
                    SetOpKind::Concat => {
                        let mut out = left_rows;
                        out.extend(right_rows);
                        out
                    }
                    SetOpKind::Union => {
                        let mut out: Vec<Vec<Value>> = Vec::new();
                        for row in left_rows.into_iter().chain(right_rows) {
                            if !out.iter().any(|seen| row_eq(seen, &row)) {
                                out.push(row);
                            }
                        }
                        out
                    }
                    SetOpKind::Intersect => {
                        let mut out: Vec<Vec<Value>> = Vec::new();
                        for row in left_rows {
                            if right_rows.iter().any(|r| row_eq(r, &row))
                                && !out.iter().any(|seen| row_eq(seen, &row))
                            {
                                out.push(row);
                            }
                        }
                        out
                    }
                    SetOpKind::Except => {
                        let mut out: Vec<Vec<Value>> = Vec::new();
                        for row in left_rows {
                            if !right_rows.iter().any(|r| row_eq(r, &row))
                                && !out.iter().any(|seen| row_eq(seen, &row))
                            {
                                out.push(row);
                            }
                        }
                        out
                    }
                })
            }
        }
    }

    fn count_of(&self, count: &ScalarExpr, cells: &Cells) -> Result<usize, TranslateError> {
        match self.scalar(count, &[], cells)? {
            Value::Int(n) if n >= 0 => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
            Value::Uint(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
            other => Err(TranslateError::invariant(
                ErrorOrigin::Plan,
                format!("paging count evaluated to {other:?}"),
            )),
        }
    }

    pub(crate) fn scalar(
        &self,
        expr: &ScalarExpr,
        row: &[Value],
        cells: &Cells,
    ) -> Result<Value, TranslateError> {
        match expr {
            ScalarExpr::Column(offset) => row.get(*offset).cloned().ok_or_else(|| {
                TranslateError::invariant(
                    ErrorOrigin::Plan,
                    format!("row has no column #{offset}"),
                )
            }),
            ScalarExpr::Literal(value) => Ok(value.clone()),
            ScalarExpr::Param(binding) => {
                let ctx = ParamContext::new(self.env);
                self.query.eval_binding(self.catalog, *binding, &ctx)
            }
            ScalarExpr::Outer { cell, column } => cells
                .get(cell)
                .and_then(|outer| outer.get(*column))
                .cloned()
                .ok_or_else(|| {
                    TranslateError::invariant(
                        ErrorOrigin::Plan,
                        format!("cell {cell} is unbound or has no column #{column}"),
                    )
                }),
            ScalarExpr::IsNull(inner) => {
                Ok(Value::Bool(self.scalar(inner, row, cells)?.is_null()))
            }
            ScalarExpr::Not(inner) => match self.scalar(inner, row, cells)? {
                Value::Null => Ok(Value::Null),
                Value::Bool(b) => Ok(Value::Bool(!b)),
                other => Err(TranslateError::invariant(
                    ErrorOrigin::Plan,
                    format!("negation of {other:?}"),
                )),
            },
            ScalarExpr::Neg(inner) => match self.scalar(inner, row, cells)? {
                Value::Null => Ok(Value::Null),
                Value::Int(n) => Ok(Value::Int(-n)),
                Value::Float(f) => Ok(Value::Float(-f)),
                other => Err(TranslateError::invariant(
                    ErrorOrigin::Plan,
                    format!("arithmetic negation of {other:?}"),
                )),
            },
            ScalarExpr::Binary { op, left, right } => {
                let left = self.scalar(left, row, cells)?;
                let right = self.scalar(right, row, cells)?;
                binary(*op, &left, &right)
            }
            ScalarExpr::Cond {
                test,
                then,
                otherwise,
            } => {
                if self.scalar(test, row, cells)? == Value::Bool(true) {
                    self.scalar(then, row, cells)
                } else {
                    self.scalar(otherwise, row, cells)
                }
            }
        }
    }
}

fn aggregate_rows(
    rows: &[Vec<Value>],
    group: &[usize],
    aggregates: &[AggregateColumn],
) -> Vec<Vec<Value>> {
    // A global aggregate always yields one row, even over no input.
    if group.is_empty() {
        let mut out = Vec::with_capacity(aggregates.len());
        for agg in aggregates {
            out.push(aggregate_value(agg, rows));
        }
        return vec![out];
    }

    let mut keys: Vec<Vec<Value>> = Vec::new();
    let mut members: Vec<Vec<Vec<Value>>> = Vec::new();
    for row in rows {
        let key: Vec<Value> = group.iter().map(|offset| row[*offset].clone()).collect();
        match keys.iter().position(|seen| row_eq(seen, &key)) {
            Some(index) => members[index].push(row.clone()),
            None => {
                keys.push(key);
                members.push(vec![row.clone()]);
            }
        }
    }
    keys.into_iter()
        .zip(members)
        .map(|(mut key, rows)| {
            for agg in aggregates {
                key.push(aggregate_value(agg, &rows));
            }
            key
        })
        .collect()
}

fn aggregate_value(agg: &AggregateColumn, rows: &[Vec<Value>]) -> Value {
    let values: Vec<Value> = agg.column.map_or_else(Vec::new, |offset| {
        rows.iter()
            .map(|row| row[offset].clone())
            .filter(|value| !value.is_null())
            .collect()
    });
    match agg.func {
        AggregateFunc::Count => Value::Int(i64::try_from(rows.len()).unwrap_or(i64::MAX)),
        AggregateFunc::Sum => sum(&values),
        AggregateFunc::Min => values
            .iter()
            .min_by(|a, b| a.order_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunc::Max => values
            .iter()
            .max_by(|a, b| a.order_cmp(b))
            .cloned()
            .unwrap_or(Value::Null),
        AggregateFunc::Avg => match sum(&values) {
            Value::Null => Value::Null,
            total => {
                #[allow(clippy::cast_precision_loss)]
                let n = values.len() as f64;
                Value::Float(as_float(&total) / n)
            }
        },
    }
}

fn sum(values: &[Value]) -> Value {
    if values.is_empty() {
        return Value::Null;
    }
    if values.iter().any(|value| matches!(value, Value::Float(_))) {
        Value::Float(values.iter().map(as_float).sum())
    } else {
        Value::Int(values.iter().map(as_int).sum())
    }
}

fn as_float(value: &Value) -> f64 {
    match value {
        Value::Float(f) => *f,
        #[allow(clippy::cast_precision_loss)]
        Value::Int(n) => *n as f64,
        #[allow(clippy::cast_precision_loss)]
        Value::Uint(n) => *n as f64,
        _ => 0.0,
    }
}

fn as_int(value: &Value) -> i64 {
    match value {
        Value::Int(n) => *n,
        Value::Uint(n) => i64::try_from(*n).unwrap_or(i64::MAX),
        _ => 0,
    }
}

fn binary(op: ScalarOp, left: &Value, right: &Value) -> Result<Value, TranslateError> {
    match op {
        ScalarOp::And => Ok(kleene_and(left, right)),
        ScalarOp::Or => Ok(kleene_or(left, right)),
        ScalarOp::Eq => Ok(left
            .compare_eq(right)
            .map_or(Value::Null, Value::Bool)),
        ScalarOp::Ne => Ok(left
            .compare_eq(right)
            .map_or(Value::Null, |eq| Value::Bool(!eq))),
        ScalarOp::Lt | ScalarOp::Le | ScalarOp::Gt | ScalarOp::Ge => {
            if left.is_null() || right.is_null() {
                return Ok(Value::Null);
            }
            let ord = left.order_cmp(right);
            Ok(Value::Bool(match op {
                ScalarOp::Lt => ord.is_lt(),
                ScalarOp::Le => ord.is_le(),
                ScalarOp::Gt => ord.is_gt(),
                ScalarOp::Ge => ord.is_ge(),
                _ => unreachable!(),
            }))
        }
        ScalarOp::Add | ScalarOp::Sub | ScalarOp::Mul | ScalarOp::Div | ScalarOp::Rem => {
            arithmetic(op, left, right)
        }
    }
}

fn kleene_and(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Bool(false), _) | (_, Value::Bool(false)) => Value::Bool(false),
        (Value::Bool(true), Value::Bool(true)) => Value::Bool(true),
        _ => Value::Null,
    }
}

fn kleene_or(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Bool(true), _) | (_, Value::Bool(true)) => Value::Bool(true),
        (Value::Bool(false), Value::Bool(false)) => Value::Bool(false),
        _ => Value::Null,
    }
}

fn arithmetic(op: ScalarOp, left: &Value, right: &Value) -> Result<Value, TranslateError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    if let (Value::Text(l), Value::Text(r)) = (left, right)
        && op == ScalarOp::Add
    {
        return Ok(Value::Text(format!("{l}{r}")));
    }
    if matches!(left, Value::Float(_)) || matches!(right, Value::Float(_)) {
        let (l, r) = (as_float(left), as_float(right));
        return Ok(Value::Float(match op {
            ScalarOp::Add => l + r,
            ScalarOp::Sub => l - r,
            ScalarOp::Mul => l * r,
            ScalarOp::Div => l / r,
            ScalarOp::Rem => l % r,
            _ => unreachable!(),
        }));
    }
    let (l, r) = (as_int(left), as_int(right));
    let result = match op {
        ScalarOp::Add => l.checked_add(r),
        ScalarOp::Sub => l.checked_sub(r),
        ScalarOp::Mul => l.checked_mul(r),
        ScalarOp::Div => l.checked_div(r),
        ScalarOp::Rem => l.checked_rem(r),
        _ => unreachable!(),
    };
    result.map(Value::Int).ok_or_else(|| {
        TranslateError::invariant(ErrorOrigin::Plan, format!("integer arithmetic failed: {l} {op:?} {r}"))
    })
}

/// Row equality for grouping, distinct, and set operations: null pairs
/// with null.
pub(crate) fn row_eq(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && left.iter().zip(right).all(|(l, r)| {
            (l.is_null() && r.is_null()) || l.compare_eq(r) == Some(true)
        })
}
