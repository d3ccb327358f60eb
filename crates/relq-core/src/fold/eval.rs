//! Evaluation of foldable sub-graphs. Pure and idempotent: no
//! observable side effects, so folding twice yields the same value.

use crate::{
    catalog::{Catalog, FieldKind},
    error::{ErrorOrigin, TranslateError},
    graph::{BinaryOp, ExprId, ExprNode, QueryGraph, UnaryOp},
    value::{Captured, Value},
};
use std::cmp::Ordering;

/// Evaluate a foldable subtree against the captured environment.
pub fn evaluate(
    graph: &QueryGraph,
    catalog: &Catalog,
    id: ExprId,
    env: &[Captured],
) -> Result<Captured, TranslateError> {
    match graph.node(id) {
        ExprNode::Literal(value) => Ok(Captured::Scalar(value.clone())),

        ExprNode::Capture { slot } => env.get(*slot).cloned().ok_or_else(|| {
            TranslateError::model(
                ErrorOrigin::Graph,
                format!("capture slot {slot} is outside the supplied environment"),
            )
        }),

        ExprNode::EntityConst { ty, key } => Ok(Captured::Entity {
            ty: ty.clone(),
            key: key.clone(),
        }),

        ExprNode::StructureConst { ty, values } => Ok(Captured::Structure {
            ty: ty.clone(),
            values: values.clone(),
        }),

        ExprNode::Member { base, member } => {
            let base = evaluate(graph, catalog, *base, env)?;
            member_read(catalog, base, member)
        }

        ExprNode::Unary { op, expr } => {
            let value = scalar(evaluate(graph, catalog, *expr, env)?)?;
            unary(*op, value)
        }

        ExprNode::Binary { op, left, right } => {
            let left = scalar(evaluate(graph, catalog, *left, env)?)?;
            let right = scalar(evaluate(graph, catalog, *right, env)?)?;
            binary(*op, left, right).map(Captured::Scalar)
        }

        ExprNode::Cond {
            test,
            then,
            otherwise,
        } => {
            let test = scalar(evaluate(graph, catalog, *test, env)?)?;
            match test {
                Value::Bool(true) => evaluate(graph, catalog, *then, env),
                Value::Bool(false) | Value::Null => evaluate(graph, catalog, *otherwise, env),
                other => Err(eval_error(format!(
                    "conditional test evaluated to non-boolean {other:?}"
                ))),
            }
        }

        ExprNode::Construct { bindings, .. } => {
            let mut members = Vec::with_capacity(bindings.len());
            for (_, expr) in bindings {
                members.push(evaluate(graph, catalog, *expr, env)?);
            }
            Ok(Captured::Seq(members))
        }

        ExprNode::Param { .. }
        | ExprNode::Lambda { .. }
        | ExprNode::Source { .. }
        | ExprNode::LocalSeq { .. }
        | ExprNode::ValueOf { .. }
        | ExprNode::Apply { .. } => Err(TranslateError::invariant(
            ErrorOrigin::Translate,
            "evaluate called on a non-foldable node",
        )),
    }
}

fn member_read(
    catalog: &Catalog,
    base: Captured,
    member: &str,
) -> Result<Captured, TranslateError> {
    match base {
        Captured::Structure { ty, values } => {
            let model = catalog.ty(&ty)?;
            let mut position = 0usize;
            for field in &model.fields {
                let width = catalog.field_width(&field.kind)?;
                if field.name == member {
                    let slice = values
                        .get(position..position + width)
                        .ok_or_else(|| {
                            eval_error(format!(
                                "captured structure '{ty}' is narrower than its declared layout"
                            ))
                        })?
                        .to_vec();
                    return Ok(match &field.kind {
                        FieldKind::Scalar(_) => {
                            Captured::Scalar(slice.into_iter().next().unwrap_or(Value::Null))
                        }
                        FieldKind::Structure { target } => Captured::Structure {
                            ty: target.clone(),
                            values: slice,
                        },
                        FieldKind::Ref { target } => Captured::Entity {
                            ty: target.clone(),
                            key: slice,
                        },
                        FieldKind::Collection { .. } => {
                            return Err(eval_error(format!(
                                "collection field '{member}' cannot be captured by value"
                            )));
                        }
                    });
                }
                position += width;
            }
            Err(TranslateError::unknown_field(&ty, member))
        }
        Captured::Entity { ty, key } => {
            let model = catalog.ty(&ty)?;
            let index = model
                .key_fields
                .iter()
                .position(|field| field == member)
                .ok_or_else(|| {
                    TranslateError::unsupported(
                        ErrorOrigin::Graph,
                        format!(
                            "non-key field '{member}' of captured entity '{ty}' is not evaluable"
                        ),
                    )
                })?;
            Ok(Captured::Scalar(key.get(index).cloned().unwrap_or(Value::Null)))
        }
        Captured::Scalar(value) => Err(eval_error(format!(
            "member '{member}' read on scalar {value:?}"
        ))),
        Captured::Seq(_) => Err(eval_error(format!(
            "member '{member}' read on a captured sequence"
        ))),
    }
}

fn scalar(captured: Captured) -> Result<Value, TranslateError> {
    captured
        .into_scalar()
        .ok_or_else(|| eval_error("expected a scalar operand"))
}

fn unary(op: UnaryOp, value: Value) -> Result<Captured, TranslateError> {
    let out = match (op, value) {
        (_, Value::Null) => Value::Null,
        (UnaryOp::Not, Value::Bool(v)) => Value::Bool(!v),
        (UnaryOp::Neg, Value::Int(v)) => Value::Int(-v),
        (UnaryOp::Neg, Value::Float(v)) => Value::Float(-v),
        (op, value) => {
            return Err(eval_error(format!("{op:?} is not applicable to {value:?}")));
        }
    };
    Ok(Captured::Scalar(out))
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, TranslateError> {
    if op.is_comparison() {
        return compare(op, &left, &right);
    }
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    match op {
        BinaryOp::And | BinaryOp::Or => match (left, right) {
            (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(if op == BinaryOp::And {
                l && r
            } else {
                l || r
            })),
            (l, r) => Err(eval_error(format!("{op:?} over non-booleans {l:?}, {r:?}"))),
        },
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, left, right)
        }
        _ => unreachable!("comparisons handled above"),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, TranslateError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let out = match op {
        BinaryOp::Eq => left.compare_eq(right).unwrap_or(false),
        BinaryOp::Ne => !left.compare_eq(right).unwrap_or(true),
        BinaryOp::Lt => left.order_cmp(right) == Ordering::Less,
        BinaryOp::Le => left.order_cmp(right) != Ordering::Greater,
        BinaryOp::Gt => left.order_cmp(right) == Ordering::Greater,
        BinaryOp::Ge => left.order_cmp(right) != Ordering::Less,
        _ => unreachable!("non-comparison operator"),
    };
    Ok(Value::Bool(out))
}

fn arithmetic(op: BinaryOp, left: Value, right: Value) -> Result<Value, TranslateError> {
    match (left, right) {
        (Value::Int(l), Value::Int(r)) => int_arithmetic(op, l, r),
        (Value::Uint(l), Value::Uint(r)) => {
            let (l, r) = (int_from_uint(l)?, int_from_uint(r)?);
            int_arithmetic(op, l, r)
        }
        (Value::Float(l), Value::Float(r)) => Ok(Value::Float(match op {
            BinaryOp::Add => l + r,
            BinaryOp::Sub => l - r,
            BinaryOp::Mul => l * r,
            BinaryOp::Div => l / r,
            BinaryOp::Rem => l % r,
            _ => unreachable!("non-arithmetic operator"),
        })),
        (Value::Text(l), Value::Text(r)) if op == BinaryOp::Add => Ok(Value::Text(l + &r)),
        (l, r) => Err(eval_error(format!("{op:?} over mismatched {l:?}, {r:?}"))),
    }
}

fn int_arithmetic(op: BinaryOp, l: i64, r: i64) -> Result<Value, TranslateError> {
    let out = match op {
        BinaryOp::Add => l.checked_add(r),
        BinaryOp::Sub => l.checked_sub(r),
        BinaryOp::Mul => l.checked_mul(r),
        BinaryOp::Div => l.checked_div(r),
        BinaryOp::Rem => l.checked_rem(r),
        _ => unreachable!("non-arithmetic operator"),
    };
    out.map(Value::Int)
        .ok_or_else(|| eval_error(format!("integer {op:?} overflowed or divided by zero")))
}

fn int_from_uint(value: u64) -> Result<i64, TranslateError> {
    i64::try_from(value).map_err(|_| eval_error("unsigned value exceeds evaluable range"))
}

fn eval_error(message: impl Into<String>) -> TranslateError {
    TranslateError::unsupported(
        ErrorOrigin::Graph,
        format!("constant evaluation failed: {}", message.into()),
    )
}
