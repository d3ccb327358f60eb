//! Deterministic text rendering of relational plans.

use super::{
    arena::PlanArena,
    node::{AggregateFunc, ApplyKind, JoinKind, NodeId, RelNode, SetOpKind},
    scalar::{ScalarExpr, ScalarOp},
};
use crate::value::{SortDirection, Value};
use std::fmt::Write;

/// Render the plan rooted at `root` as an indented operator tree.
#[must_use]
pub fn explain(arena: &PlanArena, root: NodeId) -> String {
    let mut out = String::new();
    write_node(arena, root, 0, &mut out);
    out
}

fn write_node(arena: &PlanArena, id: NodeId, depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
    match arena.node(id) {
        RelNode::Source { ty, columns } => {
            let _ = writeln!(out, "Source type={ty} cols={}", columns.len());
        }
        RelNode::Local { layout, binding, .. } => {
            let _ = writeln!(out, "Local cols={} binding={binding}", layout.len());
        }
        RelNode::Filter { input, predicate } => {
            let _ = writeln!(out, "Filter {}", render_scalar(predicate));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Calc { input, columns } => {
            let exprs: Vec<String> = columns
                .iter()
                .map(|(name, expr)| format!("{name}={}", render_scalar(expr)))
                .collect();
            let _ = writeln!(out, "Calc [{}]", exprs.join(", "));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Project { input, columns } => {
            let exprs: Vec<String> = columns.iter().map(render_scalar).collect();
            let _ = writeln!(out, "Project [{}]", exprs.join(", "));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Join {
            left,
            right,
            kind,
            condition,
        } => {
            let kind = match kind {
                JoinKind::Inner => "inner",
                JoinKind::LeftOuter => "left",
            };
            let _ = writeln!(out, "Join kind={kind} on {}", render_scalar(condition));
            write_node(arena, *left, depth + 1, out);
            write_node(arena, *right, depth + 1, out);
        }
        RelNode::Apply {
            left,
            right,
            cell,
            kind,
        } => {
            let kind = match kind {
                ApplyKind::Cross => "cross",
                ApplyKind::Left => "left",
            };
            let _ = writeln!(out, "Apply kind={kind} cell={cell}");
            write_node(arena, *left, depth + 1, out);
            write_node(arena, *right, depth + 1, out);
        }
        RelNode::Aggregate {
            input,
            group,
            aggregates,
        } => {
            let aggs: Vec<String> = aggregates
                .iter()
                .map(|agg| {
                    let func = match agg.func {
                        AggregateFunc::Count => "count",
                        AggregateFunc::Sum => "sum",
                        AggregateFunc::Min => "min",
                        AggregateFunc::Max => "max",
                        AggregateFunc::Avg => "avg",
                    };
                    agg.column
                        .map_or_else(|| func.to_string(), |col| format!("{func}({col})"))
                })
                .collect();
            let _ = writeln!(out, "Aggregate group={group:?} aggs=[{}]", aggs.join(", "));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Sort { input, keys } => {
            let keys: Vec<String> = keys
                .iter()
                .map(|(col, dir)| {
                    let dir = match dir {
                        SortDirection::Asc => "asc",
                        SortDirection::Desc => "desc",
                    };
                    format!("{col} {dir}")
                })
                .collect();
            let _ = writeln!(out, "Sort keys=[{}]", keys.join(", "));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Take { input, count } => {
            let _ = writeln!(out, "Take count={}", render_scalar(count));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Skip { input, count } => {
            let _ = writeln!(out, "Skip count={}", render_scalar(count));
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::Distinct { input } => {
            let _ = writeln!(out, "Distinct");
            write_node(arena, *input, depth + 1, out);
        }
        RelNode::SetOp { kind, left, right } => {
            let kind = match kind {
                SetOpKind::Union => "union",
                SetOpKind::Intersect => "intersect",
                SetOpKind::Except => "except",
                SetOpKind::Concat => "concat",
            };
            let _ = writeln!(out, "SetOp kind={kind}");
            write_node(arena, *left, depth + 1, out);
            write_node(arena, *right, depth + 1, out);
        }
    }
}

fn render_scalar(expr: &ScalarExpr) -> String {
    match expr {
        ScalarExpr::Column(offset) => format!("#{offset}"),
        ScalarExpr::Literal(value) => render_value(value),
        ScalarExpr::Param(binding) => format!("${binding}"),
        ScalarExpr::Outer { cell, column } => format!("outer[{cell}]#{column}"),
        ScalarExpr::IsNull(inner) => format!("isnull({})", render_scalar(inner)),
        ScalarExpr::Not(inner) => format!("!{}", render_scalar(inner)),
        ScalarExpr::Neg(inner) => format!("-{}", render_scalar(inner)),
        ScalarExpr::Binary { op, left, right } => {
            let op = match op {
                ScalarOp::Add => "+",
                ScalarOp::Sub => "-",
                ScalarOp::Mul => "*",
                ScalarOp::Div => "/",
                ScalarOp::Rem => "%",
                ScalarOp::And => "&&",
                ScalarOp::Or => "||",
                ScalarOp::Eq => "==",
                ScalarOp::Ne => "!=",
                ScalarOp::Lt => "<",
                ScalarOp::Le => "<=",
                ScalarOp::Gt => ">",
                ScalarOp::Ge => ">=",
            };
            format!("({} {op} {})", render_scalar(left), render_scalar(right))
        }
        ScalarExpr::Cond {
            test,
            then,
            otherwise,
        } => format!(
            "({} ? {} : {})",
            render_scalar(test),
            render_scalar(then),
            render_scalar(otherwise)
        ),
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Uint(v) => format!("{v}u"),
        Value::Float(v) => v.to_string(),
        Value::Text(v) => format!("{v:?}"),
    }
}
