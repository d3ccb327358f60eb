//! Printable rendering of graph nodes for error payloads.

use super::node::{BinaryOp, ExprId, ExprNode, QueryGraph, QueryOp, UnaryOp};
use crate::value::{SortDirection, Value};
use std::fmt::Write;

/// Render one sub-graph as a compact, deterministic expression string.
#[must_use]
pub fn render(graph: &QueryGraph, id: ExprId) -> String {
    let mut out = String::new();
    write_expr(graph, id, &mut out);
    out
}

fn write_expr(graph: &QueryGraph, id: ExprId, out: &mut String) {
    match graph.node(id) {
        ExprNode::Literal(value) => write_value(value, out),
        ExprNode::Capture { slot } => {
            let _ = write!(out, "capture({slot})");
        }
        ExprNode::EntityConst { ty, .. } => {
            let _ = write!(out, "entity<{ty}>");
        }
        ExprNode::StructureConst { ty, .. } => {
            let _ = write!(out, "structure<{ty}>");
        }
        ExprNode::LocalSeq { slot, .. } => {
            let _ = write!(out, "local({slot})");
        }
        ExprNode::Source { ty } => {
            let _ = write!(out, "all<{ty}>");
        }
        ExprNode::Param { name, .. } => out.push_str(name),
        ExprNode::Member { base, member } => {
            write_expr(graph, *base, out);
            let _ = write!(out, ".{member}");
        }
        ExprNode::ValueOf { base } => {
            write_expr(graph, *base, out);
            out.push_str(".value");
        }
        ExprNode::Unary { op, expr } => {
            out.push_str(match op {
                UnaryOp::Not => "!",
                UnaryOp::Neg => "-",
            });
            write_expr(graph, *expr, out);
        }
        ExprNode::Binary { op, left, right } => {
            out.push('(');
            write_expr(graph, *left, out);
            let _ = write!(out, " {} ", binary_symbol(*op));
            write_expr(graph, *right, out);
            out.push(')');
        }
        ExprNode::Cond {
            test,
            then,
            otherwise,
        } => {
            out.push('(');
            write_expr(graph, *test, out);
            out.push_str(" ? ");
            write_expr(graph, *then, out);
            out.push_str(" : ");
            write_expr(graph, *otherwise, out);
            out.push(')');
        }
        ExprNode::Construct { bindings, .. } => {
            out.push_str("new { ");
            for (idx, (name, expr)) in bindings.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{name} = ");
                write_expr(graph, *expr, out);
            }
            out.push_str(" }");
        }
        ExprNode::Lambda { params, body } => {
            out.push('(');
            for (idx, param) in params.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_expr(graph, *param, out);
            }
            out.push_str(") => ");
            write_expr(graph, *body, out);
        }
        ExprNode::Apply { op, source, args } => {
            write_expr(graph, *source, out);
            let _ = write!(out, ".{}(", op_name(op));
            for (idx, arg) in args.iter().enumerate() {
                if idx > 0 {
                    out.push_str(", ");
                }
                write_expr(graph, *arg, out);
            }
            out.push(')');
        }
    }
}

fn write_value(value: &Value, out: &mut String) {
    let _ = match value {
        Value::Null => write!(out, "null"),
        Value::Bool(v) => write!(out, "{v}"),
        Value::Int(v) => write!(out, "{v}"),
        Value::Uint(v) => write!(out, "{v}u"),
        Value::Float(v) => write!(out, "{v}"),
        Value::Text(v) => write!(out, "{v:?}"),
    };
}

const fn binary_symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Rem => "%",
        BinaryOp::And => "&&",
        BinaryOp::Or => "||",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
    }
}

fn op_name(op: &QueryOp) -> &'static str {
    match op {
        QueryOp::Where => "where",
        QueryOp::Select => "select",
        QueryOp::SelectMany => "select_many",
        QueryOp::Join => "join",
        QueryOp::GroupJoin => "group_join",
        QueryOp::GroupBy => "group_by",
        QueryOp::OrderBy(SortDirection::Asc) => "order_by",
        QueryOp::OrderBy(SortDirection::Desc) => "order_by_desc",
        QueryOp::ThenBy(SortDirection::Asc) => "then_by",
        QueryOp::ThenBy(SortDirection::Desc) => "then_by_desc",
        QueryOp::Distinct => "distinct",
        QueryOp::Skip => "skip",
        QueryOp::Take => "take",
        QueryOp::ElementAt { or_default: false } => "element_at",
        QueryOp::ElementAt { or_default: true } => "element_at_or_default",
        QueryOp::First { or_default: false } => "first",
        QueryOp::First { or_default: true } => "first_or_default",
        QueryOp::Single { or_default: false } => "single",
        QueryOp::Single { or_default: true } => "single_or_default",
        QueryOp::Any => "any",
        QueryOp::All => "all",
        QueryOp::Contains => "contains",
        QueryOp::Count => "count",
        QueryOp::Sum => "sum",
        QueryOp::Min => "min",
        QueryOp::Max => "max",
        QueryOp::Average => "average",
        QueryOp::Cast { .. } => "cast",
        QueryOp::OfType { .. } => "of_type",
        QueryOp::Union => "union",
        QueryOp::Intersect => "intersect",
        QueryOp::Except => "except",
        QueryOp::Concat => "concat",
        QueryOp::Reverse => "reverse",
    }
}
