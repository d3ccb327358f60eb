use super::*;
use crate::{
    catalog::ColumnInfo,
    value::{ScalarKind, SortDirection, Value},
};

fn int_col(name: &str) -> ColumnInfo {
    ColumnInfo {
        name: name.to_string(),
        kind: ScalarKind::Int,
        nullable: false,
    }
}

#[test]
fn width_is_structural() {
    let mut arena = PlanArena::new();
    let source = arena.alloc(RelNode::Source {
        ty: "test::Record".to_string(),
        columns: vec![int_col("key"), int_col("rank")],
    });
    let calc = arena.alloc(RelNode::Calc {
        input: source,
        columns: vec![("double".to_string(), ScalarExpr::Column(0))],
    });
    let agg = arena.alloc(RelNode::Aggregate {
        input: calc,
        group: vec![1],
        aggregates: vec![AggregateColumn {
            func: AggregateFunc::Count,
            column: None,
        }],
    });

    assert_eq!(arena.width(source), 2);
    assert_eq!(arena.width(calc), 3);
    assert_eq!(arena.width(agg), 2);
}

#[test]
fn shift_columns_leaves_outer_reads_alone() {
    let expr = ScalarExpr::and(
        ScalarExpr::eq(ScalarExpr::Column(1), ScalarExpr::Literal(Value::Int(3))),
        ScalarExpr::Outer {
            cell: ApplyCellId::new(0),
            column: 1,
        },
    );
    let shifted = expr.shift_columns(4);
    assert_eq!(
        shifted,
        ScalarExpr::and(
            ScalarExpr::eq(ScalarExpr::Column(5), ScalarExpr::Literal(Value::Int(3))),
            ScalarExpr::Outer {
                cell: ApplyCellId::new(0),
                column: 1,
            },
        )
    );
}

#[test]
fn explain_renders_a_deterministic_tree() {
    let mut arena = PlanArena::new();
    let source = arena.alloc(RelNode::Source {
        ty: "test::Record".to_string(),
        columns: vec![int_col("key")],
    });
    let filter = arena.alloc(RelNode::Filter {
        input: source,
        predicate: ScalarExpr::eq(ScalarExpr::Column(0), ScalarExpr::Literal(Value::Int(1))),
    });
    let sort = arena.alloc(RelNode::Sort {
        input: filter,
        keys: vec![(0, SortDirection::Asc)],
    });
    let take = arena.alloc(RelNode::Take {
        input: sort,
        count: ScalarExpr::Literal(Value::Int(2)),
    });

    let rendered = explain(&arena, take);
    assert_eq!(
        rendered,
        "Take count=2\n  Sort keys=[0 asc]\n    Filter (#0 == 1)\n      Source type=test::Record cols=1\n"
    );
}
