use super::{ResultAccess, TranslateRequest, translate, translate_parameterized};
use crate::{
    graph::{BinaryOp, ElementShape, GraphBuilder, QueryOp},
    obs::{self, TraceEvent, TraceSink},
    test_fixtures::{animal_rows, customer_rows, fixture_catalog, order_rows, record_rows},
    test_support::{Dataset, Executor},
    value::{Captured, ScalarKind, Value},
};
use std::{cell::RefCell, rc::Rc};

fn dataset() -> Dataset {
    Dataset::new()
        .with_table("test::Record", record_rows())
        .with_table("test::Customer", customer_rows())
        .with_table("test::Order", order_rows())
        .with_table("test::Animal", animal_rows())
}

#[derive(Default)]
struct Recorder {
    events: RefCell<Vec<TraceEvent>>,
}

impl TraceSink for Recorder {
    fn record(&self, event: TraceEvent) {
        self.events.borrow_mut().push(event);
    }
}

#[test]
fn filter_keeps_matching_rows() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let p = b.entity_param("r", "test::Record");
    let flag = b.member(p, "flag");
    let lambda = b.lambda(vec![p], flag);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();

    let keys: Vec<Value> = rows.iter().map(|row| row[0].clone()).collect();
    let expected: Vec<Value> = [0, 2, 4, 6, 8].into_iter().map(Value::Int).collect();
    assert_eq!(keys, expected);
}

#[test]
fn captured_comparisons_replay_per_environment() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let p = b.entity_param("r", "test::Record");
    let key = b.member(p, "key");
    let wanted = b.capture(0);
    let test = b.eq(key, wanted);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.bindings.len(), 1);

    let data = dataset();
    for wanted in [3i64, 7] {
        let env = vec![Captured::Scalar(Value::Int(wanted))];
        let rows = Executor::new(&catalog, &data, &query, &env).rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], Value::Int(wanted));
    }
}

#[test]
fn data_independent_arithmetic_folds_to_a_literal() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let p = b.entity_param("r", "test::Record");
    let key = b.member(p, "key");
    let two = b.int(2);
    let three = b.int(3);
    let sum = b.binary(BinaryOp::Add, two, three);
    let test = b.eq(key, sum);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    // Nothing left to bind: the operand was baked in.
    assert!(query.bindings.is_empty());

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(5));
}

#[test]
fn translation_is_deterministic() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let total = b.member(p, "total");
    let lambda = b.lambda(vec![p], total);
    let root = b.order_by(src, lambda);
    let graph = b.finish();

    let request = TranslateRequest::new(&catalog, &graph, root);
    let first = translate(&request).unwrap();
    let second = translate(&request).unwrap();
    assert_eq!(first.explain(), second.explain());
    assert_eq!(first.bindings.len(), second.bindings.len());
}

#[test]
fn reference_navigation_joins_the_target_row() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let customer = b.member(p, "customer");
    let name = b.member(customer, "name");
    let ada = b.text("ada");
    let test = b.eq(name, ada);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert!(query.explain().contains("Join kind=left"));

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(ids, vec![&Value::Int(10), &Value::Int(20)]);
}

#[test]
fn reference_key_reads_skip_the_join() {
    // o.customer.id is stored inline; no join node may appear.
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let customer = b.member(p, "customer");
    let id = b.member(customer, "id");
    let two = b.int(2);
    let test = b.eq(id, two);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert!(!query.explain().contains("Join"));

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(30));
}

#[test]
fn entity_constants_bind_their_key_parts() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let customer = b.member(p, "customer");
    let target = b.entity_const("test::Customer", vec![Value::Int(1)]);
    let test = b.eq(customer, target);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.bindings.len(), 1);

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(ids, vec![&Value::Int(10), &Value::Int(20)]);
}

#[test]
fn entity_constants_with_the_wrong_key_width_are_rejected() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let customer = b.member(p, "customer");
    let target = b.entity_const("test::Customer", vec![Value::Int(1), Value::Int(2)]);
    let test = b.eq(customer, target);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let err = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap_err();
    assert!(err.to_string().contains("key parts"));
}

#[test]
fn null_keyed_references_never_compare_equal() {
    // Orders that share a customer with another order. The two orders
    // without a customer must not pair with each other: a null key part
    // makes the comparison unknown, and the plan carries that guard
    // explicitly rather than assuming null-aware equality downstream.
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let o = b.entity_param("o", "test::Order");

    let others = b.source("test::Order");
    let x = b.entity_param("x", "test::Order");
    let x_customer = b.member(x, "customer");
    let o_customer = b.member(o, "customer");
    let same_customer = b.eq(x_customer, o_customer);
    let x_id = b.member(x, "id");
    let o_id = b.member(o, "id");
    let other_row = b.binary(BinaryOp::Ne, x_id, o_id);
    let sibling = b.binary(BinaryOp::And, same_customer, other_row);
    let sibling_pred = b.lambda(vec![x], sibling);
    let shares = b.apply(QueryOp::Any, others, vec![sibling_pred]);
    let pred = b.lambda(vec![o], shares);
    let root = b.where_(src, pred);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let plan = query.explain();
    assert!(plan.contains("isnull("));
    assert!(plan.contains(" ? "));

    let mut orders = order_rows();
    orders.push(vec![Value::Int(60), Value::Null, Value::Float(4.0)]);
    let data = Dataset::new().with_table("test::Order", orders);
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(ids, vec![&Value::Int(10), &Value::Int(20)]);
}

#[test]
fn negated_identity_comparison_skips_null_keys() {
    // `!=` negates only the part chain; the null guard stays outermost,
    // so an order without a customer matches neither `==` nor `!=`.
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let p = b.entity_param("o", "test::Order");
    let customer = b.member(p, "customer");
    let target = b.entity_const("test::Customer", vec![Value::Int(1)]);
    let test = b.binary(BinaryOp::Ne, customer, target);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(ids, vec![&Value::Int(30), &Value::Int(40)]);
}

#[test]
fn collection_aggregates_fall_back_to_a_correlated_apply() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Customer");
    let p = b.entity_param("c", "test::Customer");
    let orders = b.member(p, "orders");
    let count = b.count(orders);
    let one = b.int(1);
    let test = b.binary(BinaryOp::Gt, count, one);
    let lambda = b.lambda(vec![p], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let recorder = Rc::new(Recorder::default());
    let query = obs::with_trace_sink(recorder.clone(), || {
        translate(&TranslateRequest::new(&catalog, &graph, root))
    })
    .unwrap();
    assert!(
        recorder
            .events
            .borrow()
            .iter()
            .any(|event| {
                matches!(event, TraceEvent::AggregateApplyFallback { func } if *func == "count")
            })
    );

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(1));
}

#[test]
fn group_aggregates_fold_into_the_grouping_node() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let o = b.entity_param("o", "test::Order");
    let customer = b.member(o, "customer");
    let key_lambda = b.lambda(vec![o], customer);
    let grouped = b.group_by(src, key_lambda);

    let g = b.group_param("g");
    let key = b.member(g, "key");
    let n = b.count(g);
    let item = b.anonymous(vec![("cust", key), ("n", n)]);
    let select_lambda = b.lambda(vec![g], item);
    let root = b.select(grouped, select_lambda);
    let graph = b.finish();

    let recorder = Rc::new(Recorder::default());
    let query = obs::with_trace_sink(recorder.clone(), || {
        translate(&TranslateRequest::new(&catalog, &graph, root))
    })
    .unwrap();
    assert!(
        recorder
            .events
            .borrow()
            .iter()
            .any(|event| matches!(event, TraceEvent::AggregateFolded { func } if *func == "count"))
    );

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Int(1), Value::Int(2)],
            vec![Value::Int(2), Value::Int(1)],
            vec![Value::Int(3), Value::Int(1)],
            vec![Value::Null, Value::Int(1)],
        ]
    );
}

#[test]
fn nested_first_pads_missing_elements() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Customer");
    let c = b.entity_param("c", "test::Customer");
    let orders = b.member(c, "orders");

    let o = b.entity_param("o", "test::Order");
    let total = b.member(o, "total");
    let eight = b.literal(Value::Float(8.0));
    let big = b.binary(BinaryOp::Gt, total, eight);
    let pred = b.lambda(vec![o], big);
    let filtered = b.where_(orders, pred);
    let top = b.apply(QueryOp::First { or_default: true }, filtered, vec![]);

    let name = b.member(c, "name");
    let item = b.anonymous(vec![("name", name), ("top", top)]);
    let lambda = b.lambda(vec![c], item);
    let root = b.select(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();

    // One row per customer; only cy has an order above the threshold.
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0][4], Value::Null);
    assert_eq!(rows[1][4], Value::Null);
    assert_eq!(rows[2][4], Value::Int(40));
}

#[test]
fn root_first_limits_the_fetch() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let root = b.apply(QueryOp::First { or_default: false }, src, vec![]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.access, ResultAccess::First);
    assert_eq!(query.access.fetch_limit(), Some(1));

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
}

#[test]
fn element_at_is_skip_plus_take() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let index = b.int(4);
    let root = b.apply(QueryOp::ElementAt { or_default: false }, src, vec![index]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.access, ResultAccess::First);

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0], Value::Int(4));
}

#[test]
fn cached_translations_reject_literal_paging() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let count = b.int(5);
    let root = b.take(src, count);
    let graph = b.finish();

    let request = TranslateRequest::new(&catalog, &graph, root);
    assert!(translate(&request).is_ok());

    let err = translate(&request.cached()).unwrap_err();
    assert!(err.is_cached_query());
}

#[test]
fn parameterized_queries_replay_for_any_argument() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let count = b.capture(0);
    let root = b.take(src, count);
    let graph = b.finish();

    let request = TranslateRequest::new(&catalog, &graph, root);
    let parameterized = translate_parameterized(&request, 0).unwrap();

    let data = dataset();
    for wanted in [2usize, 6] {
        let env = parameterized.env_for(Captured::Scalar(Value::Int(
            i64::try_from(wanted).unwrap(),
        )));
        let rows = Executor::new(&catalog, &data, &parameterized.query, &env)
            .rows()
            .unwrap();
        assert_eq!(rows.len(), wanted);
    }
}

#[test]
fn parameterized_wrap_rejects_foreign_slots() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let count = b.capture(1);
    let root = b.take(src, count);
    let graph = b.finish();

    let err = translate_parameterized(&TranslateRequest::new(&catalog, &graph, root), 0)
        .unwrap_err();
    assert!(err.is_cached_query());
}

#[test]
fn reverse_is_rejected() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let root = b.apply(QueryOp::Reverse, src, vec![]);
    let graph = b.finish();

    let err = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap_err();
    assert!(err.is_unsupported());
}

#[test]
fn of_type_filters_on_the_discriminant_and_permutes_columns() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Animal");
    let cats = b.apply(
        QueryOp::OfType {
            ty: "test::Cat".to_string(),
        },
        src,
        vec![],
    );
    let c = b.entity_param("c", "test::Cat");
    let color = b.member(c, "color");
    let lambda = b.lambda(vec![c], color);
    let root = b.select(cats, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let (offset, _, _) = query.item.as_column().unwrap();
    // Cat's own field reads the shared hierarchy column, not position 2
    // of Cat's nominal layout.
    assert_eq!(offset, 3);

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][offset], Value::Text("grey".to_string()));
}

#[test]
fn local_sequences_become_plan_sources() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.local_seq(0, ElementShape::Scalar(ScalarKind::Int));
    let x = b.scalar_param("x", ScalarKind::Int);
    let two = b.int(2);
    let test = b.binary(BinaryOp::Gt, x, two);
    let lambda = b.lambda(vec![x], test);
    let root = b.where_(src, lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let env = vec![Captured::Seq(vec![
        Captured::Scalar(Value::Int(1)),
        Captured::Scalar(Value::Int(3)),
        Captured::Scalar(Value::Int(5)),
    ])];
    let rows = Executor::new(&catalog, &data, &query, &env).rows().unwrap();
    assert_eq!(rows, vec![vec![Value::Int(3)], vec![Value::Int(5)]]);
}

#[test]
fn join_pairs_on_decomposed_keys() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let orders = b.source("test::Order");
    let customers = b.source("test::Customer");

    let o = b.entity_param("o", "test::Order");
    let o_key = b.member(o, "customer");
    let outer_key = b.lambda(vec![o], o_key);

    let c = b.entity_param("c", "test::Customer");
    let inner_key = b.lambda(vec![c], c);

    let ro = b.entity_param("o", "test::Order");
    let rc = b.entity_param("c", "test::Customer");
    let oid = b.member(ro, "id");
    let who = b.member(rc, "name");
    let pair = b.anonymous(vec![("oid", oid), ("who", who)]);
    let result = b.lambda(vec![ro, rc], pair);

    let root = b.apply(
        QueryOp::Join,
        orders,
        vec![customers, outer_key, inner_key, result],
    );
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();

    // The orphaned order pairs with nobody.
    let pairs: Vec<(&Value, &Value)> = rows.iter().map(|row| (&row[0], &row[4])).collect();
    assert_eq!(
        pairs,
        vec![
            (&Value::Int(10), &Value::Text("ada".to_string())),
            (&Value::Int(20), &Value::Text("ada".to_string())),
            (&Value::Int(30), &Value::Text("bo".to_string())),
            (&Value::Int(40), &Value::Text("cy".to_string())),
        ]
    );
}

#[test]
fn contains_becomes_a_counted_membership_test() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let r = b.entity_param("r", "test::Record");
    let key = b.member(r, "key");
    let lambda = b.lambda(vec![r], key);
    let keys = b.select(src, lambda);
    let wanted = b.capture(0);
    let root = b.apply(QueryOp::Contains, keys, vec![wanted]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.access, ResultAccess::First);

    let data = dataset();
    let env = vec![Captured::Scalar(Value::Int(4))];
    let rows = Executor::new(&catalog, &data, &query, &env).rows().unwrap();
    assert_eq!(rows, vec![vec![Value::Bool(true)]]);

    let env = vec![Captured::Scalar(Value::Int(40))];
    let rows = Executor::new(&catalog, &data, &query, &env).rows().unwrap();
    assert_eq!(rows, vec![vec![Value::Bool(false)]]);
}

#[test]
fn distinct_narrows_the_row_to_the_item() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Customer");
    let c = b.entity_param("c", "test::Customer");
    let address = b.member(c, "address");
    let city = b.member(address, "city");
    let lambda = b.lambda(vec![c], city);
    let cities = b.select(src, lambda);
    let root = b.apply(QueryOp::Distinct, cities, vec![]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Value::Text("york".to_string())],
            vec![Value::Text("kent".to_string())],
        ]
    );
}

#[test]
fn secondary_sort_keys_merge_into_one_ordering() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Customer");

    let c = b.entity_param("c", "test::Customer");
    let address = b.member(c, "address");
    let city = b.member(address, "city");
    let by_city = b.lambda(vec![c], city);
    let ordered = b.order_by(src, by_city);

    let c2 = b.entity_param("c", "test::Customer");
    let id = b.member(c2, "id");
    let by_id = b.lambda(vec![c2], id);
    let root = b.apply(
        QueryOp::ThenBy(crate::value::SortDirection::Desc),
        ordered,
        vec![by_id],
    );
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let ids: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(ids, vec![&Value::Int(2), &Value::Int(3), &Value::Int(1)]);
}

#[test]
fn filtered_ordered_selection_yields_even_keys_in_order() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");

    let r1 = b.entity_param("r", "test::Record");
    let flag = b.member(r1, "flag");
    let pred = b.lambda(vec![r1], flag);
    let filtered = b.where_(src, pred);

    let r2 = b.entity_param("r", "test::Record");
    let key1 = b.member(r2, "key");
    let by_key = b.lambda(vec![r2], key1);
    let ordered = b.order_by(filtered, by_key);

    let r3 = b.entity_param("r", "test::Record");
    let key2 = b.member(r3, "key");
    let sel = b.lambda(vec![r3], key2);
    let root = b.select(ordered, sel);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    let keys: Vec<&Value> = rows.iter().map(|row| &row[0]).collect();
    assert_eq!(
        keys,
        vec![
            &Value::Int(0),
            &Value::Int(2),
            &Value::Int(4),
            &Value::Int(6),
            &Value::Int(8),
        ]
    );
}

#[test]
fn group_by_flag_counts_both_halves() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Record");
    let r = b.entity_param("r", "test::Record");
    let flag = b.member(r, "flag");
    let key_lambda = b.lambda(vec![r], flag);
    let grouped = b.group_by(src, key_lambda);

    let g = b.group_param("g");
    let key = b.member(g, "key");
    let n = b.count(g);
    let item = b.anonymous(vec![("key", key), ("count", n)]);
    let select_lambda = b.lambda(vec![g], item);
    let root = b.select(grouped, select_lambda);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let mut rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    rows.sort_by(|a, b| a[0].order_cmp(&b[0]));
    assert_eq!(
        rows,
        vec![
            vec![Value::Bool(false), Value::Int(5)],
            vec![Value::Bool(true), Value::Int(5)],
        ]
    );
}

#[test]
fn flattening_groups_recovers_the_source_multiset() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Order");
    let o = b.entity_param("o", "test::Order");
    let customer = b.member(o, "customer");
    let key_lambda = b.lambda(vec![o], customer);
    let grouped = b.group_by(src, key_lambda);

    let g = b.group_param("g");
    let identity = b.lambda(vec![g], g);
    let root = b.apply(QueryOp::SelectMany, grouped, vec![identity]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();

    // Every order lands in exactly one group whose key matches its
    // customer, null keys pairing only with null customers.
    let mut ids: Vec<i64> = rows
        .iter()
        .map(|row| match &row[1] {
            Value::Int(id) => *id,
            other => panic!("unexpected order id {other:?}"),
        })
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![10, 20, 30, 40, 50]);
    for row in &rows {
        match (&row[0], &row[2]) {
            (Value::Null, Value::Null) => {}
            (key, customer) => assert_eq!(key.compare_eq(customer), Some(true)),
        }
    }
}

#[test]
fn single_fetches_two_rows_to_prove_plurality() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();
    let src = b.source("test::Customer");
    let root = b.apply(QueryOp::Single { or_default: false }, src, vec![]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    assert_eq!(query.access, ResultAccess::Single);
    assert_eq!(query.access.fetch_limit(), Some(2));
    assert!(query.explain().contains("Take"));

    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    assert_eq!(rows.len(), 2);
}

#[test]
fn union_deduplicates_across_both_sides() {
    let catalog = fixture_catalog();
    let mut b = GraphBuilder::new();

    let src1 = b.source("test::Record");
    let r1 = b.entity_param("r", "test::Record");
    let flag = b.member(r1, "flag");
    let even = b.lambda(vec![r1], flag);
    let evens = b.where_(src1, even);
    let r2 = b.entity_param("r", "test::Record");
    let key1 = b.member(r2, "key");
    let sel1 = b.lambda(vec![r2], key1);
    let even_keys = b.select(evens, sel1);

    let src2 = b.source("test::Record");
    let r3 = b.entity_param("r", "test::Record");
    let key2 = b.member(r3, "key");
    let three = b.int(3);
    let low = b.binary(BinaryOp::Lt, key2, three);
    let pred = b.lambda(vec![r3], low);
    let lows = b.where_(src2, pred);
    let r4 = b.entity_param("r", "test::Record");
    let key3 = b.member(r4, "key");
    let sel2 = b.lambda(vec![r4], key3);
    let low_keys = b.select(lows, sel2);

    let root = b.apply(QueryOp::Union, even_keys, vec![low_keys]);
    let graph = b.finish();

    let query = translate(&TranslateRequest::new(&catalog, &graph, root)).unwrap();
    let data = dataset();
    let rows = Executor::new(&catalog, &data, &query, &[]).rows().unwrap();
    // Evens 0..8, then 1 from the low side; 0 and 2 collapse.
    assert_eq!(rows.len(), 6);
    assert_eq!(rows[5], vec![Value::Int(1)]);
}
