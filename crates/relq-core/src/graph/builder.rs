use super::node::{
    BinaryOp, ConstructTarget, ElementShape, ExprId, ExprNode, ParamType, QueryGraph, QueryOp,
    UnaryOp,
};
use crate::value::{ScalarKind, SortDirection, Value};

///
/// GraphBuilder
///
/// Append-only builder for [`QueryGraph`]. Children must be pushed
/// before their parents; the resulting graph is immutable.
///

#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: QueryGraph,
}

impl GraphBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: ExprNode) -> ExprId {
        let id = ExprId(u32::try_from(self.graph.nodes.len()).expect("graph too large"));
        self.graph.nodes.push(node);
        id
    }

    #[must_use]
    pub fn finish(self) -> QueryGraph {
        self.graph
    }

    // --- leaves ---

    pub fn literal(&mut self, value: Value) -> ExprId {
        self.push(ExprNode::Literal(value))
    }

    pub fn int(&mut self, value: i64) -> ExprId {
        self.literal(Value::Int(value))
    }

    pub fn boolean(&mut self, value: bool) -> ExprId {
        self.literal(Value::Bool(value))
    }

    pub fn text(&mut self, value: &str) -> ExprId {
        self.literal(Value::Text(value.to_string()))
    }

    pub fn capture(&mut self, slot: usize) -> ExprId {
        self.push(ExprNode::Capture { slot })
    }

    pub fn entity_const(&mut self, ty: &str, key: Vec<Value>) -> ExprId {
        self.push(ExprNode::EntityConst {
            ty: ty.to_string(),
            key,
        })
    }

    pub fn structure_const(&mut self, ty: &str, values: Vec<Value>) -> ExprId {
        self.push(ExprNode::StructureConst {
            ty: ty.to_string(),
            values,
        })
    }

    pub fn local_seq(&mut self, slot: usize, element: ElementShape) -> ExprId {
        self.push(ExprNode::LocalSeq { slot, element })
    }

    pub fn source(&mut self, ty: &str) -> ExprId {
        self.push(ExprNode::Source { ty: ty.to_string() })
    }

    pub fn param(&mut self, name: &str, ty: Option<ParamType>) -> ExprId {
        self.push(ExprNode::Param {
            name: name.to_string(),
            ty,
        })
    }

    pub fn entity_param(&mut self, name: &str, ty: &str) -> ExprId {
        self.param(name, Some(ParamType::Entity(ty.to_string())))
    }

    pub fn scalar_param(&mut self, name: &str, kind: ScalarKind) -> ExprId {
        self.param(name, Some(ParamType::Scalar(kind)))
    }

    pub fn group_param(&mut self, name: &str) -> ExprId {
        self.param(name, Some(ParamType::Group))
    }

    // --- interior nodes ---

    pub fn member(&mut self, base: ExprId, member: &str) -> ExprId {
        self.push(ExprNode::Member {
            base,
            member: member.to_string(),
        })
    }

    pub fn value_of(&mut self, base: ExprId) -> ExprId {
        self.push(ExprNode::ValueOf { base })
    }

    pub fn unary(&mut self, op: UnaryOp, expr: ExprId) -> ExprId {
        self.push(ExprNode::Unary { op, expr })
    }

    pub fn binary(&mut self, op: BinaryOp, left: ExprId, right: ExprId) -> ExprId {
        self.push(ExprNode::Binary { op, left, right })
    }

    pub fn eq(&mut self, left: ExprId, right: ExprId) -> ExprId {
        self.binary(BinaryOp::Eq, left, right)
    }

    pub fn cond(&mut self, test: ExprId, then: ExprId, otherwise: ExprId) -> ExprId {
        self.push(ExprNode::Cond {
            test,
            then,
            otherwise,
        })
    }

    pub fn construct(&mut self, target: ConstructTarget, bindings: Vec<(&str, ExprId)>) -> ExprId {
        self.push(ExprNode::Construct {
            target,
            bindings: bindings
                .into_iter()
                .map(|(name, expr)| (name.to_string(), expr))
                .collect(),
        })
    }

    pub fn anonymous(&mut self, bindings: Vec<(&str, ExprId)>) -> ExprId {
        self.construct(ConstructTarget::Anonymous, bindings)
    }

    pub fn lambda(&mut self, params: Vec<ExprId>, body: ExprId) -> ExprId {
        self.push(ExprNode::Lambda { params, body })
    }

    pub fn apply(&mut self, op: QueryOp, source: ExprId, args: Vec<ExprId>) -> ExprId {
        self.push(ExprNode::Apply { op, source, args })
    }

    // --- operator shorthands used throughout the tests ---

    pub fn where_(&mut self, source: ExprId, predicate: ExprId) -> ExprId {
        self.apply(QueryOp::Where, source, vec![predicate])
    }

    pub fn select(&mut self, source: ExprId, selector: ExprId) -> ExprId {
        self.apply(QueryOp::Select, source, vec![selector])
    }

    pub fn order_by(&mut self, source: ExprId, selector: ExprId) -> ExprId {
        self.apply(QueryOp::OrderBy(SortDirection::Asc), source, vec![selector])
    }

    pub fn order_by_desc(&mut self, source: ExprId, selector: ExprId) -> ExprId {
        self.apply(QueryOp::OrderBy(SortDirection::Desc), source, vec![selector])
    }

    pub fn group_by(&mut self, source: ExprId, key_selector: ExprId) -> ExprId {
        self.apply(QueryOp::GroupBy, source, vec![key_selector])
    }

    pub fn take(&mut self, source: ExprId, count: ExprId) -> ExprId {
        self.apply(QueryOp::Take, source, vec![count])
    }

    pub fn skip(&mut self, source: ExprId, count: ExprId) -> ExprId {
        self.apply(QueryOp::Skip, source, vec![count])
    }

    pub fn count(&mut self, source: ExprId) -> ExprId {
        self.apply(QueryOp::Count, source, vec![])
    }
}
