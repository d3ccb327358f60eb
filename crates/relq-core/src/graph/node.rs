use crate::value::{ScalarKind, SortDirection, Value};
use serde::{Deserialize, Serialize};

///
/// ExprId
/// Arena index of one query-graph node.
///

#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
    derive_more::Display,
)]
#[display("e{_0}")]
pub struct ExprId(pub(crate) u32);

impl ExprId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// QueryGraph
///
/// Immutable, externally-owned expression graph. Nodes are appended via
/// [`super::GraphBuilder`] and referenced by [`ExprId`]; children always
/// precede their parents, so a single forward pass visits bottom-up.
///

#[derive(Clone, Debug, Default)]
pub struct QueryGraph {
    pub(crate) nodes: Vec<ExprNode>,
}

impl QueryGraph {
    #[must_use]
    pub fn node(&self, id: ExprId) -> &ExprNode {
        &self.nodes[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child ids of a node, in evaluation order.
    #[must_use]
    pub fn children(&self, id: ExprId) -> Vec<ExprId> {
        match self.node(id) {
            ExprNode::Literal(_)
            | ExprNode::Capture { .. }
            | ExprNode::EntityConst { .. }
            | ExprNode::StructureConst { .. }
            | ExprNode::LocalSeq { .. }
            | ExprNode::Source { .. }
            | ExprNode::Param { .. } => Vec::new(),
            ExprNode::Member { base, .. } | ExprNode::ValueOf { base } => vec![*base],
            ExprNode::Unary { expr, .. } => vec![*expr],
            ExprNode::Binary { left, right, .. } => vec![*left, *right],
            ExprNode::Cond {
                test,
                then,
                otherwise,
            } => vec![*test, *then, *otherwise],
            ExprNode::Construct { bindings, .. } => {
                bindings.iter().map(|(_, expr)| *expr).collect()
            }
            ExprNode::Lambda { params, body } => {
                let mut out = params.clone();
                out.push(*body);
                out
            }
            ExprNode::Apply { source, args, .. } => {
                let mut out = vec![*source];
                out.extend(args.iter().copied());
                out
            }
        }
    }
}

///
/// ExprNode
///
/// Closed node set of the query expression graph. Leaves are values,
/// captures, parameters, and sources; interior nodes are member reads,
/// operators, constructors, lambdas, and query-operator applications.
///

#[derive(Clone, Debug)]
pub enum ExprNode {
    /// Literal constant baked into the graph.
    Literal(Value),

    /// Read of one captured-environment slot.
    Capture { slot: usize },

    /// Captured persistent-entity instance; identity must be preserved.
    EntityConst { ty: String, key: Vec<Value> },

    /// Captured value-structure instance; identity must be preserved.
    StructureConst { ty: String, values: Vec<Value> },

    /// Captured in-memory sequence usable as a query source.
    LocalSeq { slot: usize, element: ElementShape },

    /// Root of a persistent collection for one entity type.
    Source { ty: String },

    /// Lambda parameter definition; occurrences reference this id.
    Param {
        name: String,
        ty: Option<ParamType>,
    },

    /// Member (field) read.
    Member { base: ExprId, member: String },

    /// Nullable-value unwrap. Never constant-folded: folding would erase
    /// the null-propagation the plan must express.
    ValueOf { base: ExprId },

    Unary {
        op: UnaryOp,
        expr: ExprId,
    },

    Binary {
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
    },

    Cond {
        test: ExprId,
        then: ExprId,
        otherwise: ExprId,
    },

    /// Constructor/initializer expression (anonymous composite or named
    /// structure), with by-name member bindings.
    Construct {
        target: ConstructTarget,
        bindings: Vec<(String, ExprId)>,
    },

    Lambda {
        params: Vec<ExprId>,
        body: ExprId,
    },

    /// Query-operator application over a source sub-graph.
    Apply {
        op: QueryOp,
        source: ExprId,
        args: Vec<ExprId>,
    },
}

///
/// QueryOp
/// The open-ended operator vocabulary, closed at the graph boundary.
///

#[derive(Clone, Debug, PartialEq)]
pub enum QueryOp {
    Where,
    Select,
    SelectMany,
    Join,
    GroupJoin,
    GroupBy,
    OrderBy(SortDirection),
    ThenBy(SortDirection),
    Distinct,
    Skip,
    Take,
    ElementAt { or_default: bool },
    First { or_default: bool },
    Single { or_default: bool },
    Any,
    All,
    Contains,
    Count,
    Sum,
    Min,
    Max,
    Average,
    Cast { ty: String },
    OfType { ty: String },
    Union,
    Intersect,
    Except,
    Concat,
    /// Always rejected: row order is not reversible relationally.
    Reverse,
}

impl QueryOp {
    /// Operators that reduce a sequence to one scalar.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(
            self,
            Self::Count | Self::Sum | Self::Min | Self::Max | Self::Average
        )
    }

    /// Operators that reduce a sequence to one boolean.
    #[must_use]
    pub const fn is_predicate_fold(&self) -> bool {
        matches!(self, Self::Any | Self::All | Self::Contains)
    }
}

///
/// ParamType
/// Declared element type of a lambda parameter, used for binding
/// compatibility checks in the registry.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ParamType {
    Entity(String),
    Structure(String),
    Scalar(ScalarKind),
    Group,
}

///
/// ConstructTarget
///

#[derive(Clone, Debug, PartialEq)]
pub enum ConstructTarget {
    /// Anonymous composite; shape-only, no nominal type.
    Anonymous,
    /// Named structure type from the catalog.
    Named(String),
}

///
/// ElementShape
///
/// Element description of a captured local sequence, used by the
/// local-sequence adapter to decompose items into primitive columns.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ElementShape {
    Scalar(ScalarKind),
    /// Persistent entity; decomposes to its key columns.
    Entity(String),
    /// Catalog structure; decomposes via the catalog, cycle-checked.
    Structure(String),
    /// Inline complex type decomposed field by field.
    Fields(Vec<(String, ElementShape)>),
}

///
/// UnaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    Not,
    Neg,
}

///
/// BinaryOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl BinaryOp {
    #[must_use]
    pub const fn is_comparison(&self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }
}
