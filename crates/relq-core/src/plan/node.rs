use super::scalar::{BindingId, ScalarExpr};
use crate::{catalog::ColumnInfo, value::SortDirection};

///
/// NodeId
/// Arena index of one relational plan node. Side tables (apply cells,
/// bindings) key on this index instead of node identity, which makes
/// rebind-after-rewrite explicit and checkable.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::Display)]
#[display("n{_0}")]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// ApplyCellId
///
/// Identity-stable handle threading a correlated outer row into a
/// nested sub-plan. Allocated by the correlation registry; referenced
/// by `Apply` nodes and `ScalarExpr::Outer` reads.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::Display)]
#[display("c{_0}")]
pub struct ApplyCellId(pub(crate) u32);

impl ApplyCellId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }
}

///
/// RelNode
///
/// Closed relational operator set. Nodes are immutable once allocated;
/// every transformation allocates a new node over existing inputs.
///

#[derive(Clone, Debug)]
pub enum RelNode {
    /// Raw persistent source with its flattened column layout.
    Source { ty: String, columns: Vec<ColumnInfo> },

    /// Synthetic source over a captured in-memory sequence. Rows are
    /// resolved from the parameter context at execution time.
    Local {
        layout: Vec<ColumnInfo>,
        shape: LocalShape,
        binding: BindingId,
    },

    Filter {
        input: NodeId,
        predicate: ScalarExpr,
    },

    /// Append computed columns to the input row.
    Calc {
        input: NodeId,
        columns: Vec<(String, ScalarExpr)>,
    },

    /// Replace the row with the given expressions.
    Project {
        input: NodeId,
        columns: Vec<ScalarExpr>,
    },

    Join {
        left: NodeId,
        right: NodeId,
        kind: JoinKind,
        condition: ScalarExpr,
    },

    /// Correlated apply: for each left row, evaluate `right` with `cell`
    /// bound to that row, emitting left ++ right.
    Apply {
        left: NodeId,
        right: NodeId,
        cell: ApplyCellId,
        kind: ApplyKind,
    },

    /// Group by the given input columns and compute aggregates; output
    /// is the group columns followed by one column per aggregate.
    Aggregate {
        input: NodeId,
        group: Vec<usize>,
        aggregates: Vec<AggregateColumn>,
    },

    Sort {
        input: NodeId,
        keys: Vec<(usize, SortDirection)>,
    },

    Take {
        input: NodeId,
        count: ScalarExpr,
    },

    Skip {
        input: NodeId,
        count: ScalarExpr,
    },

    Distinct {
        input: NodeId,
    },

    SetOp {
        kind: SetOpKind,
        left: NodeId,
        right: NodeId,
    },
}

///
/// JoinKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

///
/// ApplyKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApplyKind {
    /// Emit nothing for outer rows with an empty inner result.
    Cross,
    /// Emit one null-padded row for outer rows with an empty inner result.
    Left,
}

///
/// SetOpKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SetOpKind {
    Union,
    Intersect,
    Except,
    Concat,
}

///
/// AggregateFunc
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AggregateFunc {
    Count,
    Sum,
    Min,
    Max,
    Avg,
}

///
/// AggregateColumn
/// One aggregate output; `column` is `None` only for `Count`.
///

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AggregateColumn {
    pub func: AggregateFunc,
    pub column: Option<usize>,
}

///
/// LocalShape
///
/// Decomposition recipe for one local-sequence element, produced by the
/// local-sequence adapter and replayed at execution time.
///

#[derive(Clone, Debug, PartialEq)]
pub enum LocalShape {
    /// One primitive column.
    Scalar,
    /// Entity reference decomposed to its key columns.
    Key { ty: String, width: usize },
    /// Complex item decomposed field by field.
    Fields(Vec<(String, LocalShape)>),
}

impl LocalShape {
    /// Number of primitive columns this shape occupies.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Scalar => 1,
            Self::Key { width, .. } => *width,
            Self::Fields(fields) => fields.iter().map(|(_, shape)| shape.width()).sum(),
        }
    }
}
