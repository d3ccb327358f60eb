use super::builder::Materializer;
use crate::{
    plan::{ApplyCellId, NodeId},
    value::Value,
};

///
/// Materialized
///
/// One materialized result item. Nested sequences stay lazy: they carry
/// everything needed to run their sub-plan, and nothing runs until the
/// caller enumerates them.
///

#[derive(Clone, Debug)]
pub enum Materialized {
    Null,
    Scalar(Value),
    Entity {
        ty: String,
        /// Identity handle from the resolver; equal for equal keys.
        handle: u64,
        key: Vec<Value>,
        fields: Vec<(String, Materialized)>,
    },
    Structure {
        ty: String,
        fields: Vec<(String, Materialized)>,
    },
    /// Anonymous composite from a constructor expression.
    Composite {
        members: Vec<(String, Materialized)>,
    },
    Group {
        key: Box<Materialized>,
        elements: LazySequence,
    },
    Sequence(LazySequence),
}

impl Materialized {
    /// Scalar view, for callers that expect one.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }
}

///
/// LazySequence
///
/// Deferred correlated sub-plan: the executor runs `root` with `cell`
/// bound to the captured outer row, then materializes each result row
/// with `item`.
///

#[derive(Clone, Debug)]
pub struct LazySequence {
    pub root: NodeId,
    pub cell: ApplyCellId,
    pub outer_row: Vec<Value>,
    pub item: Box<Materializer>,
}
