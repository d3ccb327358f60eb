//! Relational plan arena: the executor-facing output of translation.

mod arena;
mod explain;
mod node;
mod scalar;

#[cfg(test)]
mod tests;

pub use arena::PlanArena;
pub use explain::explain;
pub use node::{
    AggregateColumn, AggregateFunc, ApplyCellId, ApplyKind, JoinKind, LocalShape, NodeId, RelNode,
    SetOpKind,
};
pub use scalar::{BindingId, ScalarExpr, ScalarOp};
