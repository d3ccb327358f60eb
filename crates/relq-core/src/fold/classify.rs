//! Classification of foldable sub-graphs into inline constants and
//! deferred runtime parameters.

use crate::{
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    fold::evaluate,
    graph::{ExprId, ExprNode, QueryGraph},
    value::Value,
};

///
/// Classified
///
/// What a foldable subtree becomes in the plan: a literal folded in
/// place, or a placeholder binding re-evaluated per execution.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Classified {
    Constant(Value),
    Parameter(ParamKind),
}

///
/// ParamKind
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamKind {
    /// Scalar read from the captured environment.
    Capture,
    /// Captured entity reference; decomposes to its key columns.
    Entity,
    /// Captured structure value; decomposes to its flattened layout.
    Structure,
    /// Captured local sequence, bound as an in-plan local source.
    Sequence,
}

/// Decide whether a foldable subtree folds to a literal now or becomes
/// a runtime parameter.
///
/// Anything touching the captured environment, and any entity or
/// structure constant, defers: their values vary per execution or
/// decompose per the catalog. Everything else is evaluated immediately
/// against an empty environment.
pub fn classify(
    graph: &QueryGraph,
    catalog: &Catalog,
    id: ExprId,
) -> Result<Classified, TranslateError> {
    if subtree_defers(graph, id) {
        return Ok(Classified::Parameter(param_kind(graph, id)));
    }
    let value = evaluate(graph, catalog, id, &[])?
        .into_scalar()
        .ok_or_else(|| {
            TranslateError::invariant(
                ErrorOrigin::Translate,
                "composite constant classified as inline-foldable",
            )
        })?;
    Ok(Classified::Constant(value))
}

/// Capture slots a subtree reads, sorted and deduplicated. Empty for
/// fully literal subtrees.
#[must_use]
pub fn collect_capture_slots(graph: &QueryGraph, id: ExprId) -> Vec<usize> {
    let mut slots = Vec::new();
    walk(graph, id, &mut |node| {
        if let ExprNode::Capture { slot } = node {
            slots.push(*slot);
        }
    });
    slots.sort_unstable();
    slots.dedup();
    slots
}

fn subtree_defers(graph: &QueryGraph, id: ExprId) -> bool {
    let mut defers = false;
    walk(graph, id, &mut |node| {
        defers |= matches!(
            node,
            ExprNode::Capture { .. }
                | ExprNode::EntityConst { .. }
                | ExprNode::StructureConst { .. }
        );
    });
    defers
}

fn param_kind(graph: &QueryGraph, id: ExprId) -> ParamKind {
    match graph.node(id) {
        ExprNode::EntityConst { .. } => ParamKind::Entity,
        ExprNode::StructureConst { .. } | ExprNode::Construct { .. } => ParamKind::Structure,
        ExprNode::LocalSeq { .. } => ParamKind::Sequence,
        _ => ParamKind::Capture,
    }
}

fn walk(graph: &QueryGraph, id: ExprId, visit: &mut impl FnMut(&ExprNode)) {
    visit(graph.node(id));
    for child in graph.children(id) {
        walk(graph, child, visit);
    }
}
