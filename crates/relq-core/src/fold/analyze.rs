//! Single bottom-up pass marking which sub-graphs can be evaluated
//! without per-row context.

use crate::graph::{ExprId, ExprNode, QueryGraph};

///
/// FoldSet
/// Membership set of foldable nodes, keyed by arena index.
///

#[derive(Clone, Debug)]
pub struct FoldSet {
    foldable: Vec<bool>,
}

impl FoldSet {
    #[must_use]
    pub fn contains(&self, id: ExprId) -> bool {
        self.foldable.get(id.index()).copied().unwrap_or(false)
    }
}

/// Mark every foldable node reachable in the graph.
///
/// A node is foldable iff all its children are foldable and it is not
/// itself row-dependent: parameters, lambdas, queryable sources, and
/// query-operator applications never fold. Nullable `.value` reads are
/// excluded even over foldable operands, because folding them would
/// erase the null-propagation the plan must express.
#[must_use]
pub fn analyze(graph: &QueryGraph) -> FoldSet {
    let mut foldable = vec![false; graph.len()];

    // Children precede parents in the arena, so one forward pass is a
    // bottom-up visit.
    for index in 0..graph.len() {
        let id = ExprId(u32::try_from(index).expect("graph too large"));
        let self_allows = match graph.node(id) {
            ExprNode::Literal(_)
            | ExprNode::Capture { .. }
            | ExprNode::EntityConst { .. }
            | ExprNode::StructureConst { .. } => true,

            // Row- or plan-dependent by nature.
            ExprNode::Param { .. }
            | ExprNode::Lambda { .. }
            | ExprNode::Source { .. }
            | ExprNode::LocalSeq { .. }
            | ExprNode::Apply { .. }
            | ExprNode::ValueOf { .. } => false,

            ExprNode::Member { .. }
            | ExprNode::Unary { .. }
            | ExprNode::Binary { .. }
            | ExprNode::Cond { .. }
            | ExprNode::Construct { .. } => true,
        };
        foldable[index] =
            self_allows && graph.children(id).iter().all(|child| foldable[child.index()]);
    }

    FoldSet { foldable }
}
