use super::node::{NodeId, RelNode};

///
/// PlanArena
///
/// Arena owning every relational node of one translation. Nodes are
/// append-only and immutable; rewrites allocate new nodes, and side
/// tables key on [`NodeId`] rather than reference identity.
///

#[derive(Clone, Debug, Default)]
pub struct PlanArena {
    nodes: Vec<RelNode>,
}

impl PlanArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, node: RelNode) -> NodeId {
        let id = NodeId(u32::try_from(self.nodes.len()).expect("plan too large"));
        self.nodes.push(node);
        id
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> &RelNode {
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

    /// Output row width of a node, computed structurally.
    #[must_use]
    pub fn width(&self, id: NodeId) -> usize {
        match self.node(id) {
            RelNode::Source { columns, .. } => columns.len(),
            RelNode::Local { layout, .. } => layout.len(),
            RelNode::Filter { input, .. }
            | RelNode::Sort { input, .. }
            | RelNode::Take { input, .. }
            | RelNode::Skip { input, .. }
            | RelNode::Distinct { input } => self.width(*input),
            RelNode::Calc { input, columns } => self.width(*input) + columns.len(),
            RelNode::Project { columns, .. } => columns.len(),
            RelNode::Join { left, right, .. } | RelNode::Apply { left, right, .. } => {
                self.width(*left) + self.width(*right)
            }
            RelNode::Aggregate {
                group, aggregates, ..
            } => group.len() + aggregates.len(),
            RelNode::SetOp { left, .. } => self.width(*left),
        }
    }
}
