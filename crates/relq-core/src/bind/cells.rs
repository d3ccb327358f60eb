use crate::{
    error::{ErrorOrigin, TranslateError},
    plan::{ApplyCellId, NodeId},
};
use std::collections::BTreeMap;

///
/// ApplyCells
///
/// Allocation table for correlation cells, keyed by the plan node whose
/// rows feed them. A cell's identity is stable for the whole
/// translation; when a rewrite replaces the feeding node, the cell is
/// carried to the replacement so existing `Outer` reads stay valid.
///

#[derive(Debug, Default)]
pub struct ApplyCells {
    cells: BTreeMap<NodeId, ApplyCellId>,
    next: u32,
}

impl ApplyCells {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell for a plan node, allocating on first use.
    pub fn cell_for(&mut self, node: NodeId) -> ApplyCellId {
        if let Some(cell) = self.cells.get(&node) {
            return *cell;
        }
        let cell = ApplyCellId::new(self.next);
        self.next += 1;
        self.cells.insert(node, cell);
        cell
    }

    #[must_use]
    pub fn get(&self, node: NodeId) -> Option<ApplyCellId> {
        self.cells.get(&node).copied()
    }

    /// Carry the cell of a rewritten node to its replacement.
    ///
    /// The replacement must not already feed a different cell; two cells
    /// on one node would leave one of them silently unbound.
    pub fn rebind(&mut self, old: NodeId, new: NodeId) -> Result<(), TranslateError> {
        let Some(cell) = self.cells.remove(&old) else {
            return Ok(());
        };
        if let Some(existing) = self.cells.get(&new).copied()
            && existing != cell
        {
            self.cells.insert(old, cell);
            return Err(TranslateError::invariant(
                ErrorOrigin::Bind,
                format!("node {new} already feeds cell {existing}; cannot carry {cell} onto it"),
            ));
        }
        self.cells.insert(new, cell);
        Ok(())
    }
}
