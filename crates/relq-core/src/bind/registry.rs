use super::cells::ApplyCells;
use crate::{
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    graph::{ExprId, ParamType},
    mapped::MappedValue,
    plan::NodeId,
    translate::Projection,
};
use std::collections::BTreeMap;

///
/// BindingRegistry
///
/// Scoped map from lambda parameters to the projections they currently
/// denote. Scopes nest LIFO with the recursive descent; `exit` removes
/// exactly what the matching `enter` added, so an error return part-way
/// through a lambda leaves outer scopes intact.
///
/// Parameters may alias each other (transparent identifiers introduced
/// by operator chaining); rewrites that replace a plan node propagate
/// through every binding rooted at it.
///

#[derive(Debug, Default)]
pub struct BindingRegistry {
    bindings: BTreeMap<ExprId, Projection>,
    aliases: BTreeMap<ExprId, ExprId>,
    frames: Vec<Vec<FrameEntry>>,
}

#[derive(Debug)]
enum FrameEntry {
    Binding(ExprId),
    Alias(ExprId),
}

impl BindingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a binding scope. Every `add` and `link` until the matching
    /// `exit` is undone by it.
    pub fn enter(&mut self) {
        self.frames.push(Vec::new());
    }

    /// Close the innermost scope, removing its bindings and aliases.
    pub fn exit(&mut self) {
        let Some(frame) = self.frames.pop() else {
            return;
        };
        for entry in frame.into_iter().rev() {
            match entry {
                FrameEntry::Binding(param) => {
                    self.bindings.remove(&param);
                }
                FrameEntry::Alias(param) => {
                    self.aliases.remove(&param);
                }
            }
        }
    }

    /// Bind a lambda parameter within the innermost scope.
    pub fn add(
        &mut self,
        catalog: &Catalog,
        param: ExprId,
        declared: Option<&ParamType>,
        projection: Projection,
    ) -> Result<(), TranslateError> {
        self.insert(catalog, param, declared, projection, true)
    }

    /// Bind a parameter for the whole translation, outside any scope.
    pub fn add_permanent(
        &mut self,
        catalog: &Catalog,
        param: ExprId,
        declared: Option<&ParamType>,
        projection: Projection,
    ) -> Result<(), TranslateError> {
        self.insert(catalog, param, declared, projection, false)
    }

    fn insert(
        &mut self,
        catalog: &Catalog,
        param: ExprId,
        declared: Option<&ParamType>,
        projection: Projection,
        scoped: bool,
    ) -> Result<(), TranslateError> {
        if self.bindings.contains_key(&param) || self.aliases.contains_key(&param) {
            return Err(TranslateError::invariant(
                ErrorOrigin::Bind,
                format!("parameter {param} is already bound"),
            ));
        }
        if let Some(declared) = declared {
            check_compat(catalog, declared, &projection.item)?;
        }
        if scoped {
            let Some(frame) = self.frames.last_mut() else {
                return Err(TranslateError::invariant(
                    ErrorOrigin::Bind,
                    "scoped binding added outside any scope",
                ));
            };
            frame.push(FrameEntry::Binding(param));
        }
        self.bindings.insert(param, projection);
        Ok(())
    }

    /// Alias one parameter to another already-bound one.
    pub fn link(&mut self, param: ExprId, target: ExprId) -> Result<(), TranslateError> {
        if self.bindings.contains_key(&param) || self.aliases.contains_key(&param) {
            return Err(TranslateError::invariant(
                ErrorOrigin::Bind,
                format!("parameter {param} is already bound"),
            ));
        }
        // The target must resolve now; dangling aliases would surface as
        // confusing unbound-parameter errors later.
        self.resolve(target)?;
        if let Some(frame) = self.frames.last_mut() {
            frame.push(FrameEntry::Alias(param));
        }
        self.aliases.insert(param, target);
        Ok(())
    }

    /// Projection a parameter currently denotes.
    pub fn get(&self, param: ExprId) -> Result<&Projection, TranslateError> {
        let target = self.resolve(param)?;
        self.bindings.get(&target).ok_or_else(|| unbound(param))
    }

    fn resolve(&self, param: ExprId) -> Result<ExprId, TranslateError> {
        let mut current = param;
        // Alias chains are short; the bound guards against cycles.
        for _ in 0..=self.aliases.len() {
            match self.aliases.get(&current) {
                Some(next) => current = *next,
                None => return Ok(current),
            }
        }
        Err(TranslateError::invariant(
            ErrorOrigin::Bind,
            format!("parameter alias cycle at {param}"),
        ))
    }

    /// Re-root every binding whose projection sits on a rewritten node,
    /// carrying its correlation cell along.
    pub fn replace_root(
        &mut self,
        old: NodeId,
        new: NodeId,
        cells: &mut ApplyCells,
    ) -> Result<(), TranslateError> {
        for projection in self.bindings.values_mut() {
            if projection.root == old {
                projection.root = new;
            }
        }
        cells.rebind(old, new)
    }

    /// Re-root and reshape the binding of one parameter and everything
    /// aliased to it.
    pub fn rebind(
        &mut self,
        param: ExprId,
        projection: Projection,
        cells: &mut ApplyCells,
    ) -> Result<(), TranslateError> {
        let target = self.resolve(param)?;
        let old = {
            let entry = self.bindings.get_mut(&target).ok_or_else(|| unbound(param))?;
            let old = entry.root;
            *entry = projection;
            old
        };
        let new = self.bindings[&target].root;
        if old != new {
            cells.rebind(old, new)?;
        }
        Ok(())
    }
}

fn unbound(param: ExprId) -> TranslateError {
    TranslateError::invariant(ErrorOrigin::Bind, format!("parameter {param} is not bound"))
}

/// Declared parameter types and bound item shapes must agree; a
/// mismatch means the graph was assembled against a different model.
fn check_compat(
    catalog: &Catalog,
    declared: &ParamType,
    item: &MappedValue,
) -> Result<(), TranslateError> {
    let compatible = match (declared, item.strip_markers()) {
        (ParamType::Entity(want), MappedValue::Key { ty, .. })
        | (ParamType::Entity(want), MappedValue::EntityRef { ty, .. }) => {
            catalog.same_hierarchy(want, ty)?
        }
        (ParamType::Structure(want), MappedValue::Structure { ty, .. }) => want == ty,
        (ParamType::Structure(_), MappedValue::Constructor { .. })
        | (ParamType::Scalar(_), MappedValue::Column { .. })
        | (ParamType::Group, MappedValue::Grouping { .. }) => true,
        _ => false,
    };
    if compatible {
        Ok(())
    } else {
        Err(TranslateError::model(
            ErrorOrigin::Bind,
            format!(
                "parameter declared as {declared:?} cannot bind to {}",
                item.describe()
            ),
        ))
    }
}
