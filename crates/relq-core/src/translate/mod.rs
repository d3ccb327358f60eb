//! Recursive-descent translation of a query expression graph into a
//! relational plan plus an item mapping.

mod aggregate;
mod cast;
mod comparison;
mod compilers;
mod expression;
mod group;
mod join;
mod operators;
mod projection;
mod result;
mod state;

#[cfg(test)]
mod tests;

pub use compilers::{CustomCompilers, MemberCompiler};
pub use projection::{Projection, ResultAccess};

pub(crate) use expression::{Frame, Spaced};
pub(crate) use group::GroupedPlans;
pub(crate) use state::TranslatorState;

use crate::{
    bind::{ApplyCells, BindingRegistry},
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    fold::{self, FoldSet},
    graph::{ExprId, ExprNode, QueryGraph, QueryOp, render},
    materialize::Materializer,
    obs::{self, TraceEvent},
    plan::{PlanArena, RelNode},
    query::{BindingShape, BindingTable, ParameterizedQuery, TranslatedQuery},
};

///
/// TranslateRequest
///

#[derive(Clone, Copy)]
pub struct TranslateRequest<'a> {
    pub catalog: &'a Catalog,
    pub graph: &'a QueryGraph,
    pub root: ExprId,
    pub compilers: Option<&'a CustomCompilers>,
    /// Translating for a reusable cached plan: literal paging values are
    /// rejected instead of baked in.
    pub cached: bool,
}

impl<'a> TranslateRequest<'a> {
    #[must_use]
    pub const fn new(catalog: &'a Catalog, graph: &'a QueryGraph, root: ExprId) -> Self {
        Self {
            catalog,
            graph,
            root,
            compilers: None,
            cached: false,
        }
    }

    #[must_use]
    pub const fn with_compilers(mut self, compilers: &'a CustomCompilers) -> Self {
        self.compilers = Some(compilers);
        self
    }

    #[must_use]
    pub const fn cached(mut self) -> Self {
        self.cached = true;
        self
    }
}

/// Translate one query graph into a replayable plan.
pub fn translate(request: &TranslateRequest) -> Result<TranslatedQuery, TranslateError> {
    obs::record(TraceEvent::TranslateStart);

    let mut translator = Translator::new(request);
    let state = TranslatorState::root();
    let projection = translator.translate_node(request.root, state)?;

    let materializer = Materializer::compile(&projection.item)?;
    obs::record(TraceEvent::TranslateFinish {
        plan_nodes: translator.arena.len(),
        bindings: translator.captures.len(),
    });

    Ok(TranslatedQuery {
        graph: request.graph.clone(),
        arena: translator.arena,
        root: projection.root,
        item: projection.item,
        access: projection.access,
        bindings: translator.captures,
        materializer,
    })
}

/// Translate for a plan cache: cached-query restrictions apply, and the
/// result must depend on `slot` alone.
pub fn translate_parameterized(
    request: &TranslateRequest,
    slot: usize,
) -> Result<ParameterizedQuery, TranslateError> {
    let cached = request.cached();
    let query = translate(&cached)?;
    ParameterizedQuery::wrap(query, slot)
}

///
/// Translator
///
/// One translation in flight. The arena, registries, and binding table
/// accumulate; everything positional travels in [`TranslatorState`],
/// cloned down the recursion rather than mutated in place.
///

pub(crate) struct Translator<'a> {
    pub(crate) catalog: &'a Catalog,
    pub(crate) graph: &'a QueryGraph,
    pub(crate) compilers: &'a CustomCompilers,
    pub(crate) cached: bool,
    pub(crate) folds: FoldSet,
    pub(crate) arena: PlanArena,
    pub(crate) registry: BindingRegistry,
    pub(crate) cells: ApplyCells,
    pub(crate) captures: BindingTable,
    pub(crate) grouped: GroupedPlans,
}

impl<'a> Translator<'a> {
    fn new(request: &TranslateRequest<'a>) -> Self {
        Self {
            catalog: request.catalog,
            graph: request.graph,
            compilers: request.compilers.unwrap_or(&compilers::EMPTY),
            cached: request.cached,
            folds: fold::analyze(request.graph),
            arena: PlanArena::new(),
            registry: BindingRegistry::new(),
            cells: ApplyCells::new(),
            captures: BindingTable::new(),
            grouped: GroupedPlans::new(),
        }
    }

    /// Translate a sequence-valued node into a projection.
    pub(crate) fn translate_node(
        &mut self,
        id: ExprId,
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        match self.graph.node(id) {
            ExprNode::Source { ty } => {
                let columns = self.catalog.layout(ty)?;
                let root = self.arena.alloc(RelNode::Source {
                    ty: ty.clone(),
                    columns,
                });
                let item = crate::mapped::entity_item(self.catalog, ty, 0)?;
                Ok(Projection::sequence(root, item))
            }

            ExprNode::LocalSeq { element, .. } => {
                let (layout, shape) = crate::local::adapt(self.catalog, element)?;
                let binding = self
                    .captures
                    .allocate(id, BindingShape::Sequence(shape.clone()));
                obs::record(TraceEvent::LocalSourceAdapted {
                    width: layout.len(),
                });
                let item = self.local_item(&layout, &shape)?;
                let root = self.arena.alloc(RelNode::Local {
                    layout,
                    shape,
                    binding,
                });
                Ok(Projection::sequence(root, item))
            }

            // A parameter used as a sequence source: grouped elements and
            // lazy sub-sequences unwrap to their own sub-plan.
            ExprNode::Param { .. } => {
                let projection = self.registry.get(id)?.clone();
                match projection.item.strip_markers() {
                    crate::mapped::MappedValue::Grouping { elements, .. } => {
                        Ok((**elements).clone())
                    }
                    crate::mapped::MappedValue::Subquery {
                        projection: inner, ..
                    } => Ok((**inner).clone()),
                    _ => Ok(projection),
                }
            }

            ExprNode::Member { .. } => self.translate_navigation(id, state),

            ExprNode::Apply { op, source, args } => {
                let op = op.clone();
                let source = *source;
                let args = args.clone();
                self.dispatch_op(id, &op, source, &args, state)
            }

            _ => Err(self.fail_at(
                id,
                TranslateError::unsupported(
                    ErrorOrigin::Translate,
                    "expression is not sequence-valued",
                ),
            )),
        }
    }

    fn dispatch_op(
        &mut self,
        id: ExprId,
        op: &QueryOp,
        source: ExprId,
        args: &[ExprId],
        state: TranslatorState,
    ) -> Result<Projection, TranslateError> {
        let result = match op {
            QueryOp::Where => self.op_where(source, args, state),
            QueryOp::Select => self.op_select(source, args, state),
            QueryOp::SelectMany => self.op_select_many(source, args, state),
            QueryOp::Join => self.op_join(source, args, state),
            QueryOp::GroupJoin => self.op_group_join(source, args, state),
            QueryOp::GroupBy => self.op_group_by(source, args, state),
            QueryOp::OrderBy(direction) => self.op_order_by(source, args, *direction, state),
            QueryOp::ThenBy(direction) => self.op_then_by(source, args, *direction, state),
            QueryOp::Distinct => self.op_distinct(source, state),
            QueryOp::Skip => self.op_skip(source, args, state),
            QueryOp::Take => self.op_take(source, args, state),
            QueryOp::ElementAt { or_default } => {
                self.op_element_at(source, args, *or_default, state)
            }
            QueryOp::First { or_default } => self.op_first(source, args, *or_default, state),
            QueryOp::Single { or_default } => self.op_single(source, args, *or_default, state),
            QueryOp::Any => self.op_any(source, args, state),
            QueryOp::All => self.op_all(source, args, state),
            QueryOp::Contains => self.op_contains(source, args, state),
            QueryOp::Count
            | QueryOp::Sum
            | QueryOp::Min
            | QueryOp::Max
            | QueryOp::Average => self.op_aggregate(op, source, args, state),
            QueryOp::Cast { ty } => self.op_cast(source, ty, state),
            QueryOp::OfType { ty } => self.op_of_type(source, ty, state),
            QueryOp::Union | QueryOp::Intersect | QueryOp::Except | QueryOp::Concat => {
                self.op_set(op, source, args, state)
            }
            QueryOp::Reverse => Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                "row order is not reversible relationally",
            )),
        };
        result.map_err(|err| self.fail_at(id, err))
    }

    // --- shared helpers ---

    /// Destructure a lambda argument with the expected arity.
    pub(crate) fn lambda_parts(
        &self,
        id: ExprId,
        arity: usize,
    ) -> Result<(Vec<ExprId>, ExprId), TranslateError> {
        let ExprNode::Lambda { params, body } = self.graph.node(id) else {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                "operator argument is not a lambda",
            ));
        };
        if params.len() != arity {
            return Err(TranslateError::model(
                ErrorOrigin::Graph,
                format!("lambda takes {} parameters, expected {arity}", params.len()),
            ));
        }
        Ok((params.clone(), *body))
    }

    /// Declared type of a lambda parameter, for binding checks.
    pub(crate) fn param_type(&self, param: ExprId) -> Option<crate::graph::ParamType> {
        match self.graph.node(param) {
            ExprNode::Param { ty, .. } => ty.clone(),
            _ => None,
        }
    }

    /// Bind `param` to `projection` inside a fresh scope and run `f`.
    pub(crate) fn with_binding<T>(
        &mut self,
        param: ExprId,
        projection: Projection,
        f: impl FnOnce(&mut Self) -> Result<T, TranslateError>,
    ) -> Result<T, TranslateError> {
        self.registry.enter();
        let declared = self.param_type(param);
        let out = self
            .registry
            .add(self.catalog, param, declared.as_ref(), projection)
            .and_then(|()| f(self));
        self.registry.exit();
        out
    }

    /// Attach the offending sub-graph rendering, once.
    pub(crate) fn fail_at(&self, id: ExprId, err: TranslateError) -> TranslateError {
        if err.expression.is_some() {
            err
        } else {
            err.with_expression(render(self.graph, id))
        }
    }
}
