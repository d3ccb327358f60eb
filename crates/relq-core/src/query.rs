//! Translated-query artifacts: the replayable plan, its captured-value
//! binding table, and the single-slot parameterized wrapper used by
//! plan caches.

use crate::{
    catalog::Catalog,
    error::{ErrorOrigin, TranslateError},
    fold::{collect_capture_slots, evaluate},
    graph::{ExprId, QueryGraph},
    local,
    mapped::MappedValue,
    materialize::Materializer,
    obs::{self, TraceEvent},
    plan::{BindingId, LocalShape, NodeId, PlanArena, explain},
    translate::ResultAccess,
    value::{Captured, Value},
};

///
/// BindingTable
///
/// Placeholder bindings of one translation. Each entry remembers the
/// graph subtree it was carved from; replaying a plan re-evaluates
/// those subtrees against a fresh captured environment.
///

#[derive(Clone, Debug, Default)]
pub struct BindingTable {
    entries: Vec<CaptureBinding>,
}

impl BindingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn allocate(&mut self, expr: ExprId, shape: BindingShape) -> BindingId {
        let id = BindingId(u32::try_from(self.entries.len()).expect("binding table too large"));
        self.entries.push(CaptureBinding { expr, shape });
        id
    }

    #[must_use]
    pub fn get(&self, id: BindingId) -> Option<&CaptureBinding> {
        self.entries.get(id.index())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CaptureBinding> {
        self.entries.iter()
    }
}

///
/// CaptureBinding
///

#[derive(Clone, Debug)]
pub struct CaptureBinding {
    /// Graph subtree re-evaluated per execution.
    pub expr: ExprId,
    pub shape: BindingShape,
}

///
/// BindingShape
///

#[derive(Clone, Debug)]
pub enum BindingShape {
    /// The subtree yields one scalar.
    Scalar,
    /// Primitive `index` of the subtree's decomposed composite value.
    Part(usize),
    /// The subtree yields a sequence, decomposed row by row.
    Sequence(LocalShape),
}

///
/// ParamContext
/// Captured environment one execution runs against.
///

#[derive(Clone, Copy, Debug)]
pub struct ParamContext<'a> {
    env: &'a [Captured],
}

impl<'a> ParamContext<'a> {
    #[must_use]
    pub const fn new(env: &'a [Captured]) -> Self {
        Self { env }
    }

    #[must_use]
    pub const fn env(&self) -> &'a [Captured] {
        self.env
    }
}

///
/// TranslatedQuery
///
/// One complete translation: the plan, the item mapping compiled into a
/// materializer, the access contract, and the binding table. Replayable
/// against any parameter context; holds no references into the caller's
/// environment.
///

#[derive(Clone, Debug)]
pub struct TranslatedQuery {
    pub(crate) graph: QueryGraph,
    pub arena: PlanArena,
    pub root: NodeId,
    pub item: MappedValue,
    pub access: ResultAccess,
    pub bindings: BindingTable,
    pub materializer: Materializer,
}

impl TranslatedQuery {
    /// Deterministic plan rendering for logs and tests.
    #[must_use]
    pub fn explain(&self) -> String {
        explain(&self.arena, self.root)
    }

    /// Resolve one scalar binding against a parameter context.
    pub fn eval_binding(
        &self,
        catalog: &Catalog,
        binding: BindingId,
        ctx: &ParamContext,
    ) -> Result<Value, TranslateError> {
        let entry = self.binding(binding)?;
        let captured = evaluate(&self.graph, catalog, entry.expr, ctx.env())?;
        match &entry.shape {
            BindingShape::Scalar => captured.into_scalar().ok_or_else(|| {
                TranslateError::invariant(
                    ErrorOrigin::Plan,
                    format!("binding {binding} produced a composite in scalar position"),
                )
            }),
            BindingShape::Part(index) => part(captured, *index, binding),
            BindingShape::Sequence(_) => Err(TranslateError::invariant(
                ErrorOrigin::Plan,
                format!("sequence binding {binding} read as a scalar"),
            )),
        }
    }

    /// Resolve one sequence binding into local-source rows.
    pub fn eval_sequence(
        &self,
        catalog: &Catalog,
        binding: BindingId,
        ctx: &ParamContext,
    ) -> Result<Vec<Vec<Value>>, TranslateError> {
        let entry = self.binding(binding)?;
        let BindingShape::Sequence(shape) = &entry.shape else {
            return Err(TranslateError::invariant(
                ErrorOrigin::Plan,
                format!("scalar binding {binding} read as a sequence"),
            ));
        };
        let captured = evaluate(&self.graph, catalog, entry.expr, ctx.env())?;
        let Captured::Seq(elements) = captured else {
            return Err(TranslateError::model(
                ErrorOrigin::Local,
                format!("binding {binding} did not capture a sequence"),
            ));
        };
        elements
            .iter()
            .map(|element| local::decompose_element(element, shape))
            .collect()
    }

    fn binding(&self, id: BindingId) -> Result<&CaptureBinding, TranslateError> {
        self.bindings.get(id).ok_or_else(|| {
            TranslateError::invariant(ErrorOrigin::Plan, format!("unknown binding {id}"))
        })
    }
}

fn part(captured: Captured, index: usize, binding: BindingId) -> Result<Value, TranslateError> {
    let parts = match captured {
        Captured::Entity { key, .. } => key,
        Captured::Structure { values, .. } => values,
        other => {
            return Err(TranslateError::invariant(
                ErrorOrigin::Plan,
                format!("part binding {binding} over non-composite {other:?}"),
            ));
        }
    };
    parts.get(index).cloned().ok_or_else(|| {
        TranslateError::invariant(
            ErrorOrigin::Plan,
            format!("binding {binding} part #{index} is out of range"),
        )
    })
}

///
/// ParameterizedQuery
///
/// A translated query proven to depend on exactly one capture slot, so
/// a cache can replay it for any value of that slot. Wrapping fails if
/// any binding reads another slot.
///

#[derive(Clone, Debug)]
pub struct ParameterizedQuery {
    pub query: TranslatedQuery,
    pub slot: usize,
}

impl ParameterizedQuery {
    pub fn wrap(query: TranslatedQuery, slot: usize) -> Result<Self, TranslateError> {
        for entry in query.bindings.iter() {
            let slots = collect_capture_slots(&query.graph, entry.expr);
            if slots.iter().any(|read| *read != slot) {
                return Err(TranslateError::cached_query(format!(
                    "binding over {} reads capture slots {slots:?}; only slot {slot} is replayable",
                    entry.expr
                )));
            }
        }
        obs::record(TraceEvent::Parameterized { slot });
        Ok(Self { query, slot })
    }

    /// Environment placing `argument` at the designated slot.
    #[must_use]
    pub fn env_for(&self, argument: Captured) -> Vec<Captured> {
        let mut env = vec![Captured::Scalar(Value::Null); self.slot + 1];
        env[self.slot] = argument;
        env
    }
}
