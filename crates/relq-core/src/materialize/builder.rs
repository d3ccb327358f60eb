use super::{
    cursor::{IdentityResolver, RowCursor},
    output::{LazySequence, Materialized},
};
use crate::{
    error::{ErrorOrigin, TranslateError},
    graph::ConstructTarget,
    mapped::{MappedValue, MarkerKind},
    plan::{ApplyCellId, NodeId},
    value::Value,
};

///
/// Materializer
///
/// Item mapping compiled once per query shape into a flat recipe, then
/// replayed per row. Compilation front-loads every structural check so
/// the per-row path only reads columns and resolves identities.
///

#[derive(Clone, Debug)]
pub struct Materializer {
    step: Step,
}

#[derive(Clone, Debug)]
enum Step {
    Column {
        offset: usize,
    },
    Entity {
        ty: String,
        key_offsets: Vec<usize>,
        fields: Vec<(String, Step)>,
    },
    Structure {
        ty: String,
        fields: Vec<(String, Step)>,
    },
    Composite {
        members: Vec<(String, Step)>,
    },
    Group {
        key: Box<Step>,
        elements: SubPlan,
    },
    Sequence(SubPlan),
    Marked {
        kind: MarkerKind,
        inner: Box<Step>,
    },
}

#[derive(Clone, Debug)]
struct SubPlan {
    root: NodeId,
    cell: ApplyCellId,
    item: Box<Materializer>,
}

impl Materializer {
    /// Compile an item mapping into a replayable recipe.
    pub fn compile(item: &MappedValue) -> Result<Self, TranslateError> {
        Ok(Self {
            step: compile_step(item)?,
        })
    }

    /// Materialize one plan row.
    pub fn materialize(
        &self,
        row: &dyn RowCursor,
        identity: &mut dyn IdentityResolver,
    ) -> Result<Materialized, TranslateError> {
        run_step(&self.step, row, identity)
    }
}

fn compile_step(item: &MappedValue) -> Result<Step, TranslateError> {
    Ok(match item {
        MappedValue::Column { offset, .. } => Step::Column { offset: *offset },

        MappedValue::Key { ty, columns } => Step::Entity {
            ty: ty.clone(),
            key_offsets: column_offsets(columns)?,
            fields: Vec::new(),
        },

        MappedValue::EntityRef { ty, key, fields, .. } => Step::Entity {
            ty: ty.clone(),
            key_offsets: key_offsets(key)?,
            fields: compile_fields(fields)?,
        },

        MappedValue::Structure { ty, fields } => Step::Structure {
            ty: ty.clone(),
            fields: compile_fields(fields)?,
        },

        MappedValue::CollectionRef { element, .. } => {
            return Err(TranslateError::invariant(
                ErrorOrigin::Materialize,
                format!("collection of '{element}' reached the materializer untranslated"),
            ));
        }

        MappedValue::Grouping {
            key,
            elements,
            cell,
        } => Step::Group {
            key: Box::new(compile_step(key)?),
            elements: SubPlan {
                root: elements.root,
                cell: *cell,
                item: Box::new(Materializer::compile(&elements.item)?),
            },
        },

        MappedValue::Subquery { projection, cell } => Step::Sequence(SubPlan {
            root: projection.root,
            cell: *cell,
            item: Box::new(Materializer::compile(&projection.item)?),
        }),

        MappedValue::Constructor { target, members } => match target {
            ConstructTarget::Named(ty) => Step::Structure {
                ty: ty.clone(),
                fields: compile_fields(members)?,
            },
            ConstructTarget::Anonymous => Step::Composite {
                members: compile_fields(members)?,
            },
        },

        MappedValue::Marker { kind, inner } => Step::Marked {
            kind: *kind,
            inner: Box::new(compile_step(inner)?),
        },
    })
}

fn compile_fields(fields: &[(String, MappedValue)]) -> Result<Vec<(String, Step)>, TranslateError> {
    fields
        .iter()
        .map(|(name, value)| Ok((name.clone(), compile_step(value)?)))
        .collect()
}

fn key_offsets(key: &MappedValue) -> Result<Vec<usize>, TranslateError> {
    match key.strip_markers() {
        MappedValue::Key { columns, .. } => column_offsets(columns),
        MappedValue::Column { offset, .. } => Ok(vec![*offset]),
        other => Err(TranslateError::invariant(
            ErrorOrigin::Materialize,
            format!("entity key mapped as {}", other.describe()),
        )),
    }
}

fn column_offsets(columns: &[MappedValue]) -> Result<Vec<usize>, TranslateError> {
    columns
        .iter()
        .map(|col| {
            col.as_column().map(|(offset, _, _)| offset).ok_or_else(|| {
                TranslateError::invariant(
                    ErrorOrigin::Materialize,
                    format!("key part mapped as {}", col.describe()),
                )
            })
        })
        .collect()
}

fn run_step(
    step: &Step,
    row: &dyn RowCursor,
    identity: &mut dyn IdentityResolver,
) -> Result<Materialized, TranslateError> {
    Ok(match step {
        Step::Column { offset } => Materialized::Scalar(read(row, *offset)?),

        Step::Entity {
            ty,
            key_offsets,
            fields,
        } => {
            let mut key = Vec::with_capacity(key_offsets.len());
            for offset in key_offsets {
                key.push(read(row, *offset)?);
            }
            // A null key part means the association is unset; the whole
            // reference materializes as null.
            if key.iter().any(Value::is_null) {
                return Ok(Materialized::Null);
            }
            let handle = identity.resolve(ty, &key);
            Materialized::Entity {
                ty: ty.clone(),
                handle,
                key,
                fields: run_fields(fields, row, identity)?,
            }
        }

        Step::Structure { ty, fields } => Materialized::Structure {
            ty: ty.clone(),
            fields: run_fields(fields, row, identity)?,
        },

        Step::Composite { members } => Materialized::Composite {
            members: run_fields(members, row, identity)?,
        },

        Step::Group { key, elements } => Materialized::Group {
            key: Box::new(run_step(key, row, identity)?),
            elements: lazy(elements, row),
        },

        Step::Sequence(plan) => Materialized::Sequence(lazy(plan, row)),

        // Cardinality is the executor's contract; the shape is the
        // inner mapping's.
        Step::Marked { inner, .. } => run_step(inner, row, identity)?,
    })
}

fn run_fields(
    fields: &[(String, Step)],
    row: &dyn RowCursor,
    identity: &mut dyn IdentityResolver,
) -> Result<Vec<(String, Materialized)>, TranslateError> {
    fields
        .iter()
        .map(|(name, step)| Ok((name.clone(), run_step(step, row, identity)?)))
        .collect()
}

fn lazy(plan: &SubPlan, row: &dyn RowCursor) -> LazySequence {
    let outer_row = (0..row.width())
        .map(|col| row.get(col).cloned().unwrap_or(Value::Null))
        .collect();
    LazySequence {
        root: plan.root,
        cell: plan.cell,
        outer_row,
        item: plan.item.clone(),
    }
}

fn read(row: &dyn RowCursor, offset: usize) -> Result<Value, TranslateError> {
    row.get(offset).cloned().ok_or_else(|| {
        TranslateError::invariant(
            ErrorOrigin::Materialize,
            format!("row has no column #{offset}"),
        )
    })
}
