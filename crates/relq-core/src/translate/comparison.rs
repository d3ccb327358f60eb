//! Equality decomposition. Composite operands (keys, references,
//! structures) are flattened to their primitive parts before any plan
//! expression is emitted; the plan layer never compares composites.

use super::{Frame, Spaced, Translator, TranslatorState};
use crate::{
    error::{ErrorOrigin, TranslateError},
    fold::{Classified, ParamKind, classify},
    graph::{BinaryOp, ExprId, ExprNode},
    mapped::MappedValue,
    plan::ScalarExpr,
    query::BindingShape,
    value::Value,
};

///
/// Operand
///
/// One side of an equality, reduced to primitives. Composites remember
/// their nominal tag so incompatible identities are rejected before any
/// column pairing happens.
///

pub(crate) enum Operand {
    Null,
    Scalar(ScalarExpr),
    Composite {
        tag: Option<Tag>,
        parts: Vec<ScalarExpr>,
    },
}

impl Operand {
    /// Flattened primitive parts, in mapping order.
    pub(crate) fn into_parts(self) -> Vec<ScalarExpr> {
        match self {
            Self::Null => vec![ScalarExpr::Literal(Value::Null)],
            Self::Scalar(expr) => vec![expr],
            Self::Composite { parts, .. } => parts,
        }
    }

    pub(crate) fn tag(&self) -> Option<&Tag> {
        match self {
            Self::Composite { tag, .. } => tag.as_ref(),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub(crate) enum Tag {
    Entity(String),
    Structure(String),
}

impl Translator<'_> {
    /// Translate `left == right` / `left != right`, decomposing
    /// composite operands part by part.
    pub(crate) fn compare_equality(
        &mut self,
        op: BinaryOp,
        left: ExprId,
        right: ExprId,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<ScalarExpr, TranslateError> {
        let left = self.build_operand(left, frame, state)?;
        let right = self.build_operand(right, frame, state)?;
        let negated = matches!(op, BinaryOp::Ne);

        let test = match (left, right) {
            (Operand::Null, Operand::Null) => ScalarExpr::Literal(Value::Bool(true)),

            (Operand::Null, other) | (other, Operand::Null) => match other {
                Operand::Scalar(expr) => ScalarExpr::is_null(expr),
                Operand::Composite { parts, .. } => {
                    ScalarExpr::and_all(parts.into_iter().map(ScalarExpr::is_null).collect())
                }
                Operand::Null => unreachable!("matched above"),
            },

            (Operand::Scalar(left), Operand::Scalar(right)) => ScalarExpr::eq(left, right),

            (
                Operand::Composite {
                    tag: left_tag,
                    parts: left_parts,
                },
                Operand::Composite {
                    tag: right_tag,
                    parts: right_parts,
                },
            ) => {
                self.check_tags(left_tag.as_ref(), right_tag.as_ref())?;
                if left_parts.len() != right_parts.len() {
                    return Err(TranslateError::model(
                        ErrorOrigin::Translate,
                        format!(
                            "composite equality pairs {} parts with {}",
                            left_parts.len(),
                            right_parts.len()
                        ),
                    ));
                }
                // A null in any part makes the whole comparison unknown,
                // never a match. The guard carries that rule in the plan
                // itself; the executor's equality need not be null-aware.
                let guard = ScalarExpr::or_all(
                    left_parts
                        .iter()
                        .chain(right_parts.iter())
                        .cloned()
                        .map(ScalarExpr::is_null)
                        .collect(),
                );
                let chain = ScalarExpr::and_all(
                    left_parts
                        .into_iter()
                        .zip(right_parts)
                        .map(|(left, right)| ScalarExpr::eq(left, right))
                        .collect(),
                );
                let chain = if negated {
                    ScalarExpr::negate(chain)
                } else {
                    chain
                };
                return Ok(ScalarExpr::cond(
                    guard,
                    ScalarExpr::Literal(Value::Null),
                    chain,
                ));
            }

            (Operand::Scalar(_), Operand::Composite { parts, .. })
            | (Operand::Composite { parts, .. }, Operand::Scalar(_)) => {
                return Err(TranslateError::model(
                    ErrorOrigin::Translate,
                    format!("composite of {} parts compared to a scalar", parts.len()),
                ));
            }
        };

        Ok(if negated {
            ScalarExpr::negate(test)
        } else {
            test
        })
    }

    pub(crate) fn check_tags(
        &self,
        left: Option<&Tag>,
        right: Option<&Tag>,
    ) -> Result<(), TranslateError> {
        match (left, right) {
            (Some(Tag::Entity(left)), Some(Tag::Entity(right))) => {
                if self.catalog.same_hierarchy(left, right)? {
                    Ok(())
                } else {
                    Err(TranslateError::model(
                        ErrorOrigin::Translate,
                        format!("identity comparison across '{left}' and '{right}'"),
                    ))
                }
            }
            (Some(Tag::Structure(left)), Some(Tag::Structure(right))) => {
                if left == right {
                    Ok(())
                } else {
                    Err(TranslateError::model(
                        ErrorOrigin::Translate,
                        format!("structure comparison across '{left}' and '{right}'"),
                    ))
                }
            }
            (Some(Tag::Entity(entity)), Some(Tag::Structure(structure)))
            | (Some(Tag::Structure(structure)), Some(Tag::Entity(entity))) => {
                Err(TranslateError::model(
                    ErrorOrigin::Translate,
                    format!("entity '{entity}' compared to structure '{structure}'"),
                ))
            }
            // Untagged composites pair positionally.
            _ => Ok(()),
        }
    }

    pub(crate) fn build_operand(
        &mut self,
        id: ExprId,
        frame: &mut Frame,
        state: TranslatorState,
    ) -> Result<Operand, TranslateError> {
        if self.folds.contains(id) {
            return self.fold_operand(id);
        }
        match self.graph.node(id) {
            ExprNode::Param { .. }
            | ExprNode::Member { .. }
            | ExprNode::ValueOf { .. }
            | ExprNode::Construct { .. } => {
                let spaced = self.visit_value(id, frame, state)?;
                operand_of(&spaced)
            }
            _ => Ok(Operand::Scalar(self.visit_scalar(id, frame, state)?)),
        }
    }

    /// Data-independent operand: constants inline, captured scalars and
    /// identities become placeholder bindings resolved per execution.
    fn fold_operand(&mut self, id: ExprId) -> Result<Operand, TranslateError> {
        match classify(self.graph, self.catalog, id)? {
            Classified::Constant(Value::Null) => Ok(Operand::Null),
            Classified::Constant(value) => Ok(Operand::Scalar(ScalarExpr::Literal(value))),
            Classified::Parameter(ParamKind::Capture) => {
                let binding = self.captures.allocate(id, BindingShape::Scalar);
                Ok(Operand::Scalar(ScalarExpr::Param(binding)))
            }
            Classified::Parameter(ParamKind::Entity) => {
                let ExprNode::EntityConst { ty, key } = self.graph.node(id) else {
                    return Err(TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        "captured entity expression in comparison",
                    ));
                };
                let (ty, declared) = (ty.clone(), key.len());
                let expected = self.catalog.key_width(&ty)?;
                if declared != expected {
                    return Err(TranslateError::model(
                        ErrorOrigin::Translate,
                        format!(
                            "entity constant of '{ty}' carries {declared} key parts, expected {expected}"
                        ),
                    ));
                }
                let parts = (0..declared)
                    .map(|index| {
                        ScalarExpr::Param(self.captures.allocate(id, BindingShape::Part(index)))
                    })
                    .collect();
                Ok(Operand::Composite {
                    tag: Some(Tag::Entity(ty)),
                    parts,
                })
            }
            Classified::Parameter(ParamKind::Structure) => {
                let ExprNode::StructureConst { ty, values } = self.graph.node(id) else {
                    return Err(TranslateError::unsupported(
                        ErrorOrigin::Translate,
                        "captured composite expression in comparison",
                    ));
                };
                let (ty, declared) = (ty.clone(), values.len());
                let expected = self.catalog.structure_layout(&ty)?.len();
                if declared != expected {
                    return Err(TranslateError::model(
                        ErrorOrigin::Translate,
                        format!(
                            "structure constant of '{ty}' carries {declared} values, expected {expected}"
                        ),
                    ));
                }
                let parts = (0..declared)
                    .map(|index| {
                        ScalarExpr::Param(self.captures.allocate(id, BindingShape::Part(index)))
                    })
                    .collect();
                Ok(Operand::Composite {
                    tag: Some(Tag::Structure(ty)),
                    parts,
                })
            }
            Classified::Parameter(ParamKind::Sequence) => Err(TranslateError::unsupported(
                ErrorOrigin::Translate,
                "captured sequence used in a comparison",
            )),
        }
    }
}

/// Reduce a row-space value to a comparison operand.
pub(crate) fn operand_of(spaced: &Spaced) -> Result<Operand, TranslateError> {
    let value = spaced.value.strip_markers();
    if let Some(expr) = spaced.as_scalar() {
        return Ok(Operand::Scalar(expr));
    }
    let tag = match value {
        MappedValue::Key { ty, .. } | MappedValue::EntityRef { ty, .. } => {
            Some(Tag::Entity(ty.clone()))
        }
        MappedValue::Structure { ty, .. } => Some(Tag::Structure(ty.clone())),
        _ => None,
    };
    let mut parts = Vec::new();
    flatten(spaced, value, &mut parts)?;
    Ok(Operand::Composite { tag, parts })
}

/// Depth-first primitive parts of a mapped value. References contribute
/// their identity key, not their joined fields.
fn flatten(
    spaced: &Spaced,
    value: &MappedValue,
    out: &mut Vec<ScalarExpr>,
) -> Result<(), TranslateError> {
    match value.strip_markers() {
        MappedValue::Column { offset, .. } => {
            out.push(spaced.read(*offset));
            Ok(())
        }
        MappedValue::Key { columns, .. } => {
            for column in columns {
                flatten(spaced, column, out)?;
            }
            Ok(())
        }
        MappedValue::EntityRef { key, .. } => flatten(spaced, key, out),
        MappedValue::Structure { fields, .. } => {
            for (_, field) in fields {
                flatten(spaced, field, out)?;
            }
            Ok(())
        }
        MappedValue::Constructor { members, .. } => {
            for (_, member) in members {
                flatten(spaced, member, out)?;
            }
            Ok(())
        }
        other @ (MappedValue::CollectionRef { .. }
        | MappedValue::Grouping { .. }
        | MappedValue::Subquery { .. }) => Err(TranslateError::unsupported(
            ErrorOrigin::Translate,
            format!("{} has no comparable value", other.describe()),
        )),
        MappedValue::Marker { .. } => unreachable!("markers are stripped above"),
    }
}
