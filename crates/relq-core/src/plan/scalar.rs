use super::node::ApplyCellId;
use crate::value::Value;

///
/// BindingId
/// Index into the translation's captured-value binding table.
///

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, derive_more::Display)]
#[display("b{_0}")]
pub struct BindingId(pub(crate) u32);

impl BindingId {
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

///
/// ScalarExpr
///
/// Primitive-valued expression evaluated per plan row. The plan layer
/// only ever compares primitives; composite comparisons are decomposed
/// before reaching it.
///

#[derive(Clone, Debug, PartialEq)]
pub enum ScalarExpr {
    /// Current-row column read.
    Column(usize),

    Literal(Value),

    /// Placeholder read resolved against the run-time parameter context.
    Param(BindingId),

    /// Correlated read of the current outer row threaded through an
    /// apply cell.
    Outer { cell: ApplyCellId, column: usize },

    IsNull(Box<ScalarExpr>),

    Not(Box<ScalarExpr>),

    Neg(Box<ScalarExpr>),

    Binary {
        op: ScalarOp,
        left: Box<ScalarExpr>,
        right: Box<ScalarExpr>,
    },

    Cond {
        test: Box<ScalarExpr>,
        then: Box<ScalarExpr>,
        otherwise: Box<ScalarExpr>,
    },
}

impl ScalarExpr {
    #[must_use]
    pub fn binary(op: ScalarOp, left: Self, right: Self) -> Self {
        Self::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(ScalarOp::Eq, left, right)
    }

    #[must_use]
    pub fn and(left: Self, right: Self) -> Self {
        Self::binary(ScalarOp::And, left, right)
    }

    #[must_use]
    pub fn or(left: Self, right: Self) -> Self {
        Self::binary(ScalarOp::Or, left, right)
    }

    #[must_use]
    pub fn is_null(expr: Self) -> Self {
        Self::IsNull(Box::new(expr))
    }

    #[must_use]
    pub fn cond(test: Self, then: Self, otherwise: Self) -> Self {
        Self::Cond {
            test: Box::new(test),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    #[must_use]
    pub fn negate(expr: Self) -> Self {
        Self::Not(Box::new(expr))
    }

    /// Conjunction of all terms; `true` when empty.
    #[must_use]
    pub fn and_all(terms: Vec<Self>) -> Self {
        terms
            .into_iter()
            .reduce(Self::and)
            .unwrap_or(Self::Literal(Value::Bool(true)))
    }

    /// Disjunction of all terms; `false` when empty.
    #[must_use]
    pub fn or_all(terms: Vec<Self>) -> Self {
        terms
            .into_iter()
            .reduce(Self::or)
            .unwrap_or(Self::Literal(Value::Bool(false)))
    }

    /// Shift every current-row column read by `delta`.
    #[must_use]
    pub fn shift_columns(&self, delta: usize) -> Self {
        self.map_columns(&|offset| offset + delta)
    }

    /// Rewrite current-row column reads through `map`. Outer reads are
    /// left untouched; they address a different row space.
    #[must_use]
    pub fn map_columns(&self, map: &dyn Fn(usize) -> usize) -> Self {
        match self {
            Self::Column(offset) => Self::Column(map(*offset)),
            Self::Literal(_) | Self::Param(_) | Self::Outer { .. } => self.clone(),
            Self::IsNull(inner) => Self::IsNull(Box::new(inner.map_columns(map))),
            Self::Not(inner) => Self::Not(Box::new(inner.map_columns(map))),
            Self::Neg(inner) => Self::Neg(Box::new(inner.map_columns(map))),
            Self::Binary { op, left, right } => Self::Binary {
                op: *op,
                left: Box::new(left.map_columns(map)),
                right: Box::new(right.map_columns(map)),
            },
            Self::Cond {
                test,
                then,
                otherwise,
            } => Self::Cond {
                test: Box::new(test.map_columns(map)),
                then: Box::new(then.map_columns(map)),
                otherwise: Box::new(otherwise.map_columns(map)),
            },
        }
    }

    /// Collect every binding referenced by this expression.
    pub fn collect_bindings(&self, out: &mut Vec<BindingId>) {
        match self {
            Self::Param(binding) => out.push(*binding),
            Self::Column(_) | Self::Literal(_) | Self::Outer { .. } => {}
            Self::IsNull(inner) | Self::Not(inner) | Self::Neg(inner) => {
                inner.collect_bindings(out);
            }
            Self::Binary { left, right, .. } => {
                left.collect_bindings(out);
                right.collect_bindings(out);
            }
            Self::Cond {
                test,
                then,
                otherwise,
            } => {
                test.collect_bindings(out);
                then.collect_bindings(out);
                otherwise.collect_bindings(out);
            }
        }
    }
}

///
/// ScalarOp
/// Plan-level operator set; strictly primitive operands.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScalarOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    And,
    Or,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}
