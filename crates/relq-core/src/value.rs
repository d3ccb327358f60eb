use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

///
/// Value
///
/// Closed scalar value set carried by plan rows and literals.
/// Composite shapes never appear here; they are decomposed into
/// primitive columns before reaching a plan.
///

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
}

impl Value {
    /// Scalar kind tag, or `None` for `Null`.
    #[must_use]
    pub const fn kind(&self) -> Option<ScalarKind> {
        match self {
            Self::Null => None,
            Self::Bool(_) => Some(ScalarKind::Bool),
            Self::Int(_) => Some(ScalarKind::Int),
            Self::Uint(_) => Some(ScalarKind::Uint),
            Self::Float(_) => Some(ScalarKind::Float),
            Self::Text(_) => Some(ScalarKind::Text),
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Three-valued equality: `None` when either side is null.
    #[must_use]
    pub fn compare_eq(&self, other: &Self) -> Option<bool> {
        if self.is_null() || other.is_null() {
            return None;
        }
        Some(match (self, other) {
            (Self::Int(l), Self::Uint(r)) => u64::try_from(*l).is_ok_and(|l| l == *r),
            (Self::Uint(l), Self::Int(r)) => u64::try_from(*r).is_ok_and(|r| r == *l),
            _ => self == other,
        })
    }

    /// Total order used for sorting and grouping.
    ///
    /// Nulls sort first; mismatched kinds order by tag rank so that the
    /// order is total even over heterogeneous inputs.
    #[must_use]
    pub fn order_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Bool(l), Self::Bool(r)) => l.cmp(r),
            (Self::Int(l), Self::Int(r)) => l.cmp(r),
            (Self::Uint(l), Self::Uint(r)) => l.cmp(r),
            (Self::Int(l), Self::Uint(r)) => cmp_int_uint(*l, *r),
            (Self::Uint(l), Self::Int(r)) => cmp_int_uint(*r, *l).reverse(),
            (Self::Float(l), Self::Float(r)) => l.partial_cmp(r).unwrap_or(Ordering::Equal),
            (Self::Text(l), Self::Text(r)) => l.cmp(r),
            _ => self.rank().cmp(&other.rank()),
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) | Self::Uint(_) => 2,
            Self::Float(_) => 3,
            Self::Text(_) => 4,
        }
    }
}

fn cmp_int_uint(l: i64, r: u64) -> Ordering {
    u64::try_from(l).map_or(Ordering::Less, |l| l.cmp(&r))
}

///
/// ScalarKind
/// Type tag for primitive columns; aligned with [`Value`] variants.
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ScalarKind {
    Bool,
    Int,
    Uint,
    Float,
    Text,
}

///
/// SortDirection
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

///
/// Captured
///
/// A value captured from the caller's environment at query-construction
/// time. The execution-time environment is a slice of these, indexed by
/// capture slot; a translated plan reads them through placeholder
/// bindings rather than baking them in.
///

#[derive(Clone, Debug, PartialEq)]
pub enum Captured {
    Scalar(Value),
    Entity { ty: String, key: Vec<Value> },
    Structure { ty: String, values: Vec<Value> },
    Seq(Vec<Captured>),
}

impl Captured {
    /// Unwrap a scalar capture; anything else is a caller error.
    pub(crate) fn into_scalar(self) -> Option<Value> {
        match self {
            Self::Scalar(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_identity(&self) -> bool {
        matches!(self, Self::Entity { .. } | Self::Structure { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_equality_is_unknown() {
        assert_eq!(Value::Null.compare_eq(&Value::Null), None);
        assert_eq!(Value::Int(1).compare_eq(&Value::Null), None);
        assert_eq!(Value::Int(1).compare_eq(&Value::Int(1)), Some(true));
        assert_eq!(Value::Int(1).compare_eq(&Value::Int(2)), Some(false));
    }

    #[test]
    fn mixed_width_integers_compare_by_magnitude() {
        assert_eq!(Value::Int(-1).order_cmp(&Value::Uint(0)), Ordering::Less);
        assert_eq!(Value::Uint(3).order_cmp(&Value::Int(2)), Ordering::Greater);
        assert_eq!(Value::Int(5).compare_eq(&Value::Uint(5)), Some(true));
    }

    #[test]
    fn nulls_sort_first() {
        let mut values = vec![Value::Int(2), Value::Null, Value::Int(1)];
        values.sort_by(Value::order_cmp);
        assert_eq!(values, vec![Value::Null, Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn values_round_trip_through_serde() {
        let row = vec![
            Value::Null,
            Value::Bool(true),
            Value::Int(-3),
            Value::Uint(3),
            Value::Float(0.5),
            Value::Text("abc".to_string()),
        ];
        let encoded = serde_json::to_string(&row).unwrap();
        let decoded: Vec<Value> = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, row);
    }
}
