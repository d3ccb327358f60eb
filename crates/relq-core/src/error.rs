use std::fmt;
use thiserror::Error as ThisError;

///
/// TranslateError
///
/// Structured translation failure with a stable internal classification.
/// Every error aborts the whole translation; no partial plan escapes.
///

#[derive(Debug, ThisError)]
pub struct TranslateError {
    pub class: ErrorClass,
    pub origin: ErrorOrigin,
    pub message: String,

    /// Printable form of the offending query sub-graph, when one exists.
    pub expression: Option<String>,
}

impl TranslateError {
    pub fn new(class: ErrorClass, origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self {
            class,
            origin,
            message: message.into(),
            expression: None,
        }
    }

    /// Attach the printable rendering of the offending sub-graph.
    #[must_use]
    pub fn with_expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }

    /// Construct an unsupported-shape error.
    pub(crate) fn unsupported(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Unsupported, origin, message)
    }

    /// Construct a model-consistency error (caller/catalog error, not a bug).
    pub(crate) fn model(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::Model, origin, message)
    }

    /// Construct an unsupported-in-cached-query error.
    pub(crate) fn cached_query(message: impl Into<String>) -> Self {
        Self::new(ErrorClass::CachedQuery, ErrorOrigin::Translate, message)
    }

    /// Construct a translator-defect invariant violation.
    pub(crate) fn invariant(origin: ErrorOrigin, message: impl Into<String>) -> Self {
        Self::new(ErrorClass::InvariantViolation, origin, message)
    }

    /// Construct a missing-type model error with a canonical message.
    pub(crate) fn unknown_type(path: &str) -> Self {
        Self::model(ErrorOrigin::Graph, format!("unknown persistent type '{path}'"))
    }

    /// Construct a missing-field model error with a canonical message.
    pub(crate) fn unknown_field(ty: &str, field: &str) -> Self {
        Self::model(
            ErrorOrigin::Graph,
            format!("unknown field '{field}' on type '{ty}'"),
        )
    }

    #[must_use]
    pub const fn is_unsupported(&self) -> bool {
        matches!(self.class, ErrorClass::Unsupported)
    }

    #[must_use]
    pub const fn is_cached_query(&self) -> bool {
        matches!(self.class, ErrorClass::CachedQuery)
    }

    #[must_use]
    pub const fn is_invariant(&self) -> bool {
        matches!(self.class, ErrorClass::InvariantViolation)
    }
}

impl fmt::Display for TranslateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}: {}", self.origin, self.class, self.message)?;
        if let Some(expression) = &self.expression {
            write!(f, " [in {expression}]")?;
        }
        Ok(())
    }
}

///
/// ErrorClass
/// Translation error taxonomy.
/// Not a stable API; may change without notice.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// The graph shape cannot be decomposed into relational operators.
    Unsupported,
    /// A referenced type or field is absent from the catalog.
    Model,
    /// The operator would bake a value into a reusable plan.
    CachedQuery,
    /// A defect in the translator itself. Fails loudly, never silently.
    InvariantViolation,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Unsupported => "unsupported",
            Self::Model => "model",
            Self::CachedQuery => "cached_query",
            Self::InvariantViolation => "invariant_violation",
        };
        write!(f, "{label}")
    }
}

///
/// ErrorOrigin
/// Component that raised the error.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorOrigin {
    Graph,
    Translate,
    Bind,
    Plan,
    Local,
    Materialize,
}

impl fmt::Display for ErrorOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Graph => "graph",
            Self::Translate => "translate",
            Self::Bind => "bind",
            Self::Plan => "plan",
            Self::Local => "local",
            Self::Materialize => "materialize",
        };
        write!(f, "{label}")
    }
}
