use crate::{mapped::MappedValue, plan::NodeId};

///
/// Projection
///
/// A plan node together with the mapping that reads the query's item
/// shape back out of its rows. Every translation step consumes and
/// produces one of these.
///

#[derive(Clone, Debug)]
pub struct Projection {
    pub root: NodeId,
    pub item: MappedValue,
    pub access: ResultAccess,
}

impl Projection {
    #[must_use]
    pub fn sequence(root: NodeId, item: MappedValue) -> Self {
        Self {
            root,
            item,
            access: ResultAccess::Sequence,
        }
    }

    #[must_use]
    pub fn with_root(mut self, root: NodeId) -> Self {
        self.root = root;
        self
    }

    #[must_use]
    pub fn with_item(mut self, item: MappedValue) -> Self {
        self.item = item;
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: ResultAccess) -> Self {
        self.access = access;
        self
    }
}

///
/// ResultAccess
///
/// How the caller consumes the plan's rows: the whole sequence, or a
/// single element with the operator's cardinality contract.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResultAccess {
    Sequence,
    /// Exactly the first row; empty input is an execution error.
    First,
    /// First row or the shape's default when empty.
    FirstOrDefault,
    /// The only row; empty or plural input is an execution error.
    Single,
    /// The only row or the default; plural input is an execution error.
    SingleOrDefault,
}

impl ResultAccess {
    /// True for the single-element access modes.
    #[must_use]
    pub const fn is_element(self) -> bool {
        !matches!(self, Self::Sequence)
    }

    /// True when an empty result yields a default instead of an error.
    #[must_use]
    pub const fn defaults_when_empty(self) -> bool {
        matches!(self, Self::FirstOrDefault | Self::SingleOrDefault)
    }

    /// Row prefix the executor must fetch to honor the contract.
    #[must_use]
    pub const fn fetch_limit(self) -> Option<u64> {
        match self {
            Self::Sequence => None,
            Self::First | Self::FirstOrDefault => Some(1),
            Self::Single | Self::SingleOrDefault => Some(2),
        }
    }
}
