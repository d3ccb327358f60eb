///
/// TranslatorState
///
/// Positional context cloned down the recursion. Nothing in here is
/// ever mutated in place; descending into a nested scope derives a new
/// state instead.
///

#[derive(Clone, Copy, Debug)]
pub(crate) struct TranslatorState {
    position: Position,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum Position {
    /// Outermost operator chain; element operators shape the final
    /// access mode.
    Root,
    /// Inside a lambda or sub-plan; element operators become correlated
    /// applies instead.
    Nested,
}

impl TranslatorState {
    pub(crate) const fn root() -> Self {
        Self {
            position: Position::Root,
        }
    }

    pub(crate) const fn nested(self) -> Self {
        Self {
            position: Position::Nested,
        }
    }

    pub(crate) const fn is_root(self) -> bool {
        matches!(self.position, Position::Root)
    }
}
