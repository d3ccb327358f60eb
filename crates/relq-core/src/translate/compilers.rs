use crate::{error::TranslateError, mapped::MappedValue, plan::ScalarExpr};
use std::collections::BTreeMap;

/// Rewrites one member read over a mapped host value into a plan-level
/// scalar expression.
pub type MemberCompiler = fn(&MappedValue) -> Result<ScalarExpr, TranslateError>;

///
/// CustomCompilers
///
/// Static dispatch table for members the catalog does not model as
/// stored fields (computed members). Keyed by (host type path, member
/// name); consulted only after catalog field resolution fails.
///

#[derive(Debug, Default)]
pub struct CustomCompilers {
    table: BTreeMap<(String, String), MemberCompiler>,
}

pub(crate) static EMPTY: CustomCompilers = CustomCompilers {
    table: BTreeMap::new(),
};

impl CustomCompilers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ty: &str, member: &str, compiler: MemberCompiler) {
        self.table
            .insert((ty.to_string(), member.to_string()), compiler);
    }

    pub(crate) fn lookup(&self, ty: &str, member: &str) -> Option<MemberCompiler> {
        self.table
            .get(&(ty.to_string(), member.to_string()))
            .copied()
    }
}
