use crate::value::Value;
use std::collections::BTreeMap;

///
/// RowCursor
///
/// Read access to one plan row. The materializer only ever reads
/// columns by offset; the executor decides how rows are stored.
///

pub trait RowCursor {
    fn get(&self, column: usize) -> Option<&Value>;
    fn width(&self) -> usize;
}

impl RowCursor for [Value] {
    fn get(&self, column: usize) -> Option<&Value> {
        <[Value]>::get(self, column)
    }

    fn width(&self) -> usize {
        self.len()
    }
}

impl RowCursor for Vec<Value> {
    fn get(&self, column: usize) -> Option<&Value> {
        self.as_slice().get(column)
    }

    fn width(&self) -> usize {
        self.len()
    }
}

///
/// IdentityResolver
///
/// Identity-map hook: one handle per (type, key) for the lifetime of
/// the resolver, so two rows carrying the same entity materialize to
/// the same object on the caller's side.
///

pub trait IdentityResolver {
    fn resolve(&mut self, ty: &str, key: &[Value]) -> u64;
}

///
/// SequentialIdentity
/// Default resolver handing out handles in first-seen order.
///

#[derive(Debug, Default)]
pub struct SequentialIdentity {
    seen: BTreeMap<String, u64>,
    next: u64,
}

impl SequentialIdentity {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl IdentityResolver for SequentialIdentity {
    fn resolve(&mut self, ty: &str, key: &[Value]) -> u64 {
        // Keys are scalar and Display-stable, so a rendered tag is an
        // adequate map key.
        let tag = format!("{ty}|{key:?}");
        if let Some(handle) = self.seen.get(&tag) {
            return *handle;
        }
        let handle = self.next;
        self.next += 1;
        self.seen.insert(tag, handle);
        handle
    }
}
