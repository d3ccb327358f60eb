//! Row materialization: compiling an item mapping into a reusable
//! recipe and replaying it over plan rows.

mod builder;
mod cursor;
mod output;

#[cfg(test)]
mod tests;

pub use builder::Materializer;
pub use cursor::{IdentityResolver, RowCursor, SequentialIdentity};
pub use output::{LazySequence, Materialized};
