//! Mapped-value expressions: how logical (possibly composite) values are
//! encoded in plan-row columns.

mod build;
mod decompose;
mod value;

#[cfg(test)]
mod tests;

pub use build::{entity_item, structure_item};
pub use decompose::ColumnSlot;
pub use value::{MappedValue, MarkerKind};
