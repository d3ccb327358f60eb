//! Parameter binding and correlation-cell bookkeeping for the
//! recursive descent.

mod cells;
mod registry;


pub use cells::ApplyCells;
pub use registry::BindingRegistry;
