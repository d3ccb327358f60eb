//! Constant-foldability analysis, evaluation, and captured-value
//! classification over the query graph.

mod analyze;
mod classify;
mod eval;


pub use analyze::{FoldSet, analyze};
pub use classify::{Classified, ParamKind, classify, collect_capture_slots};
pub use eval::evaluate;
