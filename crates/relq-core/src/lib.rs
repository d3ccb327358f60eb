//! Core translation runtime for relq: the query expression graph, the
//! constant-folding passes, the translator, and the row materializer.
#![warn(unreachable_pub)]

pub mod bind;
pub mod catalog;
pub mod error;
pub mod fold;
pub mod graph;
pub mod local;
pub mod mapped;
pub mod materialize;
pub mod obs;
pub mod plan;
pub mod query;
pub mod translate;
pub mod value;

// test
#[cfg(test)]
pub(crate) mod test_fixtures;
#[cfg(test)]
pub(crate) mod test_support;

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
/// No errors, registries, or internal passes are re-exported here.
///

pub mod prelude {
    pub use crate::{
        catalog::{Catalog, FieldKind, FieldModel, TypeModel},
        graph::{GraphBuilder, QueryGraph, QueryOp},
        query::{ParamContext, ParameterizedQuery, TranslatedQuery},
        translate::{TranslateRequest, translate},
        value::{Captured, ScalarKind, Value},
    };
}
