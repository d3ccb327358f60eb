//! In-memory plan interpreter used by translation tests. Small and
//! literal on purpose: each relational operator is evaluated the naive
//! way so test failures point at the translator, not the executor.

mod exec;

pub(crate) use exec::{Dataset, Executor};
