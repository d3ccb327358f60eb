//! Query expression graph: the immutable, arena-allocated input language.

mod builder;
mod display;
mod node;


pub use builder::GraphBuilder;
pub use display::render;
pub use node::{
    BinaryOp, ConstructTarget, ElementShape, ExprId, ExprNode, ParamType, QueryGraph, QueryOp,
    UnaryOp,
};
